//! The backend driver contract.
//!
//! A [`Driver`] supplies per-session discovery and broadcast engines over a
//! concrete discovery mechanism (a pure mDNS responder, a host OS service,
//! ...). Engines never surface raw backend errors to the consumer: failures
//! are reported through the callback capability traits and wrapped with the
//! driver's name by the session layer.

use crate::{
	errors::Cause,
	service::{BroadcastConfig, DiscoveredService, ServiceType},
};
use std::{net::IpAddr, sync::Arc};

pub trait Driver: Send + Sync {
	/// Short name identifying this driver in wrapped error messages.
	fn name(&self) -> &str;

	fn create_discovery(&self, service_type: &ServiceType) -> Box<dyn DiscoveryEngine>;
	fn create_broadcast(&self) -> Box<dyn BroadcastEngine>;
}

/// Per-session discovery engine: initialize → discover → teardown.
pub trait DiscoveryEngine: Send {
	/// One-time backend setup. Must not start any network activity.
	fn initialize(&mut self) -> Result<(), Cause>;

	/// Begins discovering on the given local address and returns immediately;
	/// all results arrive later through `callback`.
	fn discover(&mut self, address: IpAddr, callback: Arc<dyn DiscoveryCallback>) -> Result<(), Cause>;

	/// Stops the operation and releases backend resources.
	///
	/// Must not block the calling thread: slow backend shutdown is deferred to
	/// the engine's own background context. Failures are suppressed (logged at
	/// most), never propagated; teardown is best-effort cleanup.
	fn teardown(&mut self);
}

/// Per-session broadcast engine: initialize → start → teardown.
pub trait BroadcastEngine: Send {
	/// One-time backend setup. Must not start any network activity.
	fn initialize(&mut self) -> Result<(), Cause>;

	/// Begins advertising on the given local address and returns immediately.
	fn start(
		&mut self,
		address: IpAddr,
		config: &BroadcastConfig,
		callback: Arc<dyn BroadcastCallback>,
	) -> Result<(), Cause>;

	/// Same contract as [`DiscoveryEngine::teardown`].
	fn teardown(&mut self);
}

/// Capability set through which a discovery engine reports results.
pub trait DiscoveryCallback: Send + Sync {
	/// A service was found and fully resolved.
	fn service_resolved(&self, service: DiscoveredService);

	/// A previously resolved service went away.
	fn service_lost(&self, service: DiscoveredService);

	/// The engine hit an unrecoverable error. Terminal for the session.
	fn discovery_failed(&self, cause: Cause);
}

/// Capability set through which a broadcast engine reports results.
pub trait BroadcastCallback: Send + Sync {
	/// The engine hit an unrecoverable error. Terminal for the session.
	fn broadcast_failed(&self, cause: Cause);
}
