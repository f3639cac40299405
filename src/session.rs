//! Session orchestration: binds a [`Platform`] connection and a [`Driver`]
//! engine into a single cancellable session.
//!
//! A session moves through `New → Initialized → Active → TornDown`, never
//! backwards. Activation initializes the engine and the platform connection,
//! registers an exactly-once teardown hook (engine first, then connection),
//! and wires driver callbacks to the consumer's event handler. Any error
//! raised while starting is routed through the same failed path as
//! asynchronous backend failures; activation itself never returns an error.

use crate::{
	driver::Driver,
	errors::{ConfigurationError, IllegalServiceTypeError},
	platform::Platform,
	service::{BroadcastConfig, ServiceType},
};
use std::sync::Arc;

mod broadcast;
pub use broadcast::{BroadcastEvent, BroadcastHandle, BroadcastSession};

mod discovery;
pub use discovery::{DiscoveryEvent, DiscoveryHandle, DiscoverySession};

/// Entry point for requesting discovery and broadcast sessions.
///
/// Obtain one through [`Lantern::builder`], supplying a driver and a platform.
/// The instance itself holds no live resources; each session activation
/// creates its own engine and connection.
pub struct Lantern {
	driver: Arc<dyn Driver>,
	platform: Arc<dyn Platform>,
}
impl Lantern {
	pub fn builder() -> LanternBuilder {
		LanternBuilder {
			driver: None,
			platform: None,
		}
	}

	/// Requests a discovery session for the given service type.
	///
	/// Fails synchronously, without touching the driver or platform, if the
	/// type does not obey the DNS-SD grammar. The returned session is lazy;
	/// discovery begins on [`DiscoverySession::start`].
	pub fn discovery(&self, service_type: impl AsRef<str>) -> Result<DiscoverySession, IllegalServiceTypeError> {
		let service_type = ServiceType::new(service_type.as_ref())?;

		Ok(DiscoverySession {
			driver: self.driver.clone(),
			platform: self.platform.clone(),
			service_type,
		})
	}

	/// Requests a broadcast session for the given advertisement config.
	///
	/// The config carries an already validated [`ServiceType`], so no further
	/// validation can fail here. The returned session is lazy; advertising
	/// begins on [`BroadcastSession::start`].
	pub fn broadcast(&self, config: BroadcastConfig) -> BroadcastSession {
		BroadcastSession {
			driver: self.driver.clone(),
			platform: self.platform.clone(),
			config,
		}
	}
}

/// Configures and creates [`Lantern`] instances.
///
/// Both a driver and a platform must be supplied; a missing collaborator is a
/// configuration error reported at build time, not at session activation.
pub struct LanternBuilder {
	driver: Option<Arc<dyn Driver>>,
	platform: Option<Arc<dyn Platform>>,
}
impl LanternBuilder {
	pub fn driver(mut self, driver: impl Driver + 'static) -> Self {
		self.driver = Some(Arc::new(driver));
		self
	}

	pub fn platform(mut self, platform: impl Platform + 'static) -> Self {
		self.platform = Some(Arc::new(platform));
		self
	}

	pub fn build(self) -> Result<Lantern, ConfigurationError> {
		Ok(Lantern {
			driver: self.driver.ok_or(ConfigurationError::MissingDriver)?,
			platform: self.platform.ok_or(ConfigurationError::MissingPlatform)?,
		})
	}
}
