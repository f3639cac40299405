//! Bundled pure-Rust mDNS driver.
//!
//! Speaks mDNS directly over a multicast UDP socket using
//! [`trust_dns_client`] for the wire format; no host discovery service is
//! involved. Discovery sends periodic PTR queries and resolves found
//! instances one at a time through a [`Backlog`](crate::backlog::Backlog);
//! broadcast answers matching queries with a prebuilt DNS response.

use crate::{
	driver::{BroadcastEngine, DiscoveryEngine, Driver},
	service::ServiceType,
};
use std::time::Duration;

mod broadcast;
mod discovery;
pub(crate) mod packet;
mod socket;

/// The pure-Rust mDNS [`Driver`].
///
/// ```no_run
/// use lantern::{mdns::MdnsDriver, platform::DesktopPlatform, Lantern};
///
/// let lantern = Lantern::builder()
/// 	.driver(MdnsDriver::new())
/// 	.platform(DesktopPlatform::new())
/// 	.build()
/// 	.unwrap();
/// ```
pub struct MdnsDriver {
	query_interval: Duration,
	max_missed_queries: u8,
	loopback: bool,
}
impl MdnsDriver {
	pub fn new() -> Self {
		Self {
			query_interval: Duration::from_secs(10),
			max_missed_queries: 2,
			loopback: false,
		}
	}

	/// How often discovery sessions re-query for services.
	pub fn query_interval(mut self, interval: Duration) -> Self {
		self.query_interval = interval;
		self
	}

	/// The number of query rounds a responder may ignore before its services
	/// are reported lost.
	///
	/// If set to zero, services never go offline.
	pub fn max_missed_queries(mut self, max: u8) -> Self {
		self.max_missed_queries = max;
		self
	}

	/// Receive our own multicast packets. Mostly useful for loopback testing.
	pub fn loopback(mut self) -> Self {
		self.loopback = true;
		self
	}
}
impl Default for MdnsDriver {
	fn default() -> Self {
		Self::new()
	}
}
impl Driver for MdnsDriver {
	fn name(&self) -> &str {
		"mdns"
	}

	fn create_discovery(&self, service_type: &ServiceType) -> Box<dyn DiscoveryEngine> {
		Box::new(discovery::MdnsDiscoveryEngine::new(
			service_type.clone(),
			self.query_interval,
			self.max_missed_queries,
			self.loopback,
		))
	}

	fn create_broadcast(&self) -> Box<dyn BroadcastEngine> {
		Box::new(broadcast::MdnsBroadcastEngine::new(self.loopback))
	}
}
