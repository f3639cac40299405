use super::{Platform, PlatformConnection};
use crate::errors::Cause;
use std::net::IpAddr;

/// Platform integration for ordinary desktop/server hosts.
///
/// Picks the first non-loopback interface address (IPv4 preferred) and needs
/// no special connection resource; multicast group membership is managed by
/// the drivers' own sockets.
pub struct DesktopPlatform;
impl DesktopPlatform {
	pub fn new() -> Self {
		Self
	}
}
impl Default for DesktopPlatform {
	fn default() -> Self {
		Self::new()
	}
}
impl Platform for DesktopPlatform {
	fn local_address(&self) -> std::io::Result<IpAddr> {
		let ifaces = if_addrs::get_if_addrs()?;

		ifaces
			.iter()
			.find(|iface| !iface.is_loopback() && iface.ip().is_ipv4())
			.or_else(|| ifaces.iter().find(|iface| !iface.is_loopback()))
			.map(|iface| iface.ip())
			.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "No usable network interface"))
	}

	fn create_connection(&self) -> Box<dyn PlatformConnection> {
		Box::new(DesktopConnection)
	}
}

struct DesktopConnection;
impl PlatformConnection for DesktopConnection {
	fn initialize(&mut self) -> Result<(), Cause> {
		// Nothing to acquire on desktop hosts.
		Ok(())
	}

	fn teardown(&mut self) {}
}
