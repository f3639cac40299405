//! Service type validation and the data model shared by all drivers.

use crate::errors::IllegalServiceTypeError;
use std::{
	collections::BTreeMap,
	net::{IpAddr, Ipv4Addr, Ipv6Addr},
	str::FromStr,
};

const DEFAULT_BROADCAST_NAME: &str = "Bonjour Service";
const DEFAULT_BROADCAST_PORT: u16 = 80;

/// Returns whether the given string conforms to the DNS-SD service type
/// grammar `_<label>.(_tcp|_udp)(.<domain>.)?`.
///
/// Pure check, no side effects. Useful for validating user input before
/// requesting a session; invalid types never reach a driver.
pub fn is_service_type(s: &str) -> bool {
	let mut parts = s.split('.');

	let label = match parts.next() {
		Some(label) => label,
		None => return false,
	};
	if !label.starts_with('_')
		|| label.len() < 2
		|| !label[1..]
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
	{
		return false;
	}

	if !matches!(parts.next(), Some("_tcp" | "_udp")) {
		return false;
	}

	match (parts.next(), parts.next(), parts.next()) {
		// "_service._tcp"
		(None, _, _) => true,

		// "_service._tcp.domain." (trailing dot splits into an empty final part)
		(Some(domain), Some(""), None) => {
			!domain.is_empty() && domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
		}

		_ => false,
	}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A validated DNS-SD service type, e.g. `_http._tcp`.
///
/// Immutable once constructed; construction is the only validation gate.
pub struct ServiceType(String);
impl ServiceType {
	pub fn new(s: impl Into<String>) -> Result<Self, IllegalServiceTypeError> {
		let s = s.into();
		if is_service_type(&s) {
			Ok(Self(s))
		} else {
			Err(IllegalServiceTypeError(s))
		}
	}

	#[inline(always)]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl FromStr for ServiceType {
	type Err = IllegalServiceTypeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl AsRef<str> for ServiceType {
	#[inline(always)]
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl std::fmt::Display for ServiceType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A fully resolved service as reported by a driver.
///
/// Drivers only emit services with at least one address; a found-but-unresolved
/// service is never exposed to the consumer. Equality is structural and is what
/// consumers should use to correlate `Added` and `Removed` events.
pub struct DiscoveredService {
	pub name: String,
	pub service_type: ServiceType,
	pub ipv4: Option<Ipv4Addr>,
	pub ipv6: Option<Ipv6Addr>,
	pub port: u16,
	pub txt_records: BTreeMap<String, String>,
}
impl DiscoveredService {
	/// The primary host address, preferring IPv4 over IPv6 when both are known.
	pub fn host(&self) -> Option<IpAddr> {
		self.ipv4.map(IpAddr::V4).or_else(|| self.ipv6.map(IpAddr::V6))
	}

	pub fn txt_record(&self, key: &str) -> Option<&str> {
		self.txt_records.get(key).map(String::as_str)
	}
}

#[derive(Debug, Clone)]
/// Configuration of a service advertisement, built with [`BroadcastConfigBuilder`].
///
/// Immutable once handed to a broadcast session.
pub struct BroadcastConfig {
	service_type: ServiceType,
	name: String,
	address: Option<IpAddr>,
	port: u16,
	txt_records: BTreeMap<String, String>,
}
impl BroadcastConfig {
	/// Starts building a config for the given service type with default
	/// name and port.
	pub fn builder(service_type: ServiceType) -> BroadcastConfigBuilder {
		BroadcastConfigBuilder(Self {
			service_type,
			name: DEFAULT_BROADCAST_NAME.to_owned(),
			address: None,
			port: DEFAULT_BROADCAST_PORT,
			txt_records: BTreeMap::new(),
		})
	}

	#[inline(always)]
	pub fn service_type(&self) -> &ServiceType {
		&self.service_type
	}

	#[inline(always)]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline(always)]
	/// The explicit bind address, if any. When set, it takes precedence over
	/// the platform-discovered address.
	pub fn address(&self) -> Option<IpAddr> {
		self.address
	}

	#[inline(always)]
	pub fn port(&self) -> u16 {
		self.port
	}

	#[inline(always)]
	pub fn txt_records(&self) -> &BTreeMap<String, String> {
		&self.txt_records
	}
}

/// A builder for [`BroadcastConfig`]s.
pub struct BroadcastConfigBuilder(BroadcastConfig);
impl BroadcastConfigBuilder {
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.0.name = name.into();
		self
	}

	pub fn address(mut self, address: IpAddr) -> Self {
		self.0.address = Some(address);
		self
	}

	pub fn port(mut self, port: u16) -> Self {
		self.0.port = port;
		self
	}

	pub fn add_txt(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.txt_records.insert(key.into(), value.into());
		self
	}

	pub fn build(self) -> BroadcastConfig {
		self.0
	}
}
