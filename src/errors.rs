/// A backend-originated failure cause, preserved for diagnostics.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The input string does not conform to the DNS-SD service type grammar.
///
/// Carries the offending string. Surfaced synchronously, before any driver or
/// platform resource is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalServiceTypeError(pub String);
impl std::fmt::Display for IllegalServiceTypeError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "not a valid DNS-SD service type: {}", self.0)
	}
}
impl std::error::Error for IllegalServiceTypeError {}

#[derive(Debug, Error)]
#[error("service discovery driver '{driver}' failed with an unrecoverable error: {cause}")]
/// A driver reported an unrecoverable discovery error. Terminal for the session.
pub struct DiscoveryFailedError {
	pub driver: String,
	#[source]
	pub cause: Cause,
}
impl DiscoveryFailedError {
	pub fn new(driver: impl Into<String>, cause: Cause) -> Self {
		Self { driver: driver.into(), cause }
	}
}

#[derive(Debug, Error)]
#[error("service broadcast driver '{driver}' failed with an unrecoverable error: {cause}")]
/// A driver reported an unrecoverable broadcast error. Terminal for the session.
pub struct BroadcastFailedError {
	pub driver: String,
	#[source]
	pub cause: Cause,
}
impl BroadcastFailedError {
	pub fn new(driver: impl Into<String>, cause: Cause) -> Self {
		Self { driver: driver.into(), cause }
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
/// The [`Lantern`](crate::Lantern) builder was missing a required collaborator.
pub enum ConfigurationError {
	#[error("a driver must be provided before building")]
	MissingDriver,
	#[error("a platform must be provided before building")]
	MissingPlatform,
}
