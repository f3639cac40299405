//! The host environment contract: local address lookup, per-session
//! connection resources and teardown scheduling.

use crate::errors::Cause;
use std::{
	net::IpAddr,
	sync::{Arc, Mutex},
};

#[cfg(feature = "desktop")]
#[cfg_attr(docsrs, doc(cfg(feature = "desktop")))]
mod desktop;
#[cfg(feature = "desktop")]
pub use desktop::DesktopPlatform;

pub type TeardownAction = Box<dyn FnOnce() + Send>;

pub trait Platform: Send + Sync {
	/// The local network address sessions should bind their engines to.
	fn local_address(&self) -> std::io::Result<IpAddr>;

	/// Creates the per-session connection resource (e.g. a multicast
	/// capability). Each session activation gets its own connection; nothing
	/// is shared between sessions.
	fn create_connection(&self) -> Box<dyn PlatformConnection>;

	/// Schedules `action` to run when the session is cancelled.
	///
	/// The returned handle guarantees the action runs exactly once no matter
	/// how many times it is cancelled.
	fn run_on_teardown(&self, action: TeardownAction) -> CancellationHandle {
		CancellationHandle::new(action)
	}
}

/// Per-session environment resource with the same lifecycle as an engine.
pub trait PlatformConnection: Send {
	fn initialize(&mut self) -> Result<(), Cause>;

	/// Best-effort release; failures are suppressed.
	fn teardown(&mut self);
}

#[derive(Clone)]
/// Exactly-once guard around a teardown action.
///
/// The action is consumed on the first [`cancel`](CancellationHandle::cancel);
/// every later call is a no-op.
pub struct CancellationHandle {
	action: Arc<Mutex<Option<TeardownAction>>>,
}
impl CancellationHandle {
	pub fn new(action: TeardownAction) -> Self {
		Self {
			action: Arc::new(Mutex::new(Some(action))),
		}
	}

	pub fn cancel(&self) {
		let action = self.action.lock().unwrap().take();
		if let Some(action) = action {
			action();
		}
	}

	pub fn is_cancelled(&self) -> bool {
		self.action.lock().unwrap().is_none()
	}
}
