use crate::{
	driver::{DiscoveryCallback, Driver},
	errors::{Cause, DiscoveryFailedError},
	platform::{CancellationHandle, Platform},
	service::{DiscoveredService, ServiceType},
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Mutex,
};

#[derive(Debug)]
/// An event observed by a discovery session.
///
/// `Added` and `Removed` arrive in the order the backend raised them; the
/// session performs no deduplication or reordering. `Failed` is terminal: no
/// further events are delivered after it.
pub enum DiscoveryEvent {
	Added(DiscoveredService),
	Removed(DiscoveredService),
	Failed(DiscoveryFailedError),
}

/// A not-yet-activated discovery session. Construction performs no I/O.
pub struct DiscoverySession {
	pub(super) driver: Arc<dyn Driver>,
	pub(super) platform: Arc<dyn Platform>,
	pub(super) service_type: ServiceType,
}
impl std::fmt::Debug for DiscoverySession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DiscoverySession")
			.field("service_type", &self.service_type)
			.finish_non_exhaustive()
	}
}
impl DiscoverySession {
	#[inline(always)]
	pub fn service_type(&self) -> &ServiceType {
		&self.service_type
	}

	/// Activates the session.
	///
	/// Initializes the driver engine and the platform connection, registers
	/// the teardown hook, acquires the local address and starts discovering.
	/// Failures anywhere on this path surface as a terminal
	/// [`DiscoveryEvent::Failed`] through `handler`, never as a return value.
	pub fn start<F>(self, handler: F) -> DiscoveryHandle
	where
		F: Fn(DiscoveryEvent) + Send + Sync + 'static,
	{
		let DiscoverySession {
			driver,
			platform,
			service_type,
		} = self;

		log::debug!("starting discovery session for {service_type}");

		let engine = Arc::new(Mutex::new(driver.create_discovery(&service_type)));
		let connection = Arc::new(Mutex::new(platform.create_connection()));

		let emitter = Arc::new(DiscoveryEmitter {
			handler: Box::new(handler),
			live: AtomicBool::new(true),
			hook: Mutex::new(None),
			driver_name: driver.name().to_owned(),
		});

		let initialized = engine
			.lock()
			.unwrap()
			.initialize()
			.and_then(|_| connection.lock().unwrap().initialize());

		// Teardown tears down the engine first, then the connection, exactly
		// once. Silencing the emitter first guarantees a cancelled session
		// delivers nothing further.
		let hook = platform.run_on_teardown({
			let emitter = emitter.clone();
			let engine = engine.clone();
			let connection = connection.clone();
			Box::new(move || {
				emitter.silence();
				engine.lock().unwrap().teardown();
				connection.lock().unwrap().teardown();
			})
		});
		*emitter.hook.lock().unwrap() = Some(hook.clone());

		let callback: Arc<dyn DiscoveryCallback> = emitter.clone();

		let started = initialized.and_then(|_| {
			let address = platform.local_address()?;
			engine.lock().unwrap().discover(address, callback.clone())
		});
		if let Err(cause) = started {
			callback.discovery_failed(cause);
		}

		DiscoveryHandle { hook }
	}
}

/// Consumer handle to a running discovery session.
///
/// Cancelling (explicitly or by dropping the handle) triggers exactly one
/// teardown sequence; repeated cancellations are no-ops.
pub struct DiscoveryHandle {
	hook: CancellationHandle,
}
impl DiscoveryHandle {
	pub fn cancel(&self) {
		self.hook.cancel()
	}

	pub fn is_cancelled(&self) -> bool {
		self.hook.is_cancelled()
	}
}
impl Drop for DiscoveryHandle {
	fn drop(&mut self) {
		self.hook.cancel()
	}
}

/// Translates driver callbacks into ordered consumer events, enforcing the
/// "nothing after terminal failure or cancellation" contract.
struct DiscoveryEmitter {
	handler: Box<dyn Fn(DiscoveryEvent) + Send + Sync>,
	live: AtomicBool,
	hook: Mutex<Option<CancellationHandle>>,
	driver_name: String,
}
impl DiscoveryEmitter {
	fn emit(&self, event: DiscoveryEvent) {
		if self.live.load(Ordering::Acquire) {
			(self.handler)(event);
		}
	}

	fn silence(&self) {
		self.live.store(false, Ordering::Release);
	}
}
impl DiscoveryCallback for DiscoveryEmitter {
	fn service_resolved(&self, service: DiscoveredService) {
		self.emit(DiscoveryEvent::Added(service));
	}

	fn service_lost(&self, service: DiscoveredService) {
		self.emit(DiscoveryEvent::Removed(service));
	}

	fn discovery_failed(&self, cause: Cause) {
		if self.live.swap(false, Ordering::AcqRel) {
			(self.handler)(DiscoveryEvent::Failed(DiscoveryFailedError::new(
				self.driver_name.clone(),
				cause,
			)));

			// The engine may report failure from its own callback thread;
			// running teardown inline there could re-enter the engine. Hand it
			// to a background thread and forget it.
			let hook = self.hook.lock().unwrap().clone();
			if let Some(hook) = hook {
				std::thread::spawn(move || hook.cancel());
			}
		}
	}
}
