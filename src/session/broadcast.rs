use crate::{
	driver::{BroadcastCallback, Driver},
	errors::{BroadcastFailedError, Cause},
	platform::{CancellationHandle, Platform},
	service::BroadcastConfig,
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Mutex,
};

#[derive(Debug)]
/// An event observed by a broadcast session.
///
/// A broadcast never completes on its own; the session emits nothing until
/// it is cancelled or the driver reports a terminal failure.
pub enum BroadcastEvent {
	Failed(BroadcastFailedError),
}

/// A not-yet-activated broadcast session. Construction performs no I/O.
pub struct BroadcastSession {
	pub(super) driver: Arc<dyn Driver>,
	pub(super) platform: Arc<dyn Platform>,
	pub(super) config: BroadcastConfig,
}
impl BroadcastSession {
	#[inline(always)]
	pub fn config(&self) -> &BroadcastConfig {
		&self.config
	}

	/// Activates the session.
	///
	/// Mirrors discovery activation; the explicit config address takes
	/// precedence over the platform-discovered one. Failures surface as a
	/// terminal [`BroadcastEvent::Failed`] through `handler`.
	pub fn start<F>(self, handler: F) -> BroadcastHandle
	where
		F: Fn(BroadcastEvent) + Send + Sync + 'static,
	{
		let BroadcastSession {
			driver,
			platform,
			config,
		} = self;

		log::debug!("starting broadcast session for {}", config.service_type());

		let engine = Arc::new(Mutex::new(driver.create_broadcast()));
		let connection = Arc::new(Mutex::new(platform.create_connection()));

		let emitter = Arc::new(BroadcastEmitter {
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

		let callback: Arc<dyn BroadcastCallback> = emitter.clone();

		let started = initialized.and_then(|_| {
			let address = match config.address() {
				Some(address) => address,
				None => platform.local_address()?,
			};
			engine.lock().unwrap().start(address, &config, callback.clone())
		});
		if let Err(cause) = started {
			callback.broadcast_failed(cause);
		}

		BroadcastHandle { hook }
	}
}

/// Consumer handle to a running broadcast session.
///
/// Cancelling (explicitly or by dropping the handle) triggers exactly one
/// teardown sequence; repeated cancellations are no-ops.
pub struct BroadcastHandle {
	hook: CancellationHandle,
}
impl BroadcastHandle {
	pub fn cancel(&self) {
		self.hook.cancel()
	}

	pub fn is_cancelled(&self) -> bool {
		self.hook.is_cancelled()
	}
}
impl Drop for BroadcastHandle {
	fn drop(&mut self) {
		self.hook.cancel()
	}
}

struct BroadcastEmitter {
	handler: Box<dyn Fn(BroadcastEvent) + Send + Sync>,
	live: AtomicBool,
	hook: Mutex<Option<CancellationHandle>>,
	driver_name: String,
}
impl BroadcastEmitter {
	fn silence(&self) {
		self.live.store(false, Ordering::Release);
	}
}
impl BroadcastCallback for BroadcastEmitter {
	fn broadcast_failed(&self, cause: Cause) {
		if self.live.swap(false, Ordering::AcqRel) {
			(self.handler)(BroadcastEvent::Failed(BroadcastFailedError::new(
				self.driver_name.clone(),
				cause,
			)));

			let hook = self.hook.lock().unwrap().clone();
			if let Some(hook) = hook {
				std::thread::spawn(move || hook.cancel());
			}
		}
	}
}
