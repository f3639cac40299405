//! Serialization of resolution requests against backends that can only
//! service one outstanding resolve at a time.

use std::{
	collections::VecDeque,
	sync::{Arc, Condvar, Mutex},
};

/// Default queue capacity before the oldest pending candidate is evicted.
pub const DEFAULT_CAPACITY: usize = 32;

enum Entry<T> {
	Item(T),
	Stop,
}

struct State<T> {
	queue: VecDeque<Entry<T>>,
	/// True while no item is being processed. The worker only dequeues while
	/// idle, and flips it back off before handing the item to the processor;
	/// this is what keeps at most one resolution in flight.
	idle: bool,
	quitting: bool,
}

struct Shared<T> {
	state: Mutex<State<T>>,
	available: Condvar,
	capacity: usize,
}

/// A bounded backlog of pending resolutions, processed strictly one at a time
/// by a dedicated worker thread.
///
/// [`add`](Backlog::add) never blocks the caller: when the queue is at
/// capacity, the oldest pending candidate is evicted to make room. The
/// processor receives one item at a time and must call
/// [`proceed`](Backlog::proceed) once the resolution completes (successfully
/// or not) to release the next item. [`quit`](Backlog::quit) drains the queue,
/// pushes a stop sentinel and halts the worker; it is idempotent and safe to
/// call while a resolution is still in flight.
pub struct Backlog<T: Send + 'static> {
	shared: Arc<Shared<T>>,
}
impl<T: Send + 'static> Clone for Backlog<T> {
	fn clone(&self) -> Self {
		Self { shared: self.shared.clone() }
	}
}

impl<T: Send + 'static> Backlog<T> {
	/// Spawns a backlog with [`DEFAULT_CAPACITY`].
	pub fn new<F>(on_next: F) -> Self
	where
		F: FnMut(&Backlog<T>, T) + Send + 'static,
	{
		Self::with_capacity(DEFAULT_CAPACITY, on_next)
	}

	/// Spawns the worker thread and returns a handle to the backlog.
	///
	/// `on_next` runs on the worker thread. It is handed the backlog itself so
	/// that completion callbacks can signal `proceed` (or `quit`) from
	/// whichever thread the backend invokes them on.
	pub fn with_capacity<F>(capacity: usize, on_next: F) -> Self
	where
		F: FnMut(&Backlog<T>, T) + Send + 'static,
	{
		assert!(capacity > 0, "backlog capacity must be non-zero");

		let backlog = Self {
			shared: Arc::new(Shared {
				state: Mutex::new(State {
					queue: VecDeque::new(),
					idle: true,
					quitting: false,
				}),
				available: Condvar::new(),
				capacity,
			}),
		};

		let worker = backlog.clone();
		std::thread::Builder::new()
			.name("Lantern Resolve Backlog".into())
			.spawn(move || worker.work(on_next))
			.unwrap();

		backlog
	}

	fn work<F>(self, mut on_next: F)
	where
		F: FnMut(&Backlog<T>, T),
	{
		loop {
			let item = {
				let mut state = self.shared.state.lock().unwrap();
				loop {
					if state.idle {
						match state.queue.pop_front() {
							Some(Entry::Stop) => return,
							Some(Entry::Item(item)) => {
								state.idle = false;
								break item;
							}
							None => {}
						}
					}
					state = self.shared.available.wait(state).unwrap();
				}
			};

			on_next(&self, item);
		}
	}

	/// Enqueues a found-but-unresolved candidate.
	///
	/// Never blocks; at capacity, the single oldest queued candidate is
	/// evicted first. If the backlog is idle the worker picks the candidate up
	/// immediately.
	pub fn add(&self, item: T) {
		{
			let mut state = self.shared.state.lock().unwrap();
			if state.quitting {
				return;
			}
			if state.queue.len() == self.shared.capacity {
				state.queue.pop_front();
			}
			state.queue.push_back(Entry::Item(item));
		}
		self.shared.available.notify_one();
	}

	/// Marks the in-flight resolution as finished and releases the next
	/// queued candidate to the worker.
	pub fn proceed(&self) {
		{
			let mut state = self.shared.state.lock().unwrap();
			state.idle = true;
		}
		self.shared.available.notify_one();
	}

	/// Drains the queue, pushes the stop sentinel and halts the worker.
	///
	/// Idempotent; safe to call whether or not a resolution is in flight.
	pub fn quit(&self) {
		{
			let mut state = self.shared.state.lock().unwrap();
			if state.quitting {
				return;
			}
			state.quitting = true;
			state.queue.clear();
			state.queue.push_back(Entry::Stop);
			// Let the worker reach the sentinel even if a resolution never
			// signalled completion.
			state.idle = true;
		}
		self.shared.available.notify_one();
	}
}
