use super::{packet, socket::MdnsSocket};
use crate::{
	backlog::Backlog,
	driver::{DiscoveryCallback, DiscoveryEngine},
	errors::Cause,
	service::{DiscoveredService, ServiceType},
};
use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};
use tokio::time::Instant;
use trust_dns_client::{
	op::{Message as DnsMessage, MessageType as DnsMessageType},
	rr::Name as DnsName,
	serialize::binary::BinDecodable,
};

/// How long a resolve query may go unanswered before the candidate is skipped
/// and the backlog moves on.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

pub(super) struct MdnsDiscoveryEngine {
	service_type: ServiceType,
	query_interval: Duration,
	max_missed_queries: u8,
	loopback: bool,
	shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
	backlog: Option<Backlog<DnsName>>,
}
impl MdnsDiscoveryEngine {
	pub(super) fn new(service_type: ServiceType, query_interval: Duration, max_missed_queries: u8, loopback: bool) -> Self {
		Self {
			service_type,
			query_interval,
			max_missed_queries,
			loopback,
			shutdown_tx: None,
			backlog: None,
		}
	}
}
impl DiscoveryEngine for MdnsDiscoveryEngine {
	fn initialize(&mut self) -> Result<(), Cause> {
		log::trace!("mDNS discovery engine initialized for {}", self.service_type);
		Ok(())
	}

	fn discover(&mut self, address: IpAddr, callback: Arc<dyn DiscoveryCallback>) -> Result<(), Cause> {
		let socket = MdnsSocket::open(address, self.loopback)?;
		let service_name = packet::service_dns_name(&self.service_type)?;

		let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
		let (resolve_tx, resolve_rx) = tokio::sync::mpsc::unbounded_channel();

		// The backlog worker only hands candidates over to the discovery loop;
		// the loop sends the resolve query and signals `proceed` once the
		// response arrives or the attempt times out.
		let backlog = Backlog::new(move |_: &Backlog<DnsName>, instance: DnsName| {
			resolve_tx.send(instance).ok();
		});

		let task = DiscoveryTask {
			socket,
			service_name,
			service_type: self.service_type.clone(),
			query_interval: self.query_interval,
			max_missed_queries: self.max_missed_queries,
			backlog: backlog.clone(),
			resolve_rx,
			callback: callback.clone(),
		};

		std::thread::spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.thread_name("Lantern mDNS Discovery (Tokio)")
				.enable_all()
				.build()
				.unwrap()
				.block_on(async move {
					tokio::select! {
						biased;
						res = task.run() => if let Err(err) = res {
							callback.discovery_failed(err.into());
						},
						_ = shutdown_rx => {}
					}
				})
		});

		self.shutdown_tx = Some(shutdown_tx);
		self.backlog = Some(backlog);

		Ok(())
	}

	fn teardown(&mut self) {
		// Fire-and-forget: the loop thread owns the socket and winds itself
		// down once signalled. Never blocks the cancelling thread.
		if let Some(shutdown_tx) = self.shutdown_tx.take() {
			shutdown_tx.send(()).ok();
		}
		if let Some(backlog) = self.backlog.take() {
			backlog.quit();
		}
		log::trace!("mDNS discovery engine for {} torn down", self.service_type);
	}
}

struct PendingResolve {
	instance: DnsName,
	deadline: Instant,
}

struct DiscoveryTask {
	socket: MdnsSocket,
	service_name: DnsName,
	service_type: ServiceType,
	query_interval: Duration,
	max_missed_queries: u8,
	backlog: Backlog<DnsName>,
	resolve_rx: tokio::sync::mpsc::UnboundedReceiver<DnsName>,
	callback: Arc<dyn DiscoveryCallback>,
}
impl DiscoveryTask {
	async fn run(self) -> Result<(), std::io::Error> {
		let DiscoveryTask {
			socket,
			service_name,
			service_type,
			query_interval,
			max_missed_queries,
			backlog,
			mut resolve_rx,
			callback,
		} = self;

		let socket = socket.into_async().await?;
		let mut socket_recv = socket.recv(vec![0; 4096]);

		let query = packet::query_packet(&service_name, false)?;
		let mut query_interval = tokio::time::interval(query_interval);
		query_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		let mut memory = InstanceMemory::default();
		let mut pending: Option<PendingResolve> = None;

		loop {
			let resolve_deadline = pending
				.as_ref()
				.map(|pending| pending.deadline)
				.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

			tokio::select! {
				biased; // Prefer handling packets

				recv = socket_recv.recv_from() => {
					let ((count, _), packet) = recv?;
					if count == 0 {
						continue;
					}
					Self::handle_packet(&packet[..count], &service_name, &service_type, &mut memory, &mut pending, &backlog, &callback);
				}

				Some(instance) = resolve_rx.recv(), if pending.is_none() => {
					let resolve = packet::resolve_packet(&instance, true)?;
					socket.send_multicast(&resolve).await?;
					pending = Some(PendingResolve {
						instance,
						deadline: Instant::now() + RESOLVE_TIMEOUT,
					});
				}

				_ = tokio::time::sleep_until(resolve_deadline), if pending.is_some() => {
					// Resolution failures never stall the queue; skip the
					// candidate and move on
					if let Some(pending) = pending.take() {
						log::debug!("resolution of {} timed out", pending.instance);
						memory.forget(&pending.instance);
						backlog.proceed();
					}
				}

				_ = query_interval.tick() => {
					socket.send_multicast(&query).await?;

					if max_missed_queries == 0 {
						continue;
					}

					// Remove responders that stayed silent for too many rounds
					for service in memory.sweep(max_missed_queries) {
						callback.service_lost(service);
					}
				}
			}
		}
	}

	fn handle_packet(
		packet: &[u8],
		service_name: &DnsName,
		service_type: &ServiceType,
		memory: &mut InstanceMemory,
		pending: &mut Option<PendingResolve>,
		backlog: &Backlog<DnsName>,
		callback: &Arc<dyn DiscoveryCallback>,
	) {
		let message = match DnsMessage::from_bytes(packet) {
			Ok(message) if message.message_type() == DnsMessageType::Response => message,
			_ => return,
		};

		for (instance, ttl) in packet::ptr_instances(&message, service_name) {
			if ttl == 0 {
				// Goodbye packet
				if let Some(service) = memory.goodbye(&instance) {
					callback.service_lost(service);
				}
				continue;
			}

			if memory.known(&instance) {
				memory.mark_seen(&instance);
			} else {
				memory.enqueue(instance.clone());
				backlog.add(instance);
			}
		}

		if let Some(in_flight) = pending.as_ref() {
			if let Some(service) = packet::extract_service(&message, &in_flight.instance, service_type) {
				memory.resolve(&in_flight.instance, service.clone());
				callback.service_resolved(service);
				*pending = None;
				backlog.proceed();
			}
		}
	}
}

/// Tracks which instances are live, which are still waiting on resolution and
/// how many query rounds each has ignored.
#[derive(Default)]
struct InstanceMemory(HashMap<DnsName, InstanceEntry>);

struct InstanceEntry {
	/// `None` until the instance has been resolved.
	service: Option<DiscoveredService>,
	missed_queries: u8,
}

impl InstanceMemory {
	fn known(&self, instance: &DnsName) -> bool {
		self.0.contains_key(instance)
	}

	fn enqueue(&mut self, instance: DnsName) {
		self.0.insert(
			instance,
			InstanceEntry {
				service: None,
				missed_queries: 0,
			},
		);
	}

	fn mark_seen(&mut self, instance: &DnsName) {
		if let Some(entry) = self.0.get_mut(instance) {
			entry.missed_queries = 0;
		}
	}

	fn resolve(&mut self, instance: &DnsName, service: DiscoveredService) {
		self.0.insert(
			instance.clone(),
			InstanceEntry {
				service: Some(service),
				missed_queries: 0,
			},
		);
	}

	fn forget(&mut self, instance: &DnsName) {
		self.0.remove(instance);
	}

	fn goodbye(&mut self, instance: &DnsName) -> Option<DiscoveredService> {
		self.0.remove(instance).and_then(|entry| entry.service)
	}

	fn sweep(&mut self, max_missed_queries: u8) -> Vec<DiscoveredService> {
		let mut lost = Vec::new();
		self.0.retain(|_, entry| {
			if entry.missed_queries < max_missed_queries {
				entry.missed_queries += 1;
				true
			} else {
				if let Some(service) = entry.service.take() {
					lost.push(service);
				}
				false
			}
		});
		lost
	}
}
