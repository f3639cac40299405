use super::{packet, socket::MdnsSocket};
use crate::{
	driver::{BroadcastCallback, BroadcastEngine},
	errors::Cause,
	service::BroadcastConfig,
};
use std::{net::IpAddr, sync::Arc};
use trust_dns_client::{
	op::{Message as DnsMessage, MessageType as DnsMessageType},
	rr::Name as DnsName,
	serialize::binary::{BinDecodable, BinEncodable},
};

pub(super) struct MdnsBroadcastEngine {
	loopback: bool,
	shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}
impl MdnsBroadcastEngine {
	pub(super) fn new(loopback: bool) -> Self {
		Self {
			loopback,
			shutdown_tx: None,
		}
	}
}
impl BroadcastEngine for MdnsBroadcastEngine {
	fn initialize(&mut self) -> Result<(), Cause> {
		log::trace!("mDNS broadcast engine initialized");
		Ok(())
	}

	fn start(&mut self, address: IpAddr, config: &BroadcastConfig, callback: Arc<dyn BroadcastCallback>) -> Result<(), Cause> {
		let socket = MdnsSocket::open(address, self.loopback)?;

		let service_name = packet::service_dns_name(config.service_type())?;
		let service_id = packet::instance_dns_name(config.name(), &service_name)?;
		let hostname = packet::host_dns_name(config.name())?;

		let response = packet::broadcast_response(config, &service_name, &service_id, &hostname, address)
			.to_bytes()?;

		let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

		std::thread::spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.thread_name("Lantern mDNS Broadcast (Tokio)")
				.enable_all()
				.build()
				.unwrap()
				.block_on(async move {
					tokio::select! {
						biased;
						res = answer_loop(socket, response, service_name, service_id) => if let Err(err) = res {
							callback.broadcast_failed(err.into());
						},
						_ = shutdown_rx => {}
					}
				})
		});

		self.shutdown_tx = Some(shutdown_tx);

		Ok(())
	}

	fn teardown(&mut self) {
		if let Some(shutdown_tx) = self.shutdown_tx.take() {
			shutdown_tx.send(()).ok();
		}
		log::trace!("mDNS broadcast engine torn down");
	}
}

/// Announces the service once, then answers every matching PTR or instance
/// query until shut down.
async fn answer_loop(socket: MdnsSocket, response: Vec<u8>, service_name: DnsName, service_id: DnsName) -> Result<(), std::io::Error> {
	let socket = socket.into_async().await?;
	let mut socket_recv = socket.recv(vec![0; 4096]);

	socket.send_multicast(&response).await?;

	loop {
		let ((count, addr), packet) = socket_recv.recv_from().await?;
		if count == 0 {
			continue;
		}

		let message = match DnsMessage::from_bytes(&packet[..count]) {
			Ok(message) if !message.truncated() && message.message_type() == DnsMessageType::Query => message,
			_ => continue,
		};

		let unicast = match message
			.queries()
			.iter()
			.find(|query| *query.name() == service_name || *query.name() == service_id)
		{
			Some(query) => query.mdns_unicast_response(),
			None => continue,
		};

		if unicast {
			socket.send_to(&response, addr).await?;
		} else {
			socket.send_multicast(&response).await?;
		}
	}
}
