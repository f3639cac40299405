use crate::{MDNS_PORT, MDNS_V4_IP, MDNS_V6_IP};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket as AsyncUdpSocket;

/// An mDNS multicast socket bound for a single local address.
///
/// Created synchronously so that socket errors surface before the engine's
/// background thread spins up; converted with [`into_async`](Self::into_async)
/// once inside the engine's runtime.
pub(super) struct MdnsSocket {
	socket: std::net::UdpSocket,
	multicast_addr: SocketAddr,
}
impl MdnsSocket {
	pub(super) fn open(address: IpAddr, loopback: bool) -> Result<Self, std::io::Error> {
		let socket = match address {
			IpAddr::V4(address) => {
				let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
				socket.set_reuse_address(true)?;
				socket.set_multicast_loop_v4(loopback)?;

				#[cfg(unix)]
				{
					socket.set_reuse_port(true)?;
				}

				socket.join_multicast_v4(&MDNS_V4_IP, &address)?;
				socket.bind(&socket2::SockAddr::from(SocketAddr::new(
					IpAddr::V4(Ipv4Addr::UNSPECIFIED),
					MDNS_PORT,
				)))?;

				socket
			}

			IpAddr::V6(_) => {
				let socket = socket2::Socket::new(socket2::Domain::IPV6, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))?;
				socket.set_reuse_address(true)?;
				socket.set_only_v6(true)?;
				socket.set_multicast_loop_v6(loopback)?;

				#[cfg(unix)]
				{
					socket.set_reuse_port(true)?;
				}

				// Group membership on the default interface; sessions are
				// bound to a single interface by contract.
				socket.join_multicast_v6(&MDNS_V6_IP, 0)?;
				socket.bind(&socket2::SockAddr::from(SocketAddr::new(
					IpAddr::V6(Ipv6Addr::UNSPECIFIED),
					MDNS_PORT,
				)))?;

				socket
			}
		};

		socket.set_nonblocking(true)?;

		Ok(Self {
			multicast_addr: match address {
				IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(MDNS_V4_IP), MDNS_PORT),
				IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(MDNS_V6_IP), MDNS_PORT),
			},
			socket: socket.into(),
		})
	}

	pub(super) async fn into_async(self) -> Result<AsyncMdnsSocket, std::io::Error> {
		Ok(AsyncMdnsSocket {
			socket: AsyncUdpSocket::from_std(self.socket)?,
			multicast_addr: self.multicast_addr,
		})
	}
}

pub(super) struct AsyncMdnsSocket {
	socket: AsyncUdpSocket,
	multicast_addr: SocketAddr,
}
impl AsyncMdnsSocket {
	pub(super) async fn send_to(&self, packet: &[u8], addr: SocketAddr) -> Result<(), std::io::Error> {
		self.socket.send_to(packet, addr).await.map(|_| ())
	}

	pub(super) async fn send_multicast(&self, packet: &[u8]) -> Result<(), std::io::Error> {
		self.socket.send_to(packet, self.multicast_addr).await.map(|_| ())
	}

	pub(super) fn recv(&self, buffer: Vec<u8>) -> MdnsSocketRecv {
		MdnsSocketRecv {
			socket: &self.socket,
			buffer,
		}
	}
}

pub(super) struct MdnsSocketRecv<'a> {
	socket: &'a AsyncUdpSocket,
	buffer: Vec<u8>,
}
impl MdnsSocketRecv<'_> {
	pub(super) async fn recv_from(&mut self) -> Result<((usize, SocketAddr), &[u8]), std::io::Error> {
		let recv = self.socket.recv_from(&mut self.buffer).await?;
		Ok((recv, &self.buffer))
	}
}
