#![cfg_attr(docsrs, feature(doc_cfg))]

//! Unified access to DNS-SD ("Bonjour") service discovery and advertisement
//! over pluggable backend drivers.
//!
//! Supply a [`Driver`](driver::Driver) and a [`Platform`](platform::Platform)
//! to the [`Lantern`] builder, then open discovery or broadcast sessions from
//! it. Sessions are lazy: no network activity happens until
//! [`start`](session::DiscoverySession::start) is called, and every session is
//! torn down exactly once when its handle is cancelled or dropped.

use std::net::{Ipv4Addr, Ipv6Addr};

#[macro_use]
extern crate thiserror;

pub mod backlog;
pub mod driver;
pub mod errors;
pub mod platform;
pub mod service;
pub mod session;

#[cfg(feature = "mdns")]
#[cfg_attr(docsrs, doc(cfg(feature = "mdns")))]
pub mod mdns;

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_V4_IP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_V6_IP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

pub use service::{is_service_type, BroadcastConfig, DiscoveredService, ServiceType};
pub use session::{Lantern, LanternBuilder};

pub use trust_dns_client as dns;
