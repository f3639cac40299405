//! DNS message assembly and parsing for the bundled mDNS driver. Wire format
//! never leaves this module.

use crate::service::{BroadcastConfig, DiscoveredService, ServiceType};
use std::{collections::BTreeMap, net::IpAddr};
use trust_dns_client::{
	op::{Header as DnsHeader, Message as DnsMessage, MessageType as DnsMessageType, OpCode as DnsOpCode, Query as DnsQuery},
	proto::error::ProtoResult,
	rr::{
		rdata::{SRV, TXT},
		DNSClass as DnsClass, Name as DnsName, RData, Record as DnsRecord, RecordType as DnsRecordType,
	},
	serialize::binary::BinEncodable,
};

const DEFAULT_TTL: u32 = 120;
const TXT_MAX_LEN: usize = 255;

/// The fully qualified DNS name of a service type, defaulting to the `local.`
/// domain when the type does not carry one.
pub(crate) fn service_dns_name(service_type: &ServiceType) -> ProtoResult<DnsName> {
	let service_type = service_type.as_str();
	if service_type.ends_with('.') {
		DnsName::from_utf8(service_type)
	} else {
		DnsName::from_utf8(format!("{service_type}.local."))
	}
}

/// `<instance>.<service type>`, with the instance as a single raw label so
/// that names containing dots or spaces survive intact.
pub(crate) fn instance_dns_name(instance: &str, service_name: &DnsName) -> ProtoResult<DnsName> {
	DnsName::from_labels([instance.as_bytes()])?.append_name(service_name)
}

/// `<instance>.local.`, the advertised hostname of a broadcast service.
pub(crate) fn host_dns_name(instance: &str) -> ProtoResult<DnsName> {
	DnsName::from_labels([instance.as_bytes()])?.append_name(&DnsName::from_utf8("local.")?)
}

fn query(name: &DnsName, query_type: DnsRecordType, unicast: bool) -> Result<Vec<u8>, std::io::Error> {
	DnsMessage::new()
		.add_query({
			let mut query = DnsQuery::new();

			query
				.set_name(name.clone())
				.set_query_type(query_type)
				.set_query_class(DnsClass::IN)
				.set_mdns_unicast_response(unicast);

			query
		})
		.to_bytes()
		.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, format!("Query packet failed to serialize: {err}")))
}

/// A PTR query for every instance of a service type.
pub(crate) fn query_packet(service_name: &DnsName, unicast: bool) -> Result<Vec<u8>, std::io::Error> {
	query(service_name, DnsRecordType::PTR, unicast)
}

/// An ANY query resolving a single instance (SRV, TXT and address records).
pub(crate) fn resolve_packet(instance: &DnsName, unicast: bool) -> Result<Vec<u8>, std::io::Error> {
	query(instance, DnsRecordType::ANY, unicast)
}

/// Builds the DNS response advertising a broadcast service: a PTR answer plus
/// address, SRV and TXT additionals.
pub(crate) fn broadcast_response(
	config: &BroadcastConfig,
	service_name: &DnsName,
	service_id: &DnsName,
	hostname: &DnsName,
	address: IpAddr,
) -> DnsMessage {
	let mut response = DnsMessage::new();

	response.set_header({
		let mut header = DnsHeader::new();
		header.set_authoritative(true);
		header.set_message_type(DnsMessageType::Response);
		header.set_op_code(DnsOpCode::Query);
		header.set_answer_count(1);
		header.set_additional_count(3);
		header
	});

	response.add_answer({
		let mut record = DnsRecord::new();

		record
			.set_dns_class(DnsClass::IN)
			.set_rr_type(DnsRecordType::PTR)
			.set_data(Some(RData::PTR(service_id.clone())))
			.set_name(service_name.clone())
			.set_ttl(DEFAULT_TTL);

		record
	});

	response.add_additional({
		let mut record = DnsRecord::new();

		record
			.set_dns_class(DnsClass::IN)
			.set_rr_type(match address {
				IpAddr::V4(_) => DnsRecordType::A,
				IpAddr::V6(_) => DnsRecordType::AAAA,
			})
			.set_data(Some(match address {
				IpAddr::V4(address) => RData::A(address),
				IpAddr::V6(address) => RData::AAAA(address),
			}))
			.set_name(hostname.clone())
			.set_ttl(DEFAULT_TTL)
			.set_mdns_cache_flush(true);

		record
	});

	response.add_additional({
		let mut record = DnsRecord::new();

		record
			.set_dns_class(DnsClass::IN)
			.set_rr_type(DnsRecordType::SRV)
			.set_data(Some(RData::SRV(SRV::new(0, 0, config.port(), hostname.clone()))))
			.set_name(service_id.clone())
			.set_ttl(DEFAULT_TTL);

		record
	});

	response.add_additional({
		let txt = txt_strings(config.txt_records());
		let mut record = DnsRecord::new();

		record
			.set_dns_class(DnsClass::IN)
			.set_rr_type(DnsRecordType::TXT)
			.set_data(Some(RData::TXT(TXT::from_bytes(
				txt.iter().map(|txt| txt.as_slice()).collect::<Vec<&[u8]>>(),
			))))
			.set_name(service_id.clone())
			.set_ttl(DEFAULT_TTL)
			.set_mdns_cache_flush(true);

		record
	});

	response
}

fn txt_strings(txt_records: &BTreeMap<String, String>) -> Vec<Vec<u8>> {
	txt_records
		.iter()
		.filter_map(|(key, value)| {
			// Each key=value pair becomes one length-prefixed TXT string
			if key.len() + 1 + value.len() > TXT_MAX_LEN {
				log::warn!("TXT record '{key}' exceeds {TXT_MAX_LEN} bytes and will not be advertised");
				return None;
			}
			Some(format!("{key}={value}").into_bytes())
		})
		.collect()
}

/// Instances named by PTR answers for the given service type, with their TTLs
/// (a zero TTL is a goodbye).
pub(crate) fn ptr_instances(message: &DnsMessage, service_name: &DnsName) -> Vec<(DnsName, u32)> {
	message
		.answers()
		.iter()
		.filter_map(|record| match record.data() {
			Some(RData::PTR(instance)) if record.name() == service_name => Some((instance.clone(), record.ttl())),
			_ => None,
		})
		.collect()
}

/// Assembles a [`DiscoveredService`] for `instance` out of the SRV, address
/// and TXT records in a response, if the response carries enough of them.
///
/// Returns `None` when no address is known; a partially resolved service is
/// never surfaced.
pub(crate) fn extract_service(message: &DnsMessage, instance: &DnsName, service_type: &ServiceType) -> Option<DiscoveredService> {
	let records = || message.answers().iter().chain(message.additionals().iter());

	let srv = records().find_map(|record| match record.data() {
		Some(RData::SRV(srv)) if record.name() == instance => Some(srv),
		_ => None,
	})?;

	let mut ipv4 = None;
	let mut ipv6 = None;
	for record in records() {
		if record.name() != srv.target() {
			continue;
		}
		match record.data() {
			Some(RData::A(address)) => ipv4 = Some(*address),
			Some(RData::AAAA(address)) => ipv6 = Some(*address),
			_ => {}
		}
	}
	if ipv4.is_none() && ipv6.is_none() {
		return None;
	}

	let mut txt_records = BTreeMap::new();
	for record in records() {
		if record.name() != instance {
			continue;
		}
		if let Some(RData::TXT(txt)) = record.data() {
			for chunk in txt.txt_data() {
				let chunk = String::from_utf8_lossy(chunk);
				match chunk.split_once('=') {
					Some((key, value)) => {
						txt_records.insert(key.to_owned(), value.to_owned());
					}
					None if !chunk.is_empty() => {
						txt_records.insert(chunk.into_owned(), String::new());
					}
					None => {}
				}
			}
		}
	}

	Some(DiscoveredService {
		name: instance
			.iter()
			.next()
			.map(|label| String::from_utf8_lossy(label).into_owned())
			.unwrap_or_default(),
		service_type: service_type.clone(),
		ipv4,
		ipv6,
		port: srv.port(),
		txt_records,
	})
}
