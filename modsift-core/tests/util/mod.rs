//! Shared helpers: synthetic packets and inventory frames.

#![allow(dead_code)]

use modsift_core::capture::{CapturedPacket, LinkKind, PacketSource};
use modsift_core::constants::{FRAME_HEADER_LEN, METHOD_SYNC_CONTAINER, SERVICE_CHAR_SYNC};

/// Builds an IPv4/TCP packet from the game server to the client.
pub fn server_packet(seq: u32, syn: bool, payload: &[u8], timestamp_micros: u64) -> CapturedPacket {
	let builder =
		etherparse::PacketBuilder::ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64).tcp(5003, 49152, seq, 65535);
	let builder = if syn { builder.syn() } else { builder };
	let mut data = Vec::new();
	builder.write(&mut data, payload).unwrap();
	CapturedPacket {
		timestamp_micros,
		link: LinkKind::Ip,
		data,
	}
}

pub fn varint(mut v: u64) -> Vec<u8> {
	let mut out = Vec::new();
	loop {
		let byte = (v & 0x7F) as u8;
		v >>= 7;
		if v == 0 {
			out.push(byte);
			break;
		}
		out.push(byte | 0x80);
	}
	out
}

pub fn field_varint(num: u8, v: u64) -> Vec<u8> {
	let mut out = vec![num << 3];
	out.extend_from_slice(&varint(v));
	out
}

pub fn field_len(num: u8, bytes: &[u8]) -> Vec<u8> {
	let mut out = vec![(num << 3) | 2];
	out.extend_from_slice(&varint(bytes.len() as u64));
	out.extend_from_slice(bytes);
	out
}

/// Encodes one module sub-record: uuid, config id, quality and parallel
/// packed arrays of attribute codes and values.
pub fn module_record(uuid: u64, config_id: u64, quality: u64, parts: &[(u16, u16)]) -> Vec<u8> {
	let mut body = Vec::new();
	body.extend_from_slice(&field_varint(1, uuid));
	body.extend_from_slice(&field_varint(2, config_id));
	body.extend_from_slice(&field_varint(3, quality));
	let codes: Vec<u8> = parts.iter().flat_map(|(c, _)| varint(*c as u64)).collect();
	let values: Vec<u8> = parts.iter().flat_map(|(_, v)| varint(*v as u64)).collect();
	body.extend_from_slice(&field_len(4, &codes));
	body.extend_from_slice(&field_len(5, &values));
	body
}

/// Wraps a notify payload in a complete wire frame.
pub fn frame_bytes(tag: u16, body: &[u8]) -> Vec<u8> {
	let len = (FRAME_HEADER_LEN + body.len()) as u32;
	let mut bytes = Vec::new();
	bytes.extend_from_slice(&len.to_be_bytes());
	bytes.extend_from_slice(&tag.to_be_bytes());
	bytes.extend_from_slice(body);
	bytes
}

/// Complete inventory notify frame for the given records.
pub fn inventory_frame(method: u32, records: &[Vec<u8>]) -> Vec<u8> {
	let mut payload = Vec::new();
	payload.extend_from_slice(&SERVICE_CHAR_SYNC.to_be_bytes());
	payload.extend_from_slice(&1u32.to_be_bytes());
	payload.extend_from_slice(&method.to_be_bytes());
	for rec in records {
		payload.extend_from_slice(&field_len(1, rec));
	}
	frame_bytes(2, &payload)
}

/// Full inventory frame shortcut.
pub fn full_inventory_frame(records: &[Vec<u8>]) -> Vec<u8> {
	inventory_frame(METHOD_SYNC_CONTAINER, records)
}

/// In-memory packet source for pipeline tests.
pub struct VecSource {
	packets: std::vec::IntoIter<CapturedPacket>,
}

impl VecSource {
	pub fn new(packets: Vec<CapturedPacket>) -> Self {
		Self {
			packets: packets.into_iter(),
		}
	}
}

impl PacketSource for VecSource {
	fn next_packet(&mut self) -> modsift_core::Result<Option<CapturedPacket>> {
		Ok(self.packets.next())
	}
}
