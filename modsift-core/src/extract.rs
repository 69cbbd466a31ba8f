//! Module extraction from inventory-bearing notify frames.
//!
//! The notify envelope is service id, stub id and method id (big endian)
//! followed by a protobuf-style payload of tagged fields. Only the character
//! sync service carries inventory; its container method distinguishes full
//! pushes from incremental ones. A sub-record that fails to decode is
//! skipped with a log line and the rest of the frame is still used, so a
//! partially corrupt push still yields a usable inventory update.

use log::{debug, trace};

use crate::constants::{
	MAX_MODULE_PARTS, METHOD_SYNC_CONTAINER, METHOD_SYNC_CONTAINER_DIRTY, SERVICE_CHAR_SYNC,
};
use crate::frame::{Frame, FrameKind};
use crate::module::{AttributeType, Category, Module};

/// Classification of one notify frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyClass {
	/// Full inventory push, replaces the snapshot wholesale.
	SyncContainer,
	/// Incremental update, merged by module id.
	SyncContainerDirty,
	/// Anything else, ignored.
	Other,
}

/// Result of decoding one inventory-bearing frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
	pub modules: Vec<Module>,
	/// True for a full push; false for an incremental update.
	pub full_replace: bool,
}

/// Splits a notify payload into its classification and inner body.
pub fn classify_notify(payload: &[u8]) -> (NotifyClass, &[u8]) {
	if payload.len() < 16 {
		return (NotifyClass::Other, &[]);
	}
	let service = u64::from_be_bytes([
		payload[0], payload[1], payload[2], payload[3], payload[4], payload[5], payload[6], payload[7],
	]);
	let method = u32::from_be_bytes([payload[12], payload[13], payload[14], payload[15]]);
	let body = &payload[16..];

	if service != SERVICE_CHAR_SYNC {
		return (NotifyClass::Other, body);
	}
	match method {
		METHOD_SYNC_CONTAINER => (NotifyClass::SyncContainer, body),
		METHOD_SYNC_CONTAINER_DIRTY => (NotifyClass::SyncContainerDirty, body),
		_ => (NotifyClass::Other, body),
	}
}

/// Decodes an inventory-bearing frame into module records.
///
/// Returns `None` for frames that carry no inventory: non-notify kinds,
/// other services or methods, and pushes that decode to zero modules (an
/// empty full push must not wipe an existing snapshot).
pub fn extract(frame: &Frame) -> Option<Extraction> {
	if frame.kind != FrameKind::Notify {
		return None;
	}
	let (class, body) = classify_notify(&frame.payload);
	let full_replace = match class {
		NotifyClass::SyncContainer => true,
		NotifyClass::SyncContainerDirty => false,
		NotifyClass::Other => return None,
	};

	let modules = decode_inventory(body);
	if modules.is_empty() {
		debug!("Inventory notify decoded to zero modules, ignoring");
		return None;
	}
	Some(Extraction {
		modules,
		full_replace,
	})
}

/// Walks the payload's top-level fields, decoding each module record.
fn decode_inventory(body: &[u8]) -> Vec<Module> {
	let mut modules = Vec::new();
	let mut i = 0;
	while i < body.len() {
		let tag = body[i];
		let wire_type = tag & 0x07;
		let field_num = tag >> 3;
		i += 1;

		if field_num == 1 && wire_type == 2 {
			let Some((len, read)) = read_varint(&body[i..]) else {
				debug!("Truncated record length at offset {}, stopping decode", i);
				break;
			};
			i += read;
			let Some(end) = i.checked_add(len as usize) else {
				debug!("Record length overflows payload, stopping decode");
				break;
			};
			let Some(record) = body.get(i..end) else {
				debug!("Record extends past payload end, stopping decode");
				break;
			};
			match decode_record(record) {
				Some(module) => modules.push(module),
				None => debug!("Skipping undecodable module record ({} bytes)", record.len()),
			}
			i = end;
		} else {
			match skip_field(wire_type, &body[i..]) {
				Some(skip) => i += skip,
				None => {
					debug!("Unskippable wire type {} at offset {}, stopping decode", wire_type, i);
					break;
				}
			}
		}
	}
	modules
}

/// Decodes one module sub-record. Any inconsistency rejects the record.
fn decode_record(record: &[u8]) -> Option<Module> {
	let mut uuid = 0u64;
	let mut config_id = 0u64;
	let mut quality = 0u64;
	let mut codes: Vec<u64> = Vec::new();
	let mut values: Vec<u64> = Vec::new();

	let mut i = 0;
	while i < record.len() {
		let tag = record[i];
		let wire_type = tag & 0x07;
		let field_num = tag >> 3;
		i += 1;

		match (field_num, wire_type) {
			(1, 0) => {
				let (v, read) = read_varint(&record[i..])?;
				uuid = v;
				i += read;
			}
			(2, 0) => {
				let (v, read) = read_varint(&record[i..])?;
				config_id = v;
				i += read;
			}
			(3, 0) => {
				let (v, read) = read_varint(&record[i..])?;
				quality = v;
				i += read;
			}
			(4, 2) => {
				let (len, read) = read_varint(&record[i..])?;
				i += read;
				let end = i.checked_add(len as usize)?;
				codes = read_packed(record.get(i..end)?)?;
				i = end;
			}
			(5, 2) => {
				let (len, read) = read_varint(&record[i..])?;
				i += read;
				let end = i.checked_add(len as usize)?;
				values = read_packed(record.get(i..end)?)?;
				i = end;
			}
			_ => i += skip_field(wire_type, &record[i..])?,
		}
	}

	if uuid == 0 {
		return None;
	}
	let config_id = u32::try_from(config_id).ok()?;
	let category = Category::from_config_id(config_id)?;
	if codes.is_empty() || codes.len() != values.len() || codes.len() > MAX_MODULE_PARTS {
		return None;
	}

	let mut attributes = Vec::with_capacity(codes.len());
	for (&code, &value) in codes.iter().zip(values.iter()) {
		let attr = AttributeType::from_code(code)?;
		if attributes.iter().any(|(a, _)| *a == attr) {
			// Duplicate attribute type within one module.
			return None;
		}
		let value = u16::try_from(value).ok()?;
		attributes.push((attr, value));
	}

	let module = Module {
		id: uuid,
		config_id,
		quality: u32::try_from(quality).ok()?,
		category,
		attributes,
	};
	trace!("Decoded module {} ({})", module.id, module.name());
	Some(module)
}

/// Reads a strict protobuf varint: `None` on truncation or overflow.
pub(crate) fn read_varint(data: &[u8]) -> Option<(u64, usize)> {
	let mut value = 0u64;
	let mut shift = 0u32;
	for (i, &byte) in data.iter().enumerate() {
		if shift >= 64 {
			return None;
		}
		value |= u64::from(byte & 0x7F) << shift;
		if byte & 0x80 == 0 {
			return Some((value, i + 1));
		}
		shift += 7;
	}
	None
}

/// Byte count to skip for an unknown field of the given wire type.
fn skip_field(wire_type: u8, data: &[u8]) -> Option<usize> {
	match wire_type {
		0 => read_varint(data).map(|(_, read)| read),
		1 => (data.len() >= 8).then_some(8),
		2 => {
			let (len, read) = read_varint(data)?;
			let total = read.checked_add(len as usize)?;
			(data.len() >= total).then_some(total)
		}
		5 => (data.len() >= 4).then_some(4),
		_ => None,
	}
}

fn read_packed(data: &[u8]) -> Option<Vec<u64>> {
	let mut out = Vec::new();
	let mut i = 0;
	while i < data.len() {
		let (value, read) = read_varint(&data[i..])?;
		out.push(value);
		i += read;
	}
	Some(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn varint(mut v: u64) -> Vec<u8> {
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

	fn field_varint(num: u8, v: u64) -> Vec<u8> {
		let mut out = vec![num << 3];
		out.extend_from_slice(&varint(v));
		out
	}

	fn field_len(num: u8, bytes: &[u8]) -> Vec<u8> {
		let mut out = vec![(num << 3) | 2];
		out.extend_from_slice(&varint(bytes.len() as u64));
		out.extend_from_slice(bytes);
		out
	}

	fn record(uuid: u64, config_id: u64, quality: u64, parts: &[(u16, u16)]) -> Vec<u8> {
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

	fn notify_frame(method: u32, records: &[Vec<u8>]) -> Frame {
		let mut payload = Vec::new();
		payload.extend_from_slice(&SERVICE_CHAR_SYNC.to_be_bytes());
		payload.extend_from_slice(&1u32.to_be_bytes());
		payload.extend_from_slice(&method.to_be_bytes());
		for rec in records {
			payload.extend_from_slice(&field_len(1, rec));
		}
		Frame {
			kind: FrameKind::Notify,
			payload,
		}
	}

	#[test]
	fn decodes_known_good_inventory() {
		let frame = notify_frame(
			METHOD_SYNC_CONTAINER,
			&[
				record(101, 5500102, 5, &[(1110, 8), (1113, 4)]),
				record(102, 5500301, 4, &[(1307, 6)]),
			],
		);
		let extraction = extract(&frame).unwrap();
		assert!(extraction.full_replace);
		assert_eq!(extraction.modules.len(), 2);

		let first = &extraction.modules[0];
		assert_eq!(first.id, 101);
		assert_eq!(first.category, Category::Attack);
		assert_eq!(first.quality, 5);
		assert_eq!(
			first.attributes,
			vec![(AttributeType::Strength, 8), (AttributeType::SpecialDamage, 4)]
		);
		assert_eq!(first.name(), "High Performance Attack");

		let second = &extraction.modules[1];
		assert_eq!(second.category, Category::Guard);
		assert_eq!(second.attributes, vec![(AttributeType::MagicResist, 6)]);
	}

	#[test]
	fn dirty_method_is_incremental() {
		let frame = notify_frame(
			METHOD_SYNC_CONTAINER_DIRTY,
			&[record(7, 5500201, 3, &[(1205, 2)])],
		);
		let extraction = extract(&frame).unwrap();
		assert!(!extraction.full_replace);
		assert_eq!(extraction.modules[0].category, Category::Assist);
	}

	#[test]
	fn bad_records_are_skipped_not_fatal() {
		let good = record(1, 5500101, 1, &[(1110, 3)]);
		let unknown_config = record(2, 123, 1, &[(1110, 3)]);
		let unknown_attr = record(3, 5500101, 1, &[(42, 3)]);
		let duplicate_attr = record(4, 5500101, 1, &[(1110, 3), (1110, 5)]);
		let mismatched = {
			let mut body = Vec::new();
			body.extend_from_slice(&field_varint(1, 5));
			body.extend_from_slice(&field_varint(2, 5500101));
			body.extend_from_slice(&field_len(4, &varint(1110)));
			body.extend_from_slice(&field_len(5, &[varint(3), varint(4)].concat()));
			body
		};
		let frame = notify_frame(
			METHOD_SYNC_CONTAINER,
			&[unknown_config, good.clone(), unknown_attr, duplicate_attr, mismatched],
		);
		let extraction = extract(&frame).unwrap();
		assert_eq!(extraction.modules.len(), 1);
		assert_eq!(extraction.modules[0].id, 1);
	}

	#[test]
	fn other_services_and_kinds_ignored() {
		let mut payload = Vec::new();
		payload.extend_from_slice(&0xDEAD_BEEFu64.to_be_bytes());
		payload.extend_from_slice(&1u32.to_be_bytes());
		payload.extend_from_slice(&METHOD_SYNC_CONTAINER.to_be_bytes());
		let frame = Frame {
			kind: FrameKind::Notify,
			payload,
		};
		assert!(extract(&frame).is_none());

		let echo = Frame {
			kind: FrameKind::Echo,
			payload: vec![0; 32],
		};
		assert!(extract(&echo).is_none());
	}

	#[test]
	fn empty_full_push_is_not_inventory_bearing() {
		let frame = notify_frame(METHOD_SYNC_CONTAINER, &[]);
		assert!(extract(&frame).is_none());
	}

	#[test]
	fn truncated_payload_never_panics() {
		let frame = notify_frame(METHOD_SYNC_CONTAINER, &[record(9, 5500101, 2, &[(1110, 1)])]);
		for cut in 0..frame.payload.len() {
			let truncated = Frame {
				kind: FrameKind::Notify,
				payload: frame.payload[..cut].to_vec(),
			};
			let _ = extract(&truncated);
		}
	}
}
