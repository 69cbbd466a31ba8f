//! Incremental frame decoding for one reassembled byte stream.
//!
//! A frame is a big-endian u32 length prefix (counting the whole frame)
//! followed by a u16 type tag and the body. The decoder buffers partial
//! frames across input chunks and resumes on the next push. Malformed
//! lengths trigger a bounded resynchronization scan; the decoder never
//! panics and always consumes at least one byte per resync.

use log::{debug, trace};

use crate::constants::{FRAME_HEADER_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN};

/// Known application frame types. Closed dispatch: anything else is
/// [`FrameKind::Unknown`] and is skipped by length without a decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
	Call,
	Notify,
	Return,
	Echo,
	StreamUp,
	StreamDown,
	Unknown(u16),
}

impl FrameKind {
	pub fn from_tag(tag: u16) -> Self {
		match tag {
			1 => FrameKind::Call,
			2 => FrameKind::Notify,
			3 => FrameKind::Return,
			4 => FrameKind::Echo,
			5 => FrameKind::StreamUp,
			6 => FrameKind::StreamDown,
			other => FrameKind::Unknown(other),
		}
	}

	fn is_known_tag(tag: u16) -> bool {
		!matches!(FrameKind::from_tag(tag), FrameKind::Unknown(_))
	}
}

/// One complete application frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	pub kind: FrameKind,
	pub payload: Vec<u8>,
}

/// Restartable frame decoder for a single connection direction.
#[derive(Default)]
pub struct FrameDecoder {
	buf: Vec<u8>,
	needs_sync: bool,
	frames_skipped: u64,
}

impl FrameDecoder {
	pub fn new() -> Self { Self::default() }

	/// Appends a chunk of reassembled stream bytes.
	pub fn push(&mut self, chunk: &[u8]) { self.buf.extend_from_slice(chunk); }

	/// Bytes currently buffered, bounded by [`MAX_FRAME_LEN`] plus one
	/// unfinished input chunk.
	pub fn buffered(&self) -> usize { self.buf.len() }

	/// Count of unknown-type frames dropped on the fast path.
	pub fn frames_skipped(&self) -> u64 { self.frames_skipped }

	/// Drops buffered bytes after a stream gap. The decoder scans for the
	/// next plausible frame boundary before emitting frames again.
	pub fn desync(&mut self) {
		debug!("Frame decoder desynchronized, dropping {} buffered bytes", self.buf.len());
		self.buf.clear();
		self.needs_sync = true;
	}

	/// Returns the next complete frame of a known type, or `None` when more
	/// input is needed.
	pub fn next_frame(&mut self) -> Option<Frame> {
		loop {
			if self.needs_sync {
				if self.buf.len() < FRAME_HEADER_LEN {
					return None;
				}
				self.resync(0);
				if self.buf.len() < FRAME_HEADER_LEN || !plausible_header(&self.buf) {
					return None;
				}
				self.needs_sync = false;
			}

			if self.buf.len() < FRAME_HEADER_LEN {
				return None;
			}

			let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
			let tag = u16::from_be_bytes([self.buf[4], self.buf[5]]);

			if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) {
				debug!("Malformed frame length {}, resynchronizing", len);
				self.resync(1);
				continue;
			}

			if self.buf.len() < len {
				return None;
			}

			let kind = FrameKind::from_tag(tag);
			if let FrameKind::Unknown(tag) = kind {
				// Fast path: irrelevant frame, skip by length without decode.
				trace!("Skipping unknown frame tag {} ({} bytes)", tag, len);
				self.buf.drain(..len);
				self.frames_skipped += 1;
				continue;
			}

			let payload = self.buf[FRAME_HEADER_LEN..len].to_vec();
			self.buf.drain(..len);
			return Some(Frame { kind, payload });
		}
	}

	/// Scans from `start` for the next offset with a plausible header and
	/// drops everything before it. With no anchor found, keeps only the
	/// trailing bytes too short to judge.
	fn resync(&mut self, start: usize) {
		let mut found = None;
		let end = self.buf.len().saturating_sub(FRAME_HEADER_LEN - 1);
		for i in start..end {
			if plausible_header(&self.buf[i..]) {
				found = Some(i);
				break;
			}
		}
		match found {
			Some(0) => {}
			Some(i) => {
				self.buf.drain(..i);
			}
			None => {
				let keep = (FRAME_HEADER_LEN - 1).min(self.buf.len());
				let drop = self.buf.len() - keep;
				if drop > 0 {
					self.buf.drain(..drop);
				}
			}
		}
	}
}

fn plausible_header(bytes: &[u8]) -> bool {
	if bytes.len() < FRAME_HEADER_LEN {
		return false;
	}
	let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
	let tag = u16::from_be_bytes([bytes[4], bytes[5]]);
	(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) && FrameKind::is_known_tag(tag)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn frame_bytes(tag: u16, body: &[u8]) -> Vec<u8> {
		let len = (FRAME_HEADER_LEN + body.len()) as u32;
		let mut bytes = Vec::new();
		bytes.extend_from_slice(&len.to_be_bytes());
		bytes.extend_from_slice(&tag.to_be_bytes());
		bytes.extend_from_slice(body);
		bytes
	}

	#[test]
	fn decodes_single_frame() {
		let mut decoder = FrameDecoder::new();
		decoder.push(&frame_bytes(2, b"payload"));
		let frame = decoder.next_frame().unwrap();
		assert_eq!(frame.kind, FrameKind::Notify);
		assert_eq!(frame.payload, b"payload");
		assert!(decoder.next_frame().is_none());
	}

	#[test]
	fn resumes_across_chunk_boundaries() {
		let bytes = frame_bytes(2, b"split across packets");
		let mut decoder = FrameDecoder::new();
		for chunk in bytes.chunks(3) {
			decoder.push(chunk);
		}
		let frame = decoder.next_frame().unwrap();
		assert_eq!(frame.payload, b"split across packets");
	}

	#[test]
	fn unknown_tags_skipped_without_decode() {
		let mut bytes = frame_bytes(0x7777, b"ignored");
		bytes.extend_from_slice(&frame_bytes(4, b"ping"));
		let mut decoder = FrameDecoder::new();
		decoder.push(&bytes);
		let frame = decoder.next_frame().unwrap();
		assert_eq!(frame.kind, FrameKind::Echo);
		assert_eq!(decoder.frames_skipped(), 1);
	}

	#[test]
	fn zero_length_resynchronizes() {
		let mut bytes = vec![0, 0, 0, 0, 0, 2];
		bytes.extend_from_slice(&frame_bytes(2, b"ok"));
		let mut decoder = FrameDecoder::new();
		decoder.push(&bytes);
		let frame = decoder.next_frame().unwrap();
		assert_eq!(frame.payload, b"ok");
	}

	#[test]
	fn absurd_length_resynchronizes() {
		let mut bytes = vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 2];
		bytes.extend_from_slice(&frame_bytes(3, b"after"));
		let mut decoder = FrameDecoder::new();
		decoder.push(&bytes);
		let frame = decoder.next_frame().unwrap();
		assert_eq!(frame.kind, FrameKind::Return);
		assert_eq!(frame.payload, b"after");
	}

	#[test]
	fn garbage_keeps_bounded_tail() {
		let mut decoder = FrameDecoder::new();
		// Every u32 read from these bytes exceeds MAX_FRAME_LEN.
		decoder.push(&[0xFF; 64]);
		assert!(decoder.next_frame().is_none());
		assert!(decoder.buffered() < FRAME_HEADER_LEN);
	}

	#[test]
	fn desync_recovers_on_next_frame_boundary() {
		let mut decoder = FrameDecoder::new();
		let partial = frame_bytes(2, &vec![7u8; 100]);
		decoder.push(&partial[..20]);
		decoder.desync();
		// Mid-frame garbage that arrives after the gap.
		decoder.push(&[0x90, 0x91, 0x92]);
		decoder.push(&frame_bytes(2, b"fresh"));
		let frame = decoder.next_frame().unwrap();
		assert_eq!(frame.payload, b"fresh");
	}
}
