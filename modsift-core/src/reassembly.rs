//! TCP stream reassembly.
//!
//! Groups sliced segments into ordered, per-direction byte streams. Handles
//! retransmission duplicates, overlapping segments and out-of-order arrival
//! using the transport sequence numbers. A gap that exceeds the buffering
//! budget does not corrupt ordering; the stream is reported as stalled and
//! resumes past the missing bytes, leaving resynchronization to the frame
//! decoder.

use std::collections::{BTreeMap, HashMap, btree_map::Entry};

use log::{debug, trace};

use crate::flow::{FlowKey, TcpSegment};

/// Event produced by the reassembler for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
	/// A connection opened (SYN) or was adopted mid-stream.
	Opened(FlowKey),
	/// Contiguous in-order bytes became available.
	Data(FlowKey, Vec<u8>),
	/// A gap exceeded the buffering budget and was skipped.
	Stalled(FlowKey),
	/// The connection closed (FIN/RST) or was evicted as idle.
	Closed(FlowKey),
}

struct Stream {
	next_seq: u32,
	/// Out-of-order segments keyed by absolute sequence number.
	pending: BTreeMap<u32, Vec<u8>>,
	buffered: usize,
	last_seen: u64,
}

impl Stream {
	fn new(next_seq: u32, now: u64) -> Self {
		Self {
			next_seq,
			pending: BTreeMap::new(),
			buffered: 0,
			last_seen: now,
		}
	}

	fn offer(&mut self, seq: u32, payload: &[u8]) {
		let dist = seq.wrapping_sub(self.next_seq) as i32;
		if dist < 0 {
			// Retransmission overlapping already-delivered bytes.
			let overlap = dist.unsigned_abs() as usize;
			if overlap >= payload.len() {
				trace!("Duplicate segment dropped at seq {}", seq);
				return;
			}
			self.insert(self.next_seq, &payload[overlap..]);
		} else {
			self.insert(seq, payload);
		}
	}

	fn insert(&mut self, seq: u32, payload: &[u8]) {
		match self.pending.entry(seq) {
			Entry::Occupied(mut entry) => {
				// Keep the longer segment at the same offset.
				if entry.get().len() < payload.len() {
					self.buffered += payload.len() - entry.get().len();
					entry.insert(payload.to_vec());
				}
			}
			Entry::Vacant(entry) => {
				self.buffered += payload.len();
				entry.insert(payload.to_vec());
			}
		}
	}

	/// Moves all bytes that are now contiguous into `out`.
	fn drain_ready(&mut self, out: &mut Vec<u8>) {
		loop {
			let next = self
				.pending
				.range(self.next_seq..)
				.next()
				.map(|(k, _)| *k)
				.or_else(|| self.pending.keys().next().copied());
			let Some(seq) = next else { break };
			if seq.wrapping_sub(self.next_seq) as i32 > 0 {
				break;
			}
			let Some(chunk) = self.pending.remove(&seq) else { break };
			self.buffered -= chunk.len();
			let overlap = self.next_seq.wrapping_sub(seq) as usize;
			if overlap < chunk.len() {
				let fresh = &chunk[overlap..];
				out.extend_from_slice(fresh);
				self.next_seq = self.next_seq.wrapping_add(fresh.len() as u32);
			}
		}
	}

	/// Jumps past the missing bytes to the earliest buffered segment.
	fn skip_gap(&mut self) {
		let closest = self
			.pending
			.keys()
			.copied()
			.min_by_key(|seq| seq.wrapping_sub(self.next_seq));
		if let Some(seq) = closest {
			self.next_seq = seq;
		}
	}
}

/// Per-connection stream reassembler with bounded memory.
pub struct StreamReassembler {
	streams: HashMap<FlowKey, Stream>,
	idle_grace_micros: u64,
	stall_budget: usize,
}

impl StreamReassembler {
	pub fn new(idle_grace_micros: u64, stall_budget: usize) -> Self {
		Self {
			streams: HashMap::new(),
			idle_grace_micros,
			stall_budget,
		}
	}

	/// Number of currently tracked streams.
	pub fn stream_count(&self) -> usize { self.streams.len() }

	/// Feeds one segment, appending resulting events to `out`.
	///
	/// `now` is the capture clock in microseconds; it drives idle eviction
	/// only and has no bearing on ordering correctness.
	pub fn push(&mut self, seg: &TcpSegment, now: u64, out: &mut Vec<StreamEvent>) {
		if seg.rst {
			if self.streams.remove(&seg.flow).is_some() {
				debug!("Stream {} reset", seg.flow);
				out.push(StreamEvent::Closed(seg.flow));
			}
			return;
		}

		if seg.syn {
			// A SYN on a known tuple means the connection was reused.
			if self.streams.remove(&seg.flow).is_some() {
				out.push(StreamEvent::Closed(seg.flow));
			}
			self
				.streams
				.insert(seg.flow, Stream::new(seg.seq.wrapping_add(1), now));
			out.push(StreamEvent::Opened(seg.flow));
			return;
		}

		if !self.streams.contains_key(&seg.flow) {
			if seg.payload.is_empty() && !seg.fin {
				return;
			}
			// Capture started mid-connection; adopt at the observed seq.
			debug!("Adopting stream {} mid-connection at seq {}", seg.flow, seg.seq);
			self.streams.insert(seg.flow, Stream::new(seg.seq, now));
			out.push(StreamEvent::Opened(seg.flow));
		}
		let Some(stream) = self.streams.get_mut(&seg.flow) else {
			return;
		};
		stream.last_seen = now;

		if !seg.payload.is_empty() {
			stream.offer(seg.seq, seg.payload);
			if stream.buffered > self.stall_budget {
				debug!(
					"Stream {} stalled with {} buffered bytes, skipping gap",
					seg.flow, stream.buffered
				);
				out.push(StreamEvent::Stalled(seg.flow));
				stream.skip_gap();
			}
			let mut assembled = Vec::new();
			stream.drain_ready(&mut assembled);
			if !assembled.is_empty() {
				out.push(StreamEvent::Data(seg.flow, assembled));
			}
		}

		if seg.fin {
			self.streams.remove(&seg.flow);
			out.push(StreamEvent::Closed(seg.flow));
		}
	}

	/// Evicts streams with no traffic for the grace interval.
	pub fn evict_idle(&mut self, now: u64, out: &mut Vec<StreamEvent>) {
		let mut stale: Vec<FlowKey> = self
			.streams
			.iter()
			.filter(|(_, s)| now.saturating_sub(s.last_seen) > self.idle_grace_micros)
			.map(|(key, _)| *key)
			.collect();
		stale.sort();
		for key in stale {
			debug!("Evicting idle stream {}", key);
			self.streams.remove(&key);
			out.push(StreamEvent::Closed(key));
		}
	}
}
