//! Session controller: capture lifecycle, snapshot ownership, re-filtering.
//!
//! One blocking task owns capture, reassembly, frame decoding and module
//! extraction, and is the only writer of the inventory snapshot. Filter
//! runs happen on the caller's thread against a loaded snapshot reference,
//! so re-filtering never touches capture.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::RwLock;

use crate::capture::{PacketSource, PcapDump};
use crate::config::SessionConfig;
use crate::events::SessionEvent;
use crate::extract::extract;
use crate::filter::{Filter, candidate_pool};
use crate::flow::{FlowKey, slice_tcp};
use crate::frame::FrameDecoder;
use crate::inventory::{InventorySnapshot, SnapshotHolder};
use crate::optimize::{ResultSet, optimize};
use crate::reassembly::{StreamEvent, StreamReassembler};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	Capturing,
	AwaitingLogin,
	InventoryReady,
	Filtering,
	Terminated,
}

/// Per-flow capture counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowStats {
	pub packets: u64,
	pub bytes: u64,
}

/// Handle to a monitoring session. Cheap to clone; all clones share the
/// same snapshot, state and event channel.
#[derive(Clone)]
pub struct Session {
	config: SessionConfig,
	holder: Arc<SnapshotHolder>,
	state: Arc<RwLock<SessionState>>,
	flows: Arc<DashMap<FlowKey, FlowStats>>,
	events: kanal::Sender<SessionEvent>,
	stop: Arc<AtomicBool>,
}

impl Session {
	/// Creates a session and the receiving end of its event channel.
	pub fn new(config: SessionConfig) -> (Self, kanal::Receiver<SessionEvent>) {
		let (tx, rx) = kanal::unbounded();
		(
			Self {
				config,
				holder: Arc::new(SnapshotHolder::new()),
				state: Arc::new(RwLock::new(SessionState::Idle)),
				flows: Arc::new(DashMap::new()),
				events: tx,
				stop: Arc::new(AtomicBool::new(false)),
			},
			rx,
		)
	}

	pub fn state(&self) -> SessionState { *self.state.read() }

	/// Current inventory snapshot reference.
	pub fn snapshot(&self) -> Arc<InventorySnapshot> { self.holder.load() }

	/// Per-flow capture counters, ordered by flow key.
	pub fn flow_stats(&self) -> Vec<(FlowKey, FlowStats)> {
		let mut stats: Vec<(FlowKey, FlowStats)> =
			self.flows.iter().map(|e| (*e.key(), *e.value())).collect();
		stats.sort_by_key(|(key, _)| *key);
		stats
	}

	/// Starts the capture pipeline on the current Tokio runtime.
	///
	/// The source is consumed on a blocking task; the returned handle
	/// resolves when capture ends (source exhausted, shutdown or error).
	pub fn start<S>(&self, source: S) -> tokio::task::JoinHandle<()>
	where
		S: PacketSource + Send + 'static,
	{
		*self.state.write() = SessionState::Capturing;
		let session = self.clone();
		tokio::task::spawn_blocking(move || session.pipeline(source))
	}

	/// Requests the pipeline to stop and terminates the session.
	pub fn stop(&self) {
		self.stop.store(true, Ordering::SeqCst);
		*self.state.write() = SessionState::Terminated;
		let _ = self.events.send(SessionEvent::Stopped);
	}

	/// Runs the combination engine against the latest snapshot.
	///
	/// Pure read; repeated runs against the same snapshot are idempotent
	/// and never require a new capture.
	pub fn run_filter(&self, filter: &Filter) -> ResultSet {
		{
			let mut state = self.state.write();
			if *state == SessionState::InventoryReady {
				*state = SessionState::Filtering;
			}
		}

		let snapshot = self.holder.load();
		let pool = candidate_pool(&snapshot, filter);
		let result = optimize(&pool, filter.wanted, &self.config.engine);
		info!(
			"Filter run on revision {}: pool {} -> {} combinations",
			snapshot.revision(),
			result.stats.pool_size,
			result.combinations.len()
		);

		{
			let mut state = self.state.write();
			if *state == SessionState::Filtering {
				*state = SessionState::InventoryReady;
			}
		}
		result
	}

	fn pipeline<S: PacketSource>(&self, mut source: S) {
		let capture = &self.config.capture;
		// The dump file is created lazily: its header needs the link kind
		// of the first captured packet.
		let mut dump: Option<PcapDump> = None;
		let mut dump_failed = capture.dump_path.is_none();

		let mut reassembler =
			StreamReassembler::new(capture.idle_grace_micros, capture.stall_budget);
		let mut decoders: HashMap<FlowKey, FrameDecoder> = HashMap::new();
		let mut events = Vec::new();

		info!("Capture pipeline started");
		loop {
			if self.stop.load(Ordering::SeqCst) {
				debug!("Stop requested, leaving capture loop");
				break;
			}

			let packet = match source.next_packet() {
				Ok(Some(packet)) => packet,
				Ok(None) => {
					info!("Capture source finished");
					let _ = self.events.send(SessionEvent::CaptureFinished);
					break;
				}
				Err(e) => {
					error!("Fatal capture error: {}", e);
					*self.state.write() = SessionState::Terminated;
					let _ = self.events.send(SessionEvent::CaptureError(e.to_string()));
					break;
				}
			};

			if !dump_failed && dump.is_none() {
				if let Some(path) = &capture.dump_path {
					match PcapDump::create(path, packet.link) {
						Ok(writer) => dump = Some(writer),
						Err(e) => {
							warn!("Disabling packet dump: {}", e);
							dump_failed = true;
						}
					}
				}
			}
			if let Some(writer) = dump.as_mut()
				&& let Err(e) = writer.write(&packet)
			{
				warn!("Disabling packet dump after write failure: {}", e);
				dump = None;
				dump_failed = true;
			}

			let Some(segment) = slice_tcp(&packet) else {
				continue;
			};
			// Port narrowing also applies to replayed captures, where no
			// driver-level filter ran.
			if let Some(port) = capture.server_port
				&& segment.flow.src.port() != port
				&& segment.flow.dst.port() != port
			{
				continue;
			}

			{
				let mut entry = self.flows.entry(segment.flow).or_default();
				entry.packets += 1;
				entry.bytes += segment.payload.len() as u64;
			}

			events.clear();
			reassembler.push(&segment, packet.timestamp_micros, &mut events);
			reassembler.evict_idle(packet.timestamp_micros, &mut events);
			for event in events.drain(..) {
				self.handle_stream_event(event, &mut decoders);
			}
		}

		info!("Capture pipeline ended");
	}

	fn handle_stream_event(
		&self, event: StreamEvent, decoders: &mut HashMap<FlowKey, FrameDecoder>,
	) {
		match event {
			StreamEvent::Opened(flow) => {
				debug!("Connection observed: {}", flow);
				decoders.insert(flow, FrameDecoder::new());
				{
					let mut state = self.state.write();
					if *state == SessionState::Capturing {
						*state = SessionState::AwaitingLogin;
					}
				}
				let _ = self.events.send(SessionEvent::ConnectionObserved(flow));
			}
			StreamEvent::Data(flow, bytes) => {
				let decoder = decoders.entry(flow).or_default();
				decoder.push(&bytes);
				while let Some(frame) = decoder.next_frame() {
					if let Some(extraction) = extract(&frame) {
						self.publish(extraction.modules, extraction.full_replace);
					}
				}
			}
			StreamEvent::Stalled(flow) => {
				warn!("Stream stalled: {}", flow);
				if let Some(decoder) = decoders.get_mut(&flow) {
					decoder.desync();
				}
				let _ = self.events.send(SessionEvent::StreamStalled(flow));
			}
			StreamEvent::Closed(flow) => {
				debug!("Connection closed: {}", flow);
				decoders.remove(&flow);
			}
		}
	}

	fn publish(&self, modules: Vec<crate::module::Module>, full: bool) {
		let count = modules.len();
		let revision = if full {
			self.holder.replace(modules)
		} else {
			self.holder.merge(modules)
		};

		// Only a full replace marks the login; a pre-login incremental merge
		// updates the snapshot without completing the state transition.
		{
			let mut state = self.state.write();
			if full && matches!(*state, SessionState::Capturing | SessionState::AwaitingLogin) {
				*state = SessionState::InventoryReady;
				info!("Login detected, inventory ready");
				let _ = self.events.send(SessionEvent::LoginDetected);
			}
		}
		let _ = self.events.send(SessionEvent::InventoryUpdated {
			revision,
			modules: count,
			full,
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_session_is_idle_and_empty() {
		let (session, _rx) = Session::new(SessionConfig::default());
		assert_eq!(session.state(), SessionState::Idle);
		assert!(session.snapshot().is_empty());
	}

	#[test]
	fn filter_on_empty_snapshot_is_empty_result() {
		let (session, _rx) = Session::new(SessionConfig::default());
		let result = session.run_filter(&Filter::new());
		assert!(result.is_empty());
		assert_eq!(session.state(), SessionState::Idle);
	}

	#[test]
	fn stop_terminates_and_emits() {
		let (session, rx) = Session::new(SessionConfig::default());
		session.stop();
		assert_eq!(session.state(), SessionState::Terminated);
		assert_eq!(rx.recv().unwrap(), SessionEvent::Stopped);
	}
}
