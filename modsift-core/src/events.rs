//! Session lifecycle events delivered to the front-end.

use serde::Serialize;

use crate::flow::FlowKey;

/// Status events emitted by the capture pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionEvent {
	/// A game connection was opened or adopted mid-stream.
	ConnectionObserved(FlowKey),
	/// The first full inventory push arrived; the login completed.
	LoginDetected,
	/// The snapshot was replaced or merged.
	InventoryUpdated {
		revision: u64,
		modules: usize,
		full: bool,
	},
	/// A stream lost bytes and was resynchronized.
	StreamStalled(FlowKey),
	/// Capture-scope failure; the session terminated.
	CaptureError(String),
	/// The packet source ran out (file exhausted or handle shut down).
	CaptureFinished,
	/// Explicit stop was requested.
	Stopped,
}
