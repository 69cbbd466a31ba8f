//! Error types for the capture and decode pipeline.
//!
//! Only capture- and session-scope failures are error values. Malformed
//! frames and undecodable module records are skipped with a log line and
//! never abort the pipeline.

use snafu::prelude::*;

/// Result type alias for operations using snafu error handling.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error type for capture and session operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
	/// Failed to open the WinDivert sniffing handle.
	#[cfg(windows)]
	#[snafu(display("Failed to open WinDivert with filter: {filter}"))]
	DivertOpen {
		source: windivert::error::WinDivertError,
		filter: String,
	},

	/// Failed to receive a packet from WinDivert.
	#[cfg(windows)]
	#[snafu(display("Failed to receive packet from WinDivert: {source}"))]
	DivertRecv {
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// Failed to open a pcap file for replay.
	#[snafu(display("Failed to open pcap file {path}: {source}"))]
	PcapOpen {
		source: std::io::Error,
		path: String,
	},

	/// Failed to parse the pcap file header or a record.
	#[snafu(display("Failed to read pcap file: {source}"))]
	PcapRead { source: pcap_file::PcapError },

	/// Failed to create the raw dump file.
	#[snafu(display("Failed to create dump file {path}: {source}"))]
	DumpCreate {
		source: std::io::Error,
		path: String,
	},

	/// Failed to write a packet record to the dump file.
	#[snafu(display("Failed to write to dump file: {source}"))]
	DumpWrite { source: pcap_file::PcapError },

	/// The capture file uses a link layer the pipeline cannot slice.
	#[snafu(display("Unsupported link layer in capture: {datalink}"))]
	UnsupportedDatalink { datalink: String },
}
