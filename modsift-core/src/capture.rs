//! Packet sources for the pipeline.
//!
//! The pipeline consumes [`CapturedPacket`]s through the [`PacketSource`]
//! trait. Two sources are provided: live sniffing through WinDivert on
//! Windows and offline replay of pcap files. [`PcapDump`] records everything
//! the pipeline sees for a later replay.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapReader, PcapWriter};
use pcap_file::{DataLink, Endianness, TsResolution};
use snafu::ResultExt;

use crate::error;

#[cfg(windows)]
use crate::constants::MAX_PACKET_SIZE;
#[cfg(windows)]
use windivert::prelude::*;

/// Link layer of a captured packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
	/// Frames start with an Ethernet header (typical for pcap files).
	Ethernet,
	/// Frames start directly at the IP header (WinDivert network layer).
	Ip,
}

/// A single captured link-layer frame.
#[derive(Debug, Clone)]
pub struct CapturedPacket {
	/// Capture timestamp in microseconds. Only used as a relative clock
	/// for idle stream eviction.
	pub timestamp_micros: u64,
	pub link: LinkKind,
	pub data: Vec<u8>,
}

/// Blocking source of captured packets.
///
/// `Ok(None)` means the capture ended normally (file exhausted or handle
/// shut down); errors are capture-scope and terminate the session.
pub trait PacketSource {
	fn next_packet(&mut self) -> crate::Result<Option<CapturedPacket>>;
}

/// WinDivert filter string for observing game traffic.
///
/// Sniff mode only looks at TCP segments that can affect reassembly:
/// payload-bearing ones and connection lifecycle flags.
pub fn divert_filter(port: Option<u16>) -> String {
	let lifecycle = "tcp.PayloadLength > 0 or tcp.Syn or tcp.Fin or tcp.Rst";
	match port {
		Some(port) => format!(
			"(tcp ? ((tcp.SrcPort == {port} or tcp.DstPort == {port}) and ({lifecycle})) : false) \
			and (ip or ipv6)"
		),
		None => format!("(tcp ? ({lifecycle}) : false) and (ip or ipv6)"),
	}
}

/// Live passive capture through WinDivert in sniff mode.
///
/// Never diverts or reinjects traffic; the handle is opened recv-only.
#[cfg(windows)]
pub struct LiveCapture {
	divert: WinDivert<NetworkLayer>,
	buffer: Vec<u8>,
}

#[cfg(windows)]
impl LiveCapture {
	/// Opens the sniffing handle, optionally narrowed to one server port.
	///
	/// # Errors
	///
	/// Returns an error if WinDivert fails to initialize, typically when
	/// the driver is missing or admin rights are insufficient.
	pub fn open(port: Option<u16>) -> crate::Result<Self> {
		let filter = divert_filter(port);
		let flags = WinDivertFlags::new().set_sniff().set_recv_only();
		let divert = WinDivert::<NetworkLayer>::network(&filter, 0, flags)
			.context(error::DivertOpenSnafu { filter })?;

		Ok(Self {
			divert,
			buffer: vec![0u8; MAX_PACKET_SIZE],
		})
	}

	/// Returns a shutdown handle for graceful termination.
	///
	/// Shutting it down makes the blocked `next_packet` return `Ok(None)`.
	pub fn shutdown_handle(&self) -> windivert::ShutdownHandle {
		self.divert.shutdown_handle()
	}
}

#[cfg(windows)]
impl PacketSource for LiveCapture {
	fn next_packet(&mut self) -> crate::Result<Option<CapturedPacket>> {
		match self.divert.recv(&mut self.buffer) {
			Ok(packet) => {
				let timestamp_micros = std::time::SystemTime::now()
					.duration_since(std::time::SystemTime::UNIX_EPOCH)
					.map(|d| d.as_micros() as u64)
					.unwrap_or(0);
				Ok(Some(CapturedPacket {
					timestamp_micros,
					link: LinkKind::Ip,
					data: packet.data.to_vec(),
				}))
			}
			Err(WinDivertError::Recv(WinDivertRecvError::NoData)) => Ok(None),
			Err(e) => Err(crate::Error::DivertRecv {
				source: Box::new(e),
			}),
		}
	}
}

/// Offline replay of a pcap capture file.
pub struct PcapReplay {
	reader: PcapReader<File>,
	link: LinkKind,
}

impl PcapReplay {
	/// Opens a pcap file for replay.
	///
	/// # Errors
	///
	/// Returns an error if the file cannot be opened, the header is
	/// malformed, or the link layer is not Ethernet or raw IP.
	pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
		let path_str = path.as_ref().display().to_string();
		let file = File::open(path.as_ref()).context(error::PcapOpenSnafu { path: path_str })?;
		let reader = PcapReader::new(file).context(error::PcapReadSnafu)?;

		let datalink = reader.header().datalink;
		let link = match datalink {
			DataLink::ETHERNET => LinkKind::Ethernet,
			DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => LinkKind::Ip,
			other => {
				return error::UnsupportedDatalinkSnafu {
					datalink: format!("{other:?}"),
				}
				.fail();
			}
		};

		Ok(Self { reader, link })
	}
}

impl PacketSource for PcapReplay {
	fn next_packet(&mut self) -> crate::Result<Option<CapturedPacket>> {
		match self.reader.next_packet() {
			Some(Ok(packet)) => Ok(Some(CapturedPacket {
				timestamp_micros: packet.timestamp.as_micros() as u64,
				link: self.link,
				data: packet.data.into_owned(),
			})),
			Some(Err(e)) => Err(e).context(error::PcapReadSnafu),
			None => Ok(None),
		}
	}
}

/// Raw dump writer recording observed packets for later replay.
pub struct PcapDump {
	writer: PcapWriter<File>,
}

impl PcapDump {
	/// Creates the dump file with a header matching the capture link layer.
	///
	/// # Errors
	///
	/// Returns an error if the file cannot be created or the header fails
	/// to write.
	pub fn create(path: impl AsRef<Path>, link: LinkKind) -> crate::Result<Self> {
		let path_str = path.as_ref().display().to_string();
		let file = File::create(path.as_ref()).context(error::DumpCreateSnafu { path: path_str })?;
		let writer = PcapWriter::with_header(
			file,
			PcapHeader {
				version_major: 2,
				version_minor: 4,
				ts_correction: 0,
				ts_accuracy: 0,
				snaplen: 65535,
				datalink: match link {
					LinkKind::Ethernet => DataLink::ETHERNET,
					LinkKind::Ip => DataLink::RAW,
				},
				ts_resolution: TsResolution::MicroSecond,
				endianness: Endianness::native(),
			},
		)
		.context(error::DumpWriteSnafu)?;

		Ok(Self { writer })
	}

	/// Appends one packet record.
	pub fn write(&mut self, packet: &CapturedPacket) -> crate::Result<()> {
		let record = PcapPacket::new(
			Duration::from_micros(packet.timestamp_micros),
			packet.data.len() as u32,
			&packet.data,
		);
		self.writer.write_packet(&record).context(error::DumpWriteSnafu)?;
		Ok(())
	}
}
