//! Flow identification and TCP slicing of captured packets.

use std::net::{IpAddr, SocketAddr};

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use log::debug;
use serde::Serialize;

use crate::capture::{CapturedPacket, LinkKind};

/// Key identifying one direction of a TCP connection.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize)]
pub struct FlowKey {
	pub src: SocketAddr,
	pub dst: SocketAddr,
}

impl std::fmt::Display for FlowKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} -> {}", self.src, self.dst)
	}
}

/// One TCP segment sliced out of a captured packet.
#[derive(Debug)]
pub struct TcpSegment<'a> {
	pub flow: FlowKey,
	pub seq: u32,
	pub syn: bool,
	pub fin: bool,
	pub rst: bool,
	pub payload: &'a [u8],
}

/// Slices a captured packet into a TCP segment.
///
/// Non-IP and non-TCP packets yield `None`; the caller just skips them.
pub fn slice_tcp(packet: &CapturedPacket) -> Option<TcpSegment<'_>> {
	let sliced = match packet.link {
		LinkKind::Ethernet => SlicedPacket::from_ethernet(&packet.data),
		LinkKind::Ip => SlicedPacket::from_ip(&packet.data),
	};
	let Ok(sliced) = sliced else {
		debug!(
			"Failed to parse packet headers - data length: {}",
			packet.data.len()
		);
		return None;
	};

	let (src_addr, dst_addr): (IpAddr, IpAddr) = match sliced.net {
		Some(NetSlice::Ipv4(ip4)) => (
			ip4.header().source_addr().into(),
			ip4.header().destination_addr().into(),
		),
		Some(NetSlice::Ipv6(ip6)) => (
			ip6.header().source_addr().into(),
			ip6.header().destination_addr().into(),
		),
		_ => return None,
	};

	let Some(TransportSlice::Tcp(tcp)) = sliced.transport else {
		return None;
	};

	Some(TcpSegment {
		flow: FlowKey {
			src: SocketAddr::new(src_addr, tcp.source_port()),
			dst: SocketAddr::new(dst_addr, tcp.destination_port()),
		},
		seq: tcp.sequence_number(),
		syn: tcp.syn(),
		fin: tcp.fin(),
		rst: tcp.rst(),
		payload: tcp.payload(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ip_packet(payload: &[u8], syn: bool) -> CapturedPacket {
		let builder =
			etherparse::PacketBuilder::ipv4([10, 0, 0, 2], [10, 0, 0, 1], 64).tcp(49152, 5003, 1000, 65535);
		let builder = if syn { builder.syn() } else { builder };
		let mut data = Vec::new();
		builder.write(&mut data, payload).unwrap();
		CapturedPacket {
			timestamp_micros: 0,
			link: LinkKind::Ip,
			data,
		}
	}

	#[test]
	fn slices_tcp_segment() {
		let packet = ip_packet(b"hello", false);
		let seg = slice_tcp(&packet).unwrap();
		assert_eq!(seg.flow.src.port(), 49152);
		assert_eq!(seg.flow.dst.port(), 5003);
		assert_eq!(seg.seq, 1000);
		assert_eq!(seg.payload, b"hello");
		assert!(!seg.syn);
	}

	#[test]
	fn slices_syn_flag() {
		let packet = ip_packet(b"", true);
		let seg = slice_tcp(&packet).unwrap();
		assert!(seg.syn);
		assert!(seg.payload.is_empty());
	}

	#[test]
	fn garbage_yields_none() {
		let packet = CapturedPacket {
			timestamp_micros: 0,
			link: LinkKind::Ip,
			data: vec![0xFF; 10],
		};
		assert!(slice_tcp(&packet).is_none());
	}
}
