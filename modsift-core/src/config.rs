//! Runtime configuration for the capture pipeline and combination engine.
//!
//! Scoring weights and link-effect breakpoints live here as data so the
//! engine stays a pure function of its inputs and tests can run against
//! fixture tables.

use std::path::PathBuf;

use crate::constants::{
	DEFAULT_BASE_WEIGHT, DEFAULT_BREAKPOINTS, DEFAULT_IDLE_GRACE_MICROS, DEFAULT_SLOTS,
	DEFAULT_STALL_BUDGET, DEFAULT_TIER_BONUS, DEFAULT_TOP, DEFAULT_WANTED_WEIGHT,
};
use crate::module::{ATTR_COUNT, AttributeType};

/// Capture-side configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
	/// Narrow capture to this server TCP port; `None` observes all TCP.
	pub server_port: Option<u16>,
	/// Idle time (capture clock, microseconds) before a silent stream is
	/// evicted. Heuristic only, not correctness-critical.
	pub idle_grace_micros: u64,
	/// Out-of-order bytes buffered per stream before declaring it stalled.
	pub stall_budget: usize,
	/// Write every observed packet to this pcap file.
	pub dump_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
	fn default() -> Self {
		Self {
			server_port: None,
			idle_grace_micros: DEFAULT_IDLE_GRACE_MICROS,
			stall_budget: DEFAULT_STALL_BUDGET,
			dump_path: None,
		}
	}
}

impl CaptureConfig {
	pub fn new() -> Self { Self::default() }

	#[must_use]
	pub fn with_server_port(mut self, port: Option<u16>) -> Self {
		self.server_port = port;
		self
	}

	#[must_use]
	pub fn with_idle_grace_micros(mut self, micros: u64) -> Self {
		self.idle_grace_micros = micros;
		self
	}

	#[must_use]
	pub fn with_stall_budget(mut self, bytes: usize) -> Self {
		self.stall_budget = bytes;
		self
	}

	#[must_use]
	pub fn with_dump_path(mut self, path: Option<PathBuf>) -> Self {
		self.dump_path = path;
		self
	}
}

/// Scoring weights and tier bonuses.
#[derive(Debug, Clone)]
pub struct ScoreTable {
	/// Multiplier for attributes in the filter's wanted set.
	pub wanted_weight: u64,
	/// Multiplier for every other attribute.
	pub base_weight: u64,
	/// Bonus per reached tier, indexed by tier; saturates at the last entry.
	pub tier_bonus: Vec<u64>,
}

impl Default for ScoreTable {
	fn default() -> Self {
		Self {
			wanted_weight: DEFAULT_WANTED_WEIGHT,
			base_weight: DEFAULT_BASE_WEIGHT,
			tier_bonus: DEFAULT_TIER_BONUS.to_vec(),
		}
	}
}

impl ScoreTable {
	pub fn weight(&self, wanted: bool) -> u64 {
		if wanted { self.wanted_weight } else { self.base_weight }
	}

	pub fn bonus(&self, tier: u8) -> u64 {
		let idx = (tier as usize).min(self.tier_bonus.len().saturating_sub(1));
		self.tier_bonus.get(idx).copied().unwrap_or(0)
	}

	/// Largest bonus any single attribute can contribute.
	pub fn max_bonus(&self) -> u64 { self.tier_bonus.last().copied().unwrap_or(0) }
}

/// Per-attribute link-effect breakpoint tables.
///
/// Each table is a monotonically non-decreasing sequence; the tier reached
/// by a summed value is the count of breakpoints not exceeding it.
#[derive(Debug, Clone)]
pub struct LinkTable {
	breakpoints: Vec<Vec<u16>>,
}

impl Default for LinkTable {
	fn default() -> Self {
		Self {
			breakpoints: vec![DEFAULT_BREAKPOINTS.to_vec(); ATTR_COUNT],
		}
	}
}

impl LinkTable {
	pub fn new() -> Self { Self::default() }

	/// Overrides the breakpoint table for one attribute.
	#[must_use]
	pub fn with_breakpoints(mut self, attr: AttributeType, mut table: Vec<u16>) -> Self {
		table.sort_unstable();
		self.breakpoints[attr.index()] = table;
		self
	}

	/// Tier reached by a summed attribute value.
	pub fn tier(&self, attr: AttributeType, total: u32) -> u8 {
		self.breakpoints[attr.index()]
			.iter()
			.take_while(|&&b| u32::from(b) <= total)
			.count() as u8
	}
}

/// Combination engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Loadout slot count k.
	pub slots: usize,
	/// Number of ranked combinations to return.
	pub top: usize,
	pub score: ScoreTable,
	pub links: LinkTable,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			slots: DEFAULT_SLOTS,
			top: DEFAULT_TOP,
			score: ScoreTable::default(),
			links: LinkTable::default(),
		}
	}
}

impl EngineConfig {
	pub fn new() -> Self { Self::default() }

	#[must_use]
	pub fn with_slots(mut self, slots: usize) -> Self {
		self.slots = slots;
		self
	}

	#[must_use]
	pub fn with_top(mut self, top: usize) -> Self {
		self.top = top;
		self
	}
}

/// Combined session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
	pub capture: CaptureConfig,
	pub engine: EngineConfig,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_tiers() {
		let links = LinkTable::default();
		assert_eq!(links.tier(AttributeType::Strength, 0), 0);
		assert_eq!(links.tier(AttributeType::Strength, 1), 1);
		assert_eq!(links.tier(AttributeType::Strength, 19), 5);
		assert_eq!(links.tier(AttributeType::Strength, 20), 6);
		assert_eq!(links.tier(AttributeType::Strength, 500), 6);
	}

	#[test]
	fn per_attribute_override() {
		let links = LinkTable::new().with_breakpoints(AttributeType::LuckFocus, vec![10, 2]);
		assert_eq!(links.tier(AttributeType::LuckFocus, 5), 1);
		assert_eq!(links.tier(AttributeType::Strength, 5), 2);
	}

	#[test]
	fn tier_bonus_saturates() {
		let score = ScoreTable::default();
		assert_eq!(score.bonus(0), 0);
		assert_eq!(score.bonus(6), 100_000);
		assert_eq!(score.bonus(99), 100_000);
	}
}
