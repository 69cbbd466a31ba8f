//! Combination engine: search, score, dedup and rank module loadouts.
//!
//! The engine is a pure function of (candidate pool, wanted attributes,
//! engine config). Enumeration is a branch-and-bound search over candidates
//! sorted by weighted value; a branch is pruned only when its upper bound is
//! strictly below the current M-th best retained score, so equal-score
//! alternates with different tier signatures are never lost. The exhaustive
//! search is kept as the correctness reference for property tests.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::module::{ALL_ATTRIBUTES, ATTR_COUNT, AttributeSet, Module};

/// Discretized link-effect tier per attribute. Two combinations with equal
/// signatures are effect-equivalent regardless of raw totals.
pub type TierSignature = [u8; ATTR_COUNT];

/// One scored loadout of `slots` modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combination {
	/// Member module ids in ascending order.
	pub module_ids: Vec<u64>,
	/// Summed attribute values, indexed by attribute.
	pub totals: [u32; ATTR_COUNT],
	pub tiers: TierSignature,
	pub score: u64,
}

/// Enumeration counters surfaced for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
	pub pool_size: usize,
	/// Complete combinations scored.
	pub enumerated: u64,
	/// Branches cut by the bound.
	pub pruned: u64,
	/// Distinct tier signatures retained before ranking.
	pub retained: usize,
}

/// Ranked, effect-equivalence-deduplicated combinations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
	pub combinations: Vec<Combination>,
	pub stats: EngineStats,
}

impl ResultSet {
	pub fn is_empty(&self) -> bool { self.combinations.is_empty() }

	pub fn top_score(&self) -> Option<u64> { self.combinations.first().map(|c| c.score) }
}

struct Candidate {
	id: u64,
	values: [u32; ATTR_COUNT],
	/// Weighted sum of this module's own attribute values.
	weighted: u64,
}

struct Search<'a> {
	candidates: Vec<Candidate>,
	/// Prefix sums of candidate weighted values, for the pruning bound.
	prefix: Vec<u64>,
	cfg: &'a EngineConfig,
	prune: bool,
	/// Upper bound on the tier bonus any completion can still earn.
	max_bonus_total: u64,
	best: HashMap<TierSignature, Combination>,
	threshold: Option<u64>,
	stats: EngineStats,
	chosen: Vec<usize>,
	totals: [u32; ATTR_COUNT],
	weighted_sum: u64,
}

impl Search<'_> {
	fn dfs(&mut self, start: usize) {
		let remaining = self.cfg.slots - self.chosen.len();
		if remaining == 0 {
			self.finalize();
			return;
		}

		let last = self.candidates.len() - remaining;
		for i in start..=last {
			if self.prune
				&& let Some(threshold) = self.threshold
			{
				let bound = self.weighted_sum
					+ (self.prefix[i + remaining] - self.prefix[i])
					+ self.max_bonus_total;
				// Candidates are sorted by weighted value, so the bound only
				// shrinks for later i. Never prune on an exact tie.
				if bound < threshold {
					self.stats.pruned += 1;
					break;
				}
			}

			self.chosen.push(i);
			self.weighted_sum += self.candidates[i].weighted;
			for idx in 0..ATTR_COUNT {
				self.totals[idx] += self.candidates[i].values[idx];
			}

			self.dfs(i + 1);

			for idx in 0..ATTR_COUNT {
				self.totals[idx] -= self.candidates[i].values[idx];
			}
			self.weighted_sum -= self.candidates[i].weighted;
			self.chosen.pop();
		}
	}

	fn finalize(&mut self) {
		self.stats.enumerated += 1;

		let mut tiers: TierSignature = [0; ATTR_COUNT];
		let mut bonus = 0u64;
		for attr in ALL_ATTRIBUTES {
			let tier = self.cfg.links.tier(attr, self.totals[attr.index()]);
			tiers[attr.index()] = tier;
			bonus += self.cfg.score.bonus(tier);
		}
		let score = self.weighted_sum + bonus;

		// Keep the max-score representative per equivalence class; on an
		// exact score tie keep the lexicographically smaller totals.
		let replace = match self.best.get(&tiers) {
			None => true,
			Some(existing) => {
				score > existing.score || (score == existing.score && self.totals < existing.totals)
			}
		};
		if replace {
			let mut module_ids: Vec<u64> =
				self.chosen.iter().map(|&i| self.candidates[i].id).collect();
			module_ids.sort_unstable();
			self.best.insert(
				tiers,
				Combination {
					module_ids,
					totals: self.totals,
					tiers,
					score,
				},
			);
			self.update_threshold();
		}
	}

	fn update_threshold(&mut self) {
		if self.best.len() < self.cfg.top {
			return;
		}
		let mut scores: Vec<u64> = self.best.values().map(|c| c.score).collect();
		scores.sort_unstable_by(|a, b| b.cmp(a));
		self.threshold = Some(scores[self.cfg.top - 1]);
	}
}

fn search(pool: &[Module], wanted: AttributeSet, cfg: &EngineConfig, prune: bool) -> ResultSet {
	let mut stats = EngineStats {
		pool_size: pool.len(),
		..Default::default()
	};
	if cfg.slots == 0 || cfg.top == 0 || pool.len() < cfg.slots {
		return ResultSet {
			combinations: Vec::new(),
			stats,
		};
	}

	let weights: Vec<u64> = ALL_ATTRIBUTES
		.iter()
		.map(|a| cfg.score.weight(wanted.contains(*a)))
		.collect();

	let mut candidates: Vec<Candidate> = pool
		.iter()
		.map(|module| {
			let mut values = [0u32; ATTR_COUNT];
			for (attr, value) in &module.attributes {
				values[attr.index()] += u32::from(*value);
			}
			let weighted = values
				.iter()
				.zip(weights.iter())
				.map(|(v, w)| u64::from(*v) * w)
				.sum();
			Candidate {
				id: module.id,
				values,
				weighted,
			}
		})
		.collect();
	// Deterministic order: best weighted first, id breaks ties.
	candidates.sort_by(|a, b| b.weighted.cmp(&a.weighted).then(a.id.cmp(&b.id)));

	let mut prefix = Vec::with_capacity(candidates.len() + 1);
	prefix.push(0u64);
	for cand in &candidates {
		let last = *prefix.last().unwrap_or(&0);
		prefix.push(last + cand.weighted);
	}

	let mut state = Search {
		candidates,
		prefix,
		cfg,
		prune,
		max_bonus_total: ATTR_COUNT as u64 * cfg.score.max_bonus(),
		best: HashMap::new(),
		threshold: None,
		stats,
		chosen: Vec::with_capacity(cfg.slots),
		totals: [0; ATTR_COUNT],
		weighted_sum: 0,
	};
	state.dfs(0);

	stats = state.stats;
	stats.retained = state.best.len();
	debug!(
		"Engine: pool {} enumerated {} pruned {} retained {}",
		stats.pool_size, stats.enumerated, stats.pruned, stats.retained
	);

	let mut combinations: Vec<Combination> = state.best.into_values().collect();
	combinations.sort_by(|a, b| {
		b.score
			.cmp(&a.score)
			.then_with(|| a.totals.cmp(&b.totals))
			.then_with(|| a.module_ids.cmp(&b.module_ids))
	});
	combinations.truncate(cfg.top);

	ResultSet {
		combinations,
		stats,
	}
}

/// Branch-and-bound search for the top combinations.
pub fn optimize(pool: &[Module], wanted: AttributeSet, cfg: &EngineConfig) -> ResultSet {
	search(pool, wanted, cfg, true)
}

/// Exhaustive enumeration with the same scoring, dedup and ranking rules.
///
/// Reference implementation; agrees with [`optimize`] on every input.
pub fn optimize_exhaustive(pool: &[Module], wanted: AttributeSet, cfg: &EngineConfig) -> ResultSet {
	search(pool, wanted, cfg, false)
}
