//! Result rendering: readable text listings or JSON.

use std::fmt::Write;

use modsift_core::{ALL_ATTRIBUTES, Filter, InventorySnapshot, ResultSet};

pub fn render(result: &ResultSet, snapshot: &InventorySnapshot, filter: &Filter, json: bool) -> String {
	if json {
		serde_json::to_string_pretty(result)
			.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
	} else {
		render_text(result, snapshot, filter)
	}
}

fn render_text(result: &ResultSet, snapshot: &InventorySnapshot, filter: &Filter) -> String {
	let mut out = String::new();
	if result.is_empty() {
		let _ = write!(out, "No combinations for the current filter.");
		return out;
	}

	let _ = writeln!(
		out,
		"Top {} combinations ({} candidates, {} enumerated, {} pruned):",
		result.combinations.len(),
		result.stats.pool_size,
		result.stats.enumerated,
		result.stats.pruned,
	);
	for (rank, combo) in result.combinations.iter().enumerate() {
		let _ = writeln!(out, "\n#{} score {}", rank + 1, combo.score);
		for id in &combo.module_ids {
			match snapshot.get(*id) {
				Some(module) => {
					let parts: Vec<String> = module
						.attributes
						.iter()
						.map(|(attr, value)| format!("{} +{}", attr.display_name(), value))
						.collect();
					let _ = writeln!(
						out,
						"  [{}] {} (quality {}): {}",
						module.id,
						module.name(),
						module.quality,
						parts.join(", ")
					);
				}
				None => {
					let _ = writeln!(out, "  [{id}] no longer in the inventory");
				}
			}
		}
		let mut totals = Vec::new();
		for attr in ALL_ATTRIBUTES {
			let total = combo.totals[attr.index()];
			if total == 0 {
				continue;
			}
			let marker = if filter.wanted.contains(attr) { "*" } else { "" };
			totals.push(format!(
				"{marker}{} {total} (tier {})",
				attr.display_name(),
				combo.tiers[attr.index()]
			));
		}
		let _ = write!(out, "  totals: {}", totals.join(", "));
		if rank + 1 < result.combinations.len() {
			let _ = writeln!(out);
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use modsift_core::module::{AttributeType, Category, Module};
	use modsift_core::{AttributeSet, EngineConfig, SnapshotHolder, optimize};

	fn snapshot() -> InventorySnapshot {
		let holder = SnapshotHolder::new();
		holder.replace(vec![
			Module {
				id: 7,
				config_id: 5500101,
				quality: 5,
				category: Category::Attack,
				attributes: vec![(AttributeType::Strength, 8), (AttributeType::CritFocus, 2)],
			},
			Module {
				id: 9,
				config_id: 5500102,
				quality: 3,
				category: Category::Attack,
				attributes: vec![(AttributeType::Strength, 4)],
			},
		]);
		(*holder.load()).clone()
	}

	#[test]
	fn text_listing_names_modules_and_tiers() {
		let snap = snapshot();
		let pool: Vec<Module> = snap.modules().cloned().collect();
		let wanted: AttributeSet = [AttributeType::Strength].into_iter().collect();
		let cfg = EngineConfig::default().with_slots(2);
		let result = optimize(&pool, wanted, &cfg);
		let filter = Filter::new().with_wanted(wanted);

		let text = render(&result, &snap, &filter, false);
		assert!(text.contains("Basic Attack"));
		assert!(text.contains("High Performance Attack"));
		assert!(text.contains("*Strength Boost 12 (tier 4)"));
		assert!(text.contains("score"));
	}

	#[test]
	fn empty_result_is_a_plain_message() {
		let snap = InventorySnapshot::empty();
		let result = ResultSet::default();
		let text = render(&result, &snap, &Filter::new(), false);
		assert!(text.contains("No combinations"));
	}

	#[test]
	fn json_output_parses_back() {
		let snap = snapshot();
		let pool: Vec<Module> = snap.modules().cloned().collect();
		let cfg = EngineConfig::default().with_slots(2);
		let result = optimize(&pool, AttributeSet::empty(), &cfg);

		let text = render(&result, &snap, &Filter::new(), true);
		let value: serde_json::Value = serde_json::from_str(&text).unwrap();
		assert_eq!(value["combinations"][0]["module_ids"], serde_json::json!([7, 9]));
	}
}
