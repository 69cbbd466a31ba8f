//! User filters and candidate pool projection.

use serde::{Deserialize, Serialize};

use crate::inventory::InventorySnapshot;
use crate::module::{AttributeSet, Category, Module};

/// User intent for one optimization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
	/// Category to optimize; `None` means any.
	pub category: Option<Category>,
	/// Attributes rewarded with the higher score multiplier. Empty means
	/// no preference.
	pub wanted: AttributeSet,
	/// When set, only modules whose every attribute is wanted stay in the
	/// pool. Off by default: attribute preference normally affects scoring
	/// only, not eligibility.
	pub exclusive: bool,
}

impl Filter {
	pub fn new() -> Self { Self::default() }

	#[must_use]
	pub fn with_category(mut self, category: Option<Category>) -> Self {
		self.category = category;
		self
	}

	#[must_use]
	pub fn with_wanted(mut self, wanted: AttributeSet) -> Self {
		self.wanted = wanted;
		self
	}

	#[must_use]
	pub fn with_exclusive(mut self, exclusive: bool) -> Self {
		self.exclusive = exclusive;
		self
	}

	/// Pool eligibility for one module.
	pub fn matches(&self, module: &Module) -> bool {
		if let Some(category) = self.category
			&& module.category != category
		{
			return false;
		}
		if self.exclusive
			&& !self.wanted.is_empty()
			&& !self.wanted.is_superset(&module.attribute_set())
		{
			return false;
		}
		true
	}
}

/// Projects the snapshot into the candidate pool for a filter.
///
/// Ordered by module id; an empty pool is a normal outcome, not an error.
pub fn candidate_pool(snapshot: &InventorySnapshot, filter: &Filter) -> Vec<Module> {
	snapshot
		.modules()
		.filter(|m| filter.matches(m))
		.cloned()
		.collect()
}
