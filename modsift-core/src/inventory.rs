//! The current inventory snapshot and its single-writer holder.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;
use serde::Serialize;

use crate::module::Module;

/// Complete, immutable inventory at a point in time.
///
/// Replaced atomically on every accepted push; readers hold an `Arc` and
/// never observe a half-updated inventory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InventorySnapshot {
	modules: BTreeMap<u64, Module>,
	revision: u64,
}

impl InventorySnapshot {
	pub fn empty() -> Self { Self::default() }

	/// Monotonically increasing revision, zero for the empty snapshot.
	pub fn revision(&self) -> u64 { self.revision }

	pub fn len(&self) -> usize { self.modules.len() }

	pub fn is_empty(&self) -> bool { self.modules.is_empty() }

	pub fn get(&self, id: u64) -> Option<&Module> { self.modules.get(&id) }

	/// Modules in ascending id order.
	pub fn modules(&self) -> impl Iterator<Item = &Module> { self.modules.values() }
}

/// Single-writer snapshot holder.
///
/// The capture pipeline is the only writer; filter runs only ever load a
/// reference. Replacement is one pointer swap under the lock.
#[derive(Debug, Default)]
pub struct SnapshotHolder {
	current: RwLock<Arc<InventorySnapshot>>,
}

impl SnapshotHolder {
	pub fn new() -> Self { Self::default() }

	/// Loads the current snapshot reference.
	pub fn load(&self) -> Arc<InventorySnapshot> { self.current.read().clone() }

	/// Replaces the snapshot wholesale with a full inventory push.
	pub fn replace(&self, modules: Vec<Module>) -> u64 {
		let mut guard = self.current.write();
		let revision = guard.revision + 1;
		let snapshot = InventorySnapshot {
			modules: modules.into_iter().map(|m| (m.id, m)).collect(),
			revision,
		};
		info!("Inventory replaced: {} modules (revision {})", snapshot.len(), revision);
		*guard = Arc::new(snapshot);
		revision
	}

	/// Merges an incremental update by module id into a copied snapshot,
	/// then swaps the copy in.
	pub fn merge(&self, modules: Vec<Module>) -> u64 {
		let mut guard = self.current.write();
		let mut merged = guard.modules.clone();
		for module in modules {
			merged.insert(module.id, module);
		}
		let revision = guard.revision + 1;
		let snapshot = InventorySnapshot {
			modules: merged,
			revision,
		};
		info!("Inventory merged: {} modules (revision {})", snapshot.len(), revision);
		*guard = Arc::new(snapshot);
		revision
	}
}
