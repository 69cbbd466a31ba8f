//! # Modsift Core Library
//!
//! Passive capture and decoding of the game's module-inventory traffic,
//! plus the combination engine that ranks loadouts under a user filter.
//!
//! ## Modules
//!
//! - `capture` - Packet sources (WinDivert sniffing, pcap replay, dump)
//! - `flow` / `reassembly` - TCP slicing and per-stream reassembly
//! - `frame` - Length-prefixed application frame decoding
//! - `extract` - Inventory payload decoding into module records
//! - `inventory` - Snapshot types and the single-writer holder
//! - `filter` / `optimize` - Candidate pools and the combination engine
//! - `session` - Lifecycle orchestration and the event channel
//! - `error` - Error types and handling

pub mod capture;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod extract;
pub mod filter;
pub mod flow;
pub mod frame;
pub mod inventory;
pub mod module;
pub mod optimize;
pub mod reassembly;
pub mod session;

pub use config::{CaptureConfig, EngineConfig, LinkTable, ScoreTable, SessionConfig};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use filter::{Filter, candidate_pool};
pub use inventory::{InventorySnapshot, SnapshotHolder};
pub use module::{ALL_ATTRIBUTES, ATTR_COUNT, AttributeSet, AttributeType, Category, Module};
pub use optimize::{Combination, EngineStats, ResultSet, TierSignature, optimize, optimize_exhaustive};
pub use session::{Session, SessionState};
