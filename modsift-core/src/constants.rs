//! Shared protocol and engine constants.
//!
//! Wire-level values are fixed by the game protocol; engine defaults can be
//! overridden through [`crate::config::EngineConfig`].

/// Maximum packet buffer size for live capture operations.
pub const MAX_PACKET_SIZE: usize = 65535;

/// Length of a frame header: u32 length prefix plus u16 type tag.
pub const FRAME_HEADER_LEN: usize = 6;

/// Smallest valid frame length (header only, empty body).
pub const MIN_FRAME_LEN: usize = FRAME_HEADER_LEN;

/// Largest frame length the decoder accepts before treating the length
/// prefix as corrupt and resynchronizing.
pub const MAX_FRAME_LEN: usize = 256 * 1024;

/// Service id of the character synchronization service. Only notifies for
/// this service can carry the module inventory.
pub const SERVICE_CHAR_SYNC: u64 = 0x0000_0000_6333_5342;

/// Method id for a full inventory push (replaces the snapshot wholesale).
pub const METHOD_SYNC_CONTAINER: u32 = 0x0000_002D;

/// Method id for an incremental inventory update (merged by module id).
pub const METHOD_SYNC_CONTAINER_DIRTY: u32 = 0x0000_002E;

/// Maximum number of attribute entries a single module record may carry.
pub const MAX_MODULE_PARTS: usize = 6;

/// Number of equip slots in a loadout.
pub const DEFAULT_SLOTS: usize = 4;

/// Default number of ranked combinations returned by the engine.
pub const DEFAULT_TOP: usize = 10;

/// Link-effect breakpoints shared by all attributes unless overridden.
pub const DEFAULT_BREAKPOINTS: [u16; 6] = [1, 4, 8, 12, 16, 20];

/// Score bonus granted for reaching each link-effect tier, indexed by tier.
pub const DEFAULT_TIER_BONUS: [u64; 7] = [0, 100, 1_000, 5_000, 15_000, 50_000, 100_000];

/// Score multiplier for attributes listed in the filter.
pub const DEFAULT_WANTED_WEIGHT: u64 = 10;

/// Score multiplier for attributes not listed in the filter.
pub const DEFAULT_BASE_WEIGHT: u64 = 1;

/// Idle time (capture clock) after which a silent connection is evicted.
pub const DEFAULT_IDLE_GRACE_MICROS: u64 = 60_000_000;

/// Bytes of out-of-order data buffered per stream before it is declared
/// stalled and the gap is skipped.
pub const DEFAULT_STALL_BUDGET: usize = 1024 * 1024;
