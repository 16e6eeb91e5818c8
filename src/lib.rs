//! Member progression engine for a learning platform
//!
//! This crate is the single source of truth for member progression and
//! entitlements: XP and level ladders, daily/weekly challenge tracking,
//! loot-box resolution, and the effective-tier classification every
//! content-gating check consults. The surrounding management console edits
//! the configuration this engine consumes; it never touches member records
//! directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   events    ┌────────────────────────┐
//! │   Console /  │ ──────────▶ │ ProgressionCoordinator │
//! │   Platform   │ ◀────────── │  (atomic per-member    │
//! └──────────────┘  outcomes   │   read-modify-write)   │
//!                              └───────────┬────────────┘
//!                    pure transformations  │  versioned records
//!                 ┌────────────────────────┼──────────────┐
//!                 ▼                        ▼              ▼
//!          engine::{ladder,        engine::loot      store (SQLite)
//!          tracker, entitlement,
//!          streaks}
//! ```
//!
//! All engine components are synchronous pure functions; only the store
//! touches I/O, and concurrent events for the same member serialize through
//! optimistic versioned writes.

pub mod coordinator;
pub mod domain;
pub mod engine;
pub mod error;
pub mod store;

pub use coordinator::{
    GrantOutcome, MemberSummary, ModerationUpdate, ProgressionCoordinator, TickOutcome, mute_for,
};
pub use domain::*;
pub use error::EngineError;
