//! # palfix kernel
//!
//! Entity-level view of a world save and the operations that keep its
//! cross-references consistent.
//!
//! A world holds players, pals, containers and guilds that point at each
//! other by UUID. Every operation here either reads those references
//! (index, audits, scanner) or edits them as one unit so no reference is
//! left dangling (rename, delete, move, migrate).
//!
//! ## Architecture
//!
//! ```text
//! Document              ← palfix-tree, decoded by a DocumentCodec
//!     │
//! EntityIndex           ← instance → row, player uid → metadata
//!     │
//! WorldSession          ← document + index + backup + companions + ids + events
//!     ├── audit         ← orphan pals, dangling guild handles
//!     ├── mutate        ← plan, then apply on Commit only
//!     ├── scan          ← find-key / find-value / paths
//!     └── command       ← shell line → Command → Reply
//! ```
//!
//! Operations never print. They push `Event`s into the session's log and
//! the caller renders them.

pub mod audit;
pub mod command;
pub mod companion;
pub mod error;
pub mod events;
pub mod ids;
pub mod index;
pub mod mutate;
pub mod remap;
pub mod scan;
pub mod schema;
pub mod session;
pub mod toy;

pub use audit::{GuildAudit, OrphanPal, find_orphan_pals};
pub use command::{Command, OPERATIONS, OperationId, OperationSpec, Reply, split_words};
pub use companion::{CompanionStore, DirCompanionStore, MemoryCompanionStore, companion_file_name};
pub use error::SessionError;
pub use events::{Event, EventKind, EventLog, Severity};
pub use ids::{IdSource, RandomIds, RunMode, SequentialIds, parse_uid};
pub use index::{CharacterRef, EntityIndex, PlayerMeta};
pub use mutate::{AbortReason, Outcome};
pub use remap::{Remap, clone_with_remap};
pub use scan::{ValueScan, find_key, find_value, resolve_path};
pub use session::{SessionOptions, WorldSession, default_output_path};
