//! # palfix-tree
//!
//! Document layer for world saves.
//!
//! This crate provides:
//! - `Value`, the closed tagged tree the codec decodes saves into
//! - typed accessors that fail with a named `StructuralMismatch`
//! - `Document` (header + top-level sections)
//! - the `DocumentCodec` boundary, `JsonCodec`, and `SaveFormat` selection
//! - atomic document file read/write
//!
//! It intentionally knows nothing about players, pals, or guilds. Those live
//! in `palfix-kernel`.
//!
//! ## Data model
//!
//! ```text
//! .sav bytes (on disk)
//!     ↕  DocumentCodec::load / store
//! Document { header, properties: { worldSaveData | SaveData } }
//! ```

pub mod codec;
pub mod document;
pub mod stats;
pub mod store;
pub mod value;

pub use codec::{CodecError, DocumentCodec, JsonCodec, SaveFormat};
pub use document::{COMPANION_SECTION, Document, Header, WORLD_SECTION};
pub use stats::{FootprintError, SectionFootprint, section_footprint};
pub use store::{read_document_from_path, write_document_to_path};
pub use value::{MapEntry, Scalar, StructValue, TreeError, Value};
