//! Codec boundary: `load(bytes) -> Document`, `store(Document) -> bytes`.
//!
//! The binary GVAS/zlib codec is an external collaborator. This module fixes
//! the trait it plugs into and ships `JsonCodec`, a JSON envelope around the
//! value tree that the tool and its tests use directly.

use crate::document::Document;
use serde::{Deserialize, Serialize};

/// On-disk save container variant. Selected from the header's
/// `save_game_class_name` when re-serializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveFormat {
    /// Single zlib pass (`0x31`).
    Zlib,
    /// Double zlib pass (`0x32`), used by world saves.
    DoubleZlib,
}

const WORLD_SAVE_CLASSES: [&str; 2] = ["Pal.PalWorldSaveGame", "Pal.PalLocalWorldSaveGame"];

impl SaveFormat {
    pub fn from_class_name(save_game_class_name: &str) -> Self {
        if WORLD_SAVE_CLASSES
            .iter()
            .any(|class| save_game_class_name.contains(class))
        {
            SaveFormat::DoubleZlib
        } else {
            SaveFormat::Zlib
        }
    }

    pub fn for_document(document: &Document) -> Self {
        Self::from_class_name(&document.header.save_game_class_name)
    }

    pub fn magic(self) -> u8 {
        match self {
            SaveFormat::Zlib => 0x31,
            SaveFormat::DoubleZlib => 0x32,
        }
    }

    pub fn from_magic(magic: u8) -> Option<Self> {
        match magic {
            0x31 => Some(SaveFormat::Zlib),
            0x32 => Some(SaveFormat::DoubleZlib),
            _ => None,
        }
    }
}

/// Errors from codec and document file operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted save: {0}")]
    Corrupt(String),

    #[error("unknown save type 0x{0:02x}")]
    UnknownFormat(u8),
}

pub trait DocumentCodec {
    fn load(&self, bytes: &[u8]) -> Result<Document, CodecError>;

    fn store(&self, document: &Document, format: SaveFormat) -> Result<Vec<u8>, CodecError>;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonEnvelope {
    save_type: u8,
    #[serde(flatten)]
    document: Document,
}

/// JSON rendition of a decoded save.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl JsonCodec {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl DocumentCodec for JsonCodec {
    fn load(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        validate_substrate_bytes(bytes)?;
        let envelope: JsonEnvelope =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Parse(e.to_string()))?;
        if SaveFormat::from_magic(envelope.save_type).is_none() {
            return Err(CodecError::UnknownFormat(envelope.save_type));
        }
        Ok(envelope.document)
    }

    fn store(&self, document: &Document, format: SaveFormat) -> Result<Vec<u8>, CodecError> {
        let envelope = JsonEnvelope {
            save_type: format.magic(),
            document: document.clone(),
        };
        let rendered = if self.pretty {
            serde_json::to_vec_pretty(&envelope)
        } else {
            serde_json::to_vec(&envelope)
        };
        rendered.map_err(|e| CodecError::Serialize(e.to_string()))
    }
}

fn validate_substrate_bytes(bytes: &[u8]) -> Result<(), CodecError> {
    if bytes.contains(&0) {
        return Err(CodecError::Corrupt("contains NUL byte(s)".to_string()));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(CodecError::Corrupt(
            "contains non-UTF-8 byte sequence(s)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::WORLD_SECTION;
    use crate::value::Value;

    #[test]
    fn world_classes_select_double_zlib() {
        assert_eq!(
            SaveFormat::from_class_name("/Script/Pal.PalWorldSaveGame"),
            SaveFormat::DoubleZlib
        );
        assert_eq!(
            SaveFormat::from_class_name("/Script/Pal.PalLocalWorldSaveGame"),
            SaveFormat::DoubleZlib
        );
        assert_eq!(
            SaveFormat::from_class_name("/Script/Pal.PalPlayerSaveGame"),
            SaveFormat::Zlib
        );
        assert_eq!(SaveFormat::DoubleZlib.magic(), 0x32);
    }

    #[test]
    fn store_records_selected_save_type() {
        let doc = Document::with_section(
            "/Script/Pal.PalPlayerSaveGame",
            "SaveData",
            Value::record(vec![("PlayerUId", Value::str("x"))]),
        );
        let bytes = JsonCodec::default()
            .store(&doc, SaveFormat::for_document(&doc))
            .expect("store should succeed");
        let raw: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
        assert_eq!(raw["saveType"], serde_json::json!(0x31));

        let loaded = JsonCodec::default().load(&bytes).expect("load should succeed");
        assert_eq!(loaded, doc);
    }

    #[test]
    fn load_rejects_unknown_save_type() {
        let doc = Document::with_section("x", WORLD_SECTION, Value::record(vec![]));
        let mut raw = serde_json::to_value(JsonEnvelope {
            save_type: 0x31,
            document: doc,
        })
        .expect("envelope serializes");
        raw["saveType"] = serde_json::json!(0x40);
        let bytes = serde_json::to_vec(&raw).expect("json bytes");

        let err = JsonCodec::default()
            .load(&bytes)
            .expect_err("0x40 is not a save type");
        assert!(matches!(err, CodecError::UnknownFormat(0x40)));
    }

    #[test]
    fn load_rejects_nul_payload() {
        let err = JsonCodec::default()
            .load(b"{\"saveType\":49}\0")
            .expect_err("NUL must be rejected");
        match err {
            CodecError::Corrupt(message) => assert!(message.contains("NUL")),
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }
}
