//! Decoded save document: header plus named top-level sections.

use crate::value::{StructValue, TreeError, Value};
use serde::{Deserialize, Serialize};

/// Section holding the shared world state in `Level.sav`.
pub const WORLD_SECTION: &str = "worldSaveData";
/// Section holding one player's own state in `Players/<UID>.sav`.
pub const COMPANION_SECTION: &str = "SaveData";

/// Header fields the engine cares about. Everything else the codec needs to
/// round-trip lives in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub save_game_class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub header: Header,
    pub properties: StructValue,
}

impl Document {
    pub fn new(save_game_class_name: &str, properties: StructValue) -> Self {
        Self {
            header: Header {
                save_game_class_name: save_game_class_name.to_string(),
                extra: None,
            },
            properties,
        }
    }

    /// Wrap one section value under `name`.
    pub fn with_section(save_game_class_name: &str, name: &str, section: Value) -> Self {
        Self::new(save_game_class_name, StructValue::new(None).with(name, section))
    }

    pub fn section(&self, name: &str) -> Result<&Value, TreeError> {
        self.properties
            .field(name)
            .ok_or_else(|| TreeError::MissingField {
                path: name.to_string(),
            })
    }

    pub fn section_mut(&mut self, name: &str) -> Result<&mut Value, TreeError> {
        self.properties
            .field_mut(name)
            .ok_or_else(|| TreeError::MissingField {
                path: name.to_string(),
            })
    }

    /// The `worldSaveData` section of a world document.
    pub fn world(&self) -> Result<&Value, TreeError> {
        self.section(WORLD_SECTION)
    }

    pub fn world_mut(&mut self) -> Result<&mut Value, TreeError> {
        self.section_mut(WORLD_SECTION)
    }

    /// The `SaveData` section of a player companion document.
    pub fn save_data(&self) -> Result<&Value, TreeError> {
        self.section(COMPANION_SECTION)
    }

    pub fn save_data_mut(&mut self) -> Result<&mut Value, TreeError> {
        self.section_mut(COMPANION_SECTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_is_structural() {
        let doc =
            Document::with_section("Pal.PalWorldSaveGame", WORLD_SECTION, Value::record(vec![]));
        assert!(doc.world().is_ok());
        let err = doc.save_data().expect_err("world document has no SaveData");
        assert_eq!(
            err,
            TreeError::MissingField {
                path: COMPANION_SECTION.to_string()
            }
        );
    }
}
