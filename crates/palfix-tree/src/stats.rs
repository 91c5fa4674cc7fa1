//! Approximate memory footprint per world section.

use crate::codec::CodecError;
use crate::document::Document;
use crate::value::TreeError;
use serde::Serialize;

const BYTES_PER_MB: f64 = 1_048_576.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionFootprint {
    pub name: String,
    pub bytes: usize,
}

impl SectionFootprint {
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FootprintError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Serialized size of every field of `worldSaveData`, in declared order.
pub fn section_footprint(document: &Document) -> Result<Vec<SectionFootprint>, FootprintError> {
    let world = document.world()?;
    let Some(node) = world.as_struct() else {
        return Err(TreeError::StructuralMismatch {
            path: crate::document::WORLD_SECTION.to_string(),
            expected: "struct",
            found: world.kind(),
        }
        .into());
    };

    let mut rows = Vec::with_capacity(node.fields.len());
    for (name, value) in &node.fields {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| CodecError::Serialize(e.to_string()))?
            .len();
        rows.push(SectionFootprint {
            name: name.clone(),
            bytes,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::WORLD_SECTION;
    use crate::value::Value;

    #[test]
    fn footprint_lists_sections_in_order() {
        let doc = Document::with_section(
            "Pal.PalWorldSaveGame",
            WORLD_SECTION,
            Value::record(vec![
                ("CharacterSaveParameterMap", Value::Map(Vec::new())),
                ("GroupSaveDataMap", Value::Array(vec![Value::int(1); 64])),
            ]),
        );
        let rows = section_footprint(&doc).expect("footprint");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "CharacterSaveParameterMap");
        assert!(rows[1].bytes > rows[0].bytes);
        assert!(rows[1].megabytes() < 1.0);
    }
}
