//! Record types for catalog and requirement input
//!
//! These are the raw, untyped-graph shapes the loaders produce and the
//! catalog build consumes. Relations between records are by id string;
//! resolution into the arena happens during the catalog build.

use serde::{Deserialize, Serialize};

/// A color declaration: all ids denote the same color across namespaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColorRecord {
    pub ids: Vec<String>,
    pub name: String,
}

/// Whether substituting a similar part needs user confirmation.
///
/// `other` flags only the declared counterpart, `both` flags both sides.
/// Carried as a UI hint; never enforced in matching.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confirm {
    #[default]
    None,
    Other,
    Both,
}

/// An interchangeable-substitute declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarRecord {
    pub id: String,
    #[serde(default)]
    pub confirm: Confirm,
}

/// Sugar that declares a decorated variant of the containing part inline.
///
/// Expands to a new part that is similar to its base, with confirmation
/// required in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecorRecord {
    pub ids: Vec<String>,
}

/// One entry in a composite part's recipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    /// If set, the sub-part always comes in this color.
    /// Otherwise it inherits the color of the composed part.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
    /// How many sub-parts the composed part needs. Usually 1.
    #[serde(default = "default_count")]
    pub count: u32,
}

/// A part declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartRecord {
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight_grams: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub similar: Vec<SimilarRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decor: Vec<DecorRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub items: Vec<ItemRecord>,
}

/// A catalog record - color or part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogRecord {
    Color(ColorRecord),
    Part(PartRecord),
}

/// One line of a bill of materials: a raw namespace-local request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequirementRecord {
    pub namespace: String,
    pub part: String,
    /// Non-empty. The first entry is the primary color; the rest is a
    /// positional hint for composite decomposition.
    pub colors: Vec<String>,
    #[serde(default = "default_count")]
    pub count: u32,
}

/// A warning message from parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Warning {
    pub message: String,
    pub line: usize,
}

fn default_count() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_record_roundtrip() {
        let color = ColorRecord {
            ids: vec!["b:1".to_string(), "l:1".to_string()],
            name: "White".to_string(),
        };
        let json = serde_json::to_string(&CatalogRecord::Color(color.clone())).unwrap();
        assert!(json.contains(r#""type":"color""#));
        let parsed: CatalogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, CatalogRecord::Color(color));
    }

    #[test]
    fn test_part_record_defaults() {
        let json = r#"{"type": "part", "ids": ["b:3005"], "weight_grams": 0.43}"#;
        let parsed: CatalogRecord = serde_json::from_str(json).unwrap();
        match parsed {
            CatalogRecord::Part(part) => {
                assert_eq!(part.ids, vec!["b:3005"]);
                assert_eq!(part.weight_grams, Some(0.43));
                assert!(part.similar.is_empty());
                assert!(part.decor.is_empty());
                assert!(part.items.is_empty());
            }
            _ => panic!("Expected part"),
        }
    }

    #[test]
    fn test_item_record_count_defaults_to_one() {
        let json = r#"{"type": "part", "ids": ["b:x"], "items": [
            {"id": "b:a"},
            {"id": "b:b", "color": "b:3", "count": 2}
        ]}"#;
        let parsed: CatalogRecord = serde_json::from_str(json).unwrap();
        match parsed {
            CatalogRecord::Part(part) => {
                assert_eq!(part.items[0].count, 1);
                assert_eq!(part.items[0].color, None);
                assert_eq!(part.items[1].count, 2);
                assert_eq!(part.items[1].color.as_deref(), Some("b:3"));
            }
            _ => panic!("Expected part"),
        }
    }

    #[test]
    fn test_similar_confirm_defaults_to_none() {
        let json = r#"{"type": "part", "ids": ["b:x"], "similar": [
            {"id": "b:y"},
            {"id": "b:z", "confirm": "both"}
        ]}"#;
        let parsed: CatalogRecord = serde_json::from_str(json).unwrap();
        match parsed {
            CatalogRecord::Part(part) => {
                assert_eq!(part.similar[0].confirm, Confirm::None);
                assert_eq!(part.similar[1].confirm, Confirm::Both);
            }
            _ => panic!("Expected part"),
        }
    }

    #[test]
    fn test_requirement_record_count_defaults_to_one() {
        let json = r#"{"namespace": "l", "part": "3005", "colors": ["1"]}"#;
        let parsed: RequirementRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.colors, vec!["1"]);
    }
}
