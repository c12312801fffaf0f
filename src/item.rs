//! Item identity: a namespace-qualified (part id, color id) pair
//!
//! An "item" is a part in a specific color. Ids have the form
//! `namespace:rawId` where the namespace is a short alphabetic tag and the
//! raw id is opaque. `ItemId` is the map and diagnostic key used throughout
//! the crate.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

/// Wildcard color id: the item matches in any color.
///
/// Never a real catalog entry; it only appears in enumeration output, where
/// it supersedes any specific color recorded for the same part.
pub const ANY_COLOR: &str = "*";

/// A part id paired with a color id.
///
/// Both ids are namespace-qualified strings. The ids should point to an
/// existing part and color, but there is no guarantee that those actually
/// exist. Ordered by part id, then color id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId {
    part_id: String,
    color_id: String,
}

impl ItemId {
    pub fn new(part_id: impl Into<String>, color_id: impl Into<String>) -> Self {
        Self {
            part_id: part_id.into(),
            color_id: color_id.into(),
        }
    }

    pub fn part_id(&self) -> &str {
        &self.part_id
    }

    pub fn color_id(&self) -> &str {
        &self.color_id
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.part_id, self.color_id)
    }
}

// Serialized as the display string so ItemId-keyed maps become JSON objects.
impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Qualify a raw id with a namespace tag.
pub fn qualify(namespace: &str, raw_id: &str) -> String {
    format!("{}:{}", namespace, raw_id)
}

/// Split a qualified id into (namespace, raw id).
///
/// Returns `None` if the id does not contain exactly one ':' separator
/// with non-empty pieces on both sides.
pub fn id_pieces(id: &str) -> Option<(&str, &str)> {
    let (ns, raw) = id.split_once(':')?;
    if ns.is_empty() || raw.is_empty() || raw.contains(':') {
        return None;
    }
    Some((ns, raw))
}

/// Check an id against the `namespace:rawId` grammar.
///
/// The namespace is 1-8 lowercase letters; the raw id is any non-empty
/// sequence without whitespace or further ':' separators.
pub fn is_valid_id(id: &str) -> bool {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| {
        Regex::new(r"^[a-z]{1,8}:[^\s:]+$").expect("id regex is valid")
    });
    re.is_match(id)
}
