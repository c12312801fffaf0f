//! Diagnostic sink for unrecognized and unmappable requests
//!
//! Resolution never aborts on bad input; it records what it could not
//! understand here and keeps going. The sink is owned by the caller and
//! passed by `&mut` into every operation that can fail to map an item.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::item::ItemId;

/// Counts of unrecognized and unmappable requests.
///
/// The unknown maps accumulate by sum: every affected request adds its
/// count. The unmappable map keeps the maximum count seen per original
/// item id - provenance is an upper bound, not an exact accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnknownItems {
    unknown_part_ids: BTreeMap<String, u32>,
    unknown_color_ids: BTreeMap<String, u32>,
    unknown_item_ids: BTreeMap<ItemId, u32>,
    unmappable_item_ids: BTreeMap<ItemId, u32>,
}

impl UnknownItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request whose part and/or color id was not in the catalog.
    pub fn add_unknown_item(
        &mut self,
        item_id: ItemId,
        part_known: bool,
        color_known: bool,
        count: u32,
    ) {
        if !part_known {
            *self
                .unknown_part_ids
                .entry(item_id.part_id().to_string())
                .or_insert(0) += count;
        }
        if !color_known {
            *self
                .unknown_color_ids
                .entry(item_id.color_id().to_string())
                .or_insert(0) += count;
        }
        if !part_known || !color_known {
            *self.unknown_item_ids.entry(item_id).or_insert(0) += count;
        }
    }

    /// Record a fully-recognized item that could not be expressed in the
    /// requested target namespace.
    pub fn add_unmappable_item(&mut self, item_id: ItemId, count: u32) {
        let entry = self.unmappable_item_ids.entry(item_id).or_insert(0);
        *entry = (*entry).max(count);
    }

    pub fn unknown_part_ids(&self) -> &BTreeMap<String, u32> {
        &self.unknown_part_ids
    }

    pub fn unknown_color_ids(&self) -> &BTreeMap<String, u32> {
        &self.unknown_color_ids
    }

    pub fn unknown_item_ids(&self) -> &BTreeMap<ItemId, u32> {
        &self.unknown_item_ids
    }

    pub fn unmappable_item_ids(&self) -> &BTreeMap<ItemId, u32> {
        &self.unmappable_item_ids
    }

    pub fn clear_unmappable_items(&mut self) {
        self.unmappable_item_ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.unknown_item_ids.is_empty() && self.unmappable_item_ids.is_empty()
    }
}
