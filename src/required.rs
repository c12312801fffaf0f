//! Requirement multiset: normalized, fully-decomposed needed items
//!
//! A `RequiredItems` holds one bill of materials, decomposed into leaf
//! (part, color, count) entries with provenance back to the original
//! requests. Composite requests are broken down on entry; the stored
//! multiset never contains a composite part.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::catalog::{Catalog, ColorRef, PartRef};
use crate::composer;
use crate::diagnostics::UnknownItems;
use crate::item::{qualify, ItemId, ANY_COLOR};

/// A needed part in a specific color.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) part: PartRef,
    pub(crate) color: ColorRef,
    pub(crate) count: u32,
    /// Original request ids with the maximum count each contributed.
    /// Only used to report items that turn out not to be mappable.
    pub(crate) origins: HashMap<ItemId, u32>,
}

impl Item {
    pub fn part(&self) -> PartRef {
        self.part
    }

    pub fn color(&self) -> ColorRef {
        self.color
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn origins(&self) -> &HashMap<ItemId, u32> {
        &self.origins
    }
}

/// Leaf multiset keyed by part, then color.
pub(crate) type ItemMap = HashMap<PartRef, HashMap<ColorRef, Item>>;

/// A requirement set bound to a catalog.
#[derive(Debug, Clone)]
pub struct RequiredItems<'a> {
    catalog: &'a Catalog,
    items: ItemMap,
    num_unique: usize,
    num_total: u64,
}

impl<'a> RequiredItems<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            items: HashMap::new(),
            num_unique: 0,
            num_total: 0,
        }
    }

    /// Add a raw namespace-local request and decompose it into leaves.
    ///
    /// `color_ids` must be non-empty; the first entry is the primary color.
    /// The full list acts as a positional hint: when the part is composite
    /// and the list length equals the total multiplicity of color-free
    /// recipe entries, each unit consumes one hint color in order.
    /// Otherwise color-free children inherit the primary color.
    ///
    /// Returns false without touching the multiset when the part or the
    /// primary color is not in the catalog; the failure is recorded in
    /// `unknown`.
    pub fn add_item<S: AsRef<str>>(
        &mut self,
        namespace: &str,
        part_id: &str,
        color_ids: &[S],
        count: u32,
        unknown: &mut UnknownItems,
    ) -> bool {
        if color_ids.is_empty() {
            return false;
        }
        let catalog = self.catalog;
        let ns_part_id = qualify(namespace, part_id);
        let part = catalog.find_part(&ns_part_id);
        let ns_color_id = qualify(namespace, color_ids[0].as_ref());
        let color = catalog.find_color(&ns_color_id);

        let mut hint = Vec::with_capacity(color_ids.len());
        for raw in color_ids {
            match catalog.find_color(&qualify(namespace, raw.as_ref())) {
                Some(color_ref) => hint.push(color_ref),
                None => {
                    hint.clear();
                    break;
                }
            }
        }

        let item_id = ItemId::new(ns_part_id, ns_color_id);
        let (part, color) = match (part, color) {
            (Some(part), Some(color)) => (part, color),
            (part, color) => {
                unknown.add_unknown_item(item_id, part.is_some(), color.is_some(), count);
                return false;
            }
        };
        let hint = if hint.len() == color_ids.len() {
            Some(hint)
        } else {
            None
        };
        self.add_decomposed(part, color, hint.as_deref(), count, &item_id, count);
        true
    }

    /// Number of distinct (part, color) leaves.
    pub fn num_unique_items(&self) -> usize {
        self.num_unique
    }

    /// Total leaf count across the multiset.
    pub fn num_total_items(&self) -> u64 {
        self.num_total
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Estimated total mass: sum of leaf weight times count.
    pub fn weight_estimate_grams(&self) -> f64 {
        self.iter()
            .map(|item| self.catalog.part(item.part).weight_grams() * f64::from(item.count))
            .sum()
    }

    /// The leaf entry for a (part, color) key, if present.
    pub fn leaf(&self, part: PartRef, color: ColorRef) -> Option<&Item> {
        self.items.get(&part).and_then(|colors| colors.get(&color))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values().flat_map(|colors| colors.values())
    }

    /// Re-express the multiset in a target namespace.
    ///
    /// Non-destructive: the search drains a private working copy. Leaves
    /// that cannot be expressed in the namespace fold their provenance
    /// into `unknown` as unmappable items.
    pub fn export_to_namespace(
        &self,
        namespace: &str,
        unknown: &mut UnknownItems,
    ) -> BTreeMap<ItemId, u32> {
        composer::export_to_namespace(self.catalog, self.items.clone(), namespace, unknown)
    }

    /// Subtract already-fulfilled matches, producing a new set.
    ///
    /// Provenance is dropped in the result. Each match consumes its own
    /// leaf entry first, then complete instances through its recipe
    /// children, then borrows from similar parts up to the shortfall.
    /// Match keys that do not resolve against the catalog are skipped:
    /// they can only come from a caller that did not obtain them from a
    /// prior export against this catalog.
    pub fn minus_matches(&self, matches: &BTreeMap<ItemId, u32>) -> RequiredItems<'a> {
        let mut items: ItemMap = self.items.clone();
        for colors in items.values_mut() {
            for item in colors.values_mut() {
                item.origins = HashMap::new();
            }
        }

        for (item_id, &count) in matches {
            let Some(part) = self.catalog.find_part(item_id.part_id()) else {
                continue;
            };
            let Some(color) = self.catalog.find_color(item_id.color_id()) else {
                continue;
            };
            // The guard is per match key: it only exists to break cycles
            // through similar-part chains within one removal walk. The
            // shared multiset already prevents double consumption across
            // keys.
            let mut considered = HashSet::new();
            consume_from(self.catalog, &mut items, part, color, count, &mut considered);
        }

        let num_unique = items.values().map(|colors| colors.len()).sum();
        let num_total = items
            .values()
            .flat_map(|colors| colors.values())
            .map(|item| u64::from(item.count))
            .sum();
        RequiredItems {
            catalog: self.catalog,
            items,
            num_unique,
            num_total,
        }
    }

    /// Every (part, color) pair in the namespace that could satisfy some
    /// portion of this requirement set: the leaves themselves, their
    /// similar substitutes, and all composed parents. A parent reachable
    /// through a fixed-color recipe entry is unconstrained in its own
    /// color and appears with [`ANY_COLOR`], which supersedes any specific
    /// color recorded for that part.
    pub fn interesting_items(&self, namespace: &str) -> HashSet<ItemId> {
        let mut found: HashMap<PartRef, Option<HashSet<ColorRef>>> = HashMap::new();
        let mut seen: HashSet<(PartRef, Option<ColorRef>)> = HashSet::new();
        for item in self.iter() {
            self.visit_interesting(item.part, Some(item.color), &mut found, &mut seen);
        }

        let mut result = HashSet::new();
        for (part, colors) in found {
            let Some(part_id) = self.catalog.part(part).id_in(namespace) else {
                continue;
            };
            match colors {
                None => {
                    result.insert(ItemId::new(part_id, ANY_COLOR));
                }
                Some(colors) => {
                    for color in colors {
                        let Some(color_id) = self.catalog.color(color).id_in(namespace) else {
                            continue;
                        };
                        result.insert(ItemId::new(part_id, color_id));
                    }
                }
            }
        }
        result
    }

    // color None means "any color" while walking upward.
    fn visit_interesting(
        &self,
        part: PartRef,
        color: Option<ColorRef>,
        found: &mut HashMap<PartRef, Option<HashSet<ColorRef>>>,
        seen: &mut HashSet<(PartRef, Option<ColorRef>)>,
    ) {
        if !seen.insert((part, color)) {
            return;
        }
        record_interesting(found, part, color);
        let catalog = self.catalog;
        for &similar in catalog.part(part).similar() {
            record_interesting(found, similar, color);
        }
        for &parent in catalog.part(part).parents() {
            let Some(entry_color) = catalog.child_color(parent, part) else {
                continue;
            };
            match entry_color {
                // Child inherits the parent color: the parent comes in
                // the same color as the leaf.
                None => self.visit_interesting(parent, color, found, seen),
                // Fixed-color entry: the parent's own color is
                // unconstrained by this child.
                Some(fixed) => {
                    if color.is_none() || color == Some(fixed) {
                        self.visit_interesting(parent, None, found, seen);
                    }
                }
            }
        }
    }

    fn add_decomposed(
        &mut self,
        part: PartRef,
        color: ColorRef,
        hint: Option<&[ColorRef]>,
        count: u32,
        origin: &ItemId,
        origin_count: u32,
    ) {
        let catalog = self.catalog;
        let recipe = catalog.part(part).items();
        if recipe.is_empty() {
            self.add_leaf(part, color, count, origin, origin_count);
            return;
        }
        let mut hint_index = match hint {
            Some(hint) if hint.len() as u32 == catalog.num_units_without_color(part) => Some(0),
            _ => None,
        };
        for entry in recipe {
            match (entry.color, hint, hint_index.as_mut()) {
                (Some(fixed), _, _) => {
                    self.add_decomposed(
                        entry.part,
                        fixed,
                        None,
                        count * entry.count,
                        origin,
                        origin_count,
                    );
                }
                (None, Some(hint), Some(index)) => {
                    // One hint color per unit of multiplicity, in order.
                    for _ in 0..entry.count {
                        self.add_decomposed(entry.part, hint[*index], None, count, origin, origin_count);
                        *index += 1;
                    }
                }
                (None, _, _) => {
                    self.add_decomposed(
                        entry.part,
                        color,
                        None,
                        count * entry.count,
                        origin,
                        origin_count,
                    );
                }
            }
        }
    }

    fn add_leaf(
        &mut self,
        part: PartRef,
        color: ColorRef,
        count: u32,
        origin: &ItemId,
        origin_count: u32,
    ) {
        let colors = self.items.entry(part).or_default();
        match colors.get_mut(&color) {
            Some(item) => {
                item.count += count;
                let entry = item.origins.entry(origin.clone()).or_insert(0);
                *entry = (*entry).max(origin_count);
            }
            None => {
                let mut origins = HashMap::with_capacity(1);
                origins.insert(origin.clone(), origin_count);
                colors.insert(
                    color,
                    Item {
                        part,
                        color,
                        count,
                        origins,
                    },
                );
                self.num_unique += 1;
            }
        }
        self.num_total += u64::from(count);
    }
}

fn record_interesting(
    found: &mut HashMap<PartRef, Option<HashSet<ColorRef>>>,
    part: PartRef,
    color: Option<ColorRef>,
) {
    match color {
        None => {
            found.insert(part, None);
        }
        Some(color) => match found.entry(part) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                if let Some(colors) = occupied.get_mut() {
                    colors.insert(color);
                }
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(Some(HashSet::from([color])));
            }
        },
    }
}

/// Remove up to `want` units of (part, color), returning how many were
/// actually removed: the direct leaf entry first, then complete instances
/// through recipe children, then similar parts up to the shortfall.
fn consume_from(
    catalog: &Catalog,
    items: &mut ItemMap,
    part: PartRef,
    color: ColorRef,
    want: u32,
    considered: &mut HashSet<PartRef>,
) -> u32 {
    if !considered.insert(part) {
        return 0;
    }
    let mut removed = 0;
    if let Some(colors) = items.get_mut(&part) {
        if let Some(item) = colors.get_mut(&color) {
            let take = want.min(item.count);
            item.count -= take;
            removed = take;
            if item.count == 0 {
                colors.remove(&color);
                if colors.is_empty() {
                    items.remove(&part);
                }
            }
        }
    }

    let recipe = catalog.part(part).items();
    if removed < want && !recipe.is_empty() {
        let mut supply = u32::MAX;
        for entry in recipe {
            let child_color = entry.color.unwrap_or(color);
            supply = supply
                .min(composer::max_count_in_pool(catalog, items, entry.part, child_color) / entry.count);
        }
        let take = (want - removed).min(supply);
        if take > 0 {
            for entry in recipe {
                let child_color = entry.color.unwrap_or(color);
                composer::remove_from_pool(catalog, items, entry.part, child_color, take * entry.count);
            }
            removed += take;
        }
    }

    if removed < want {
        for &similar in catalog.part(part).similar() {
            if removed >= want {
                break;
            }
            removed += consume_from(catalog, items, similar, color, want - removed, considered);
        }
    }
    removed
}
