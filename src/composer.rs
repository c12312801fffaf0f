//! Export/recompose search
//!
//! The composer re-expresses a fully-decomposed requirement multiset in a
//! target namespace. It drains a working copy of the leaf pool: for each
//! leaf it searches upward through composed parents for the best
//! representable item, preferring the most composed, highest-volume match,
//! and falls back to the leaf itself. Leaves with no representation at all
//! are reported as unmappable and dropped.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::catalog::{Catalog, ColorRef, PartRef};
use crate::diagnostics::UnknownItems;
use crate::item::ItemId;
use crate::required::ItemMap;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    part: PartRef,
    color: ColorRef,
    count: u32,
}

/// Drain `pool` into a namespace-keyed item mapping.
///
/// Leaf-equivalent weight is conserved between pool and output except for
/// the portion folded into `unknown` as unmappable.
pub(crate) fn export_to_namespace(
    catalog: &Catalog,
    mut pool: ItemMap,
    namespace: &str,
    unknown: &mut UnknownItems,
) -> BTreeMap<ItemId, u32> {
    let mut result = BTreeMap::new();
    while let Some((part, color)) = pick_min(catalog, &pool) {
        let exported = best_item_for_child(catalog, &pool, part, color, namespace).and_then(
            |candidate| {
                let part_id = catalog.part(candidate.part).id_in(namespace)?;
                let color_id = catalog.color(candidate.color).id_in(namespace)?;
                Some((ItemId::new(part_id, color_id), candidate))
            },
        );
        match exported {
            Some((item_id, candidate)) => {
                *result.entry(item_id).or_insert(0) += candidate.count;
                remove_from_pool(catalog, &mut pool, candidate.part, candidate.color, candidate.count);
            }
            None => {
                let Some(item) = pool.get(&part).and_then(|colors| colors.get(&color)) else {
                    break;
                };
                for (origin, &count) in &item.origins {
                    unknown.add_unmappable_item(origin.clone(), count);
                }
                let count = item.count;
                remove_from_pool(catalog, &mut pool, part, color, count);
            }
        }
    }
    result
}

/// The still-present leaf key with the smallest (part, color) primary ids.
/// The pool is a hash map; picking the minimum keeps the drain order, and
/// with it the output on ambiguous catalogs, deterministic.
fn pick_min(catalog: &Catalog, pool: &ItemMap) -> Option<(PartRef, ColorRef)> {
    let mut best: Option<(PartRef, ColorRef)> = None;
    for (&part, colors) in pool {
        for &color in colors.keys() {
            let better = match best {
                None => true,
                Some((best_part, best_color)) => {
                    let ordering = catalog
                        .part(part)
                        .primary_id()
                        .cmp(catalog.part(best_part).primary_id())
                        .then_with(|| {
                            catalog
                                .color(color)
                                .primary_id()
                                .cmp(catalog.color(best_color).primary_id())
                        });
                    ordering == Ordering::Less
                }
            };
            if better {
                best = Some((part, color));
            }
        }
    }
    best
}

/// Search upward for the best representation of `(part, color)`.
///
/// For every parent whose recipe entry for `part` inherits the parent
/// color, the parent is probed in the same color. For entries with a fixed
/// color equal to `color`, the parent's own color is unconstrained by this
/// child; every color of the parent's first color-free child still in the
/// pool is probed instead. If no parent candidate is representable, the
/// part itself is the candidate when it has ids in the namespace and the
/// pool supports at least one complete instance.
fn best_item_for_child(
    catalog: &Catalog,
    pool: &ItemMap,
    part: PartRef,
    color: ColorRef,
    namespace: &str,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for &parent in catalog.part(part).parents() {
        let Some(entry_color) = catalog.child_color(parent, part) else {
            continue;
        };
        match entry_color {
            None => {
                let candidate = best_item_for_child(catalog, pool, parent, color, namespace);
                best = pick_better(catalog, namespace, best, candidate);
            }
            Some(fixed) => {
                if fixed != color {
                    continue;
                }
                let Some(sibling) = catalog.first_child_without_color(parent) else {
                    continue;
                };
                let Some(sibling_colors) = pool.get(&sibling) else {
                    continue;
                };
                for &sibling_color in sibling_colors.keys() {
                    let candidate =
                        best_item_for_child(catalog, pool, parent, sibling_color, namespace);
                    best = pick_better(catalog, namespace, best, candidate);
                }
            }
        }
    }
    if best.is_some() {
        return best;
    }

    if catalog.part(part).id_in(namespace).is_some()
        && catalog.color(color).id_in(namespace).is_some()
    {
        let count = max_count_in_pool(catalog, pool, part, color);
        if count > 0 {
            return Some(Candidate { part, color, count });
        }
    }
    None
}

/// Prefer the higher `num_parts_in_hierarchy * count` score; break ties by
/// the smaller target-namespace part id, then color id, so the result does
/// not depend on parent iteration order.
fn pick_better(
    catalog: &Catalog,
    namespace: &str,
    incumbent: Option<Candidate>,
    challenger: Option<Candidate>,
) -> Option<Candidate> {
    let Some(challenger) = challenger else {
        return incumbent;
    };
    let Some(incumbent) = incumbent else {
        return Some(challenger);
    };
    let challenger_score =
        catalog.num_parts_in_hierarchy(challenger.part) * u64::from(challenger.count);
    let incumbent_score =
        catalog.num_parts_in_hierarchy(incumbent.part) * u64::from(incumbent.count);
    let ordering = challenger_score.cmp(&incumbent_score).then_with(|| {
        let challenger_id = catalog.part(challenger.part).id_in(namespace).unwrap_or("");
        let incumbent_id = catalog.part(incumbent.part).id_in(namespace).unwrap_or("");
        incumbent_id.cmp(challenger_id).then_with(|| {
            catalog
                .color(incumbent.color)
                .primary_id()
                .cmp(catalog.color(challenger.color).primary_id())
        })
    });
    if ordering == Ordering::Greater {
        Some(challenger)
    } else {
        Some(incumbent)
    }
}

/// How many complete instances of `(part, color)` the pool can support:
/// the direct leaf count at that key plus, for composite parts, the
/// minimum over recipe entries of the child supply divided by its
/// multiplicity.
pub(crate) fn max_count_in_pool(
    catalog: &Catalog,
    pool: &ItemMap,
    part: PartRef,
    color: ColorRef,
) -> u32 {
    let from_self = pool
        .get(&part)
        .and_then(|colors| colors.get(&color))
        .map(|item| item.count)
        .unwrap_or(0);
    let recipe = catalog.part(part).items();
    if recipe.is_empty() {
        return from_self;
    }
    let mut from_children = u32::MAX;
    for entry in recipe {
        let child_color = entry.color.unwrap_or(color);
        from_children = from_children
            .min(max_count_in_pool(catalog, pool, entry.part, child_color) / entry.count);
    }
    from_self + from_children
}

/// Subtract `count` instances of `(part, color)` from the pool: the
/// part's own leaf entry first, any remainder distributed through the
/// recipe at `remainder * multiplicity` per child, recursively.
pub(crate) fn remove_from_pool(
    catalog: &Catalog,
    pool: &mut ItemMap,
    part: PartRef,
    color: ColorRef,
    count: u32,
) {
    let mut remaining = count;
    if let Some(colors) = pool.get_mut(&part) {
        if let Some(item) = colors.get_mut(&color) {
            let take = remaining.min(item.count);
            item.count -= take;
            remaining -= take;
            if item.count == 0 {
                colors.remove(&color);
                if colors.is_empty() {
                    pool.remove(&part);
                }
            }
        }
    }
    if remaining == 0 {
        return;
    }
    for entry in catalog.part(part).items() {
        let child_color = entry.color.unwrap_or(color);
        remove_from_pool(catalog, pool, entry.part, child_color, remaining * entry.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::records::{CatalogRecord, ColorRecord, ItemRecord, PartRecord};
    use crate::required::{Item, RequiredItems};

    fn color(ids: &[&str], name: &str) -> CatalogRecord {
        CatalogRecord::Color(ColorRecord {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            name: name.to_string(),
        })
    }

    fn part(ids: &[&str], weight: Option<f64>, items: &[(&str, Option<&str>, u32)]) -> CatalogRecord {
        CatalogRecord::Part(PartRecord {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            weight_grams: weight,
            similar: Vec::new(),
            decor: Vec::new(),
            items: items
                .iter()
                .map(|(id, color, count)| ItemRecord {
                    id: id.to_string(),
                    color: color.map(|s| s.to_string()),
                    count: *count,
                })
                .collect(),
        })
    }

    fn catalog() -> Catalog {
        let records = vec![
            color(&["b:1", "l:1"], "White"),
            color(&["b:3", "l:24"], "Yellow"),
            color(&["b:5", "l:23"], "Blue"),
            color(&["l:77"], "Source-only"),
            part(&["g:3005"], Some(0.43), &[]),
            part(&["b:2429"], Some(0.41), &[]),
            part(&["b:2430"], Some(0.41), &[]),
            part(&["l:73983"], None, &[("b:2429", None, 1), ("b:2430", None, 1)]),
            part(&["b:2429c01"], None, &[("b:2429", None, 1), ("b:2430", None, 1)]),
            // Fixed-color assembly: pin always yellow, axle inherits.
            part(&["b:100"], Some(0.1), &[]),
            part(&["b:300"], Some(0.3), &[]),
            part(&["b:200"], None, &[("b:300", None, 1), ("b:100", Some("b:3"), 1)]),
        ];
        Catalog::from_records(&records).unwrap()
    }

    fn export(
        items: &RequiredItems<'_>,
        namespace: &str,
    ) -> (BTreeMap<ItemId, u32>, UnknownItems) {
        let mut unknown = UnknownItems::new();
        let exported = items.export_to_namespace(namespace, &mut unknown);
        (exported, unknown)
    }

    #[test]
    fn test_export_simple_leaf() {
        let catalog = catalog();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        assert!(items.add_item("l", "3005", &["1"], 3, &mut unknown));

        let (exported, unknown) = export(&items, "b");
        let expected: BTreeMap<ItemId, u32> =
            [(ItemId::new("b:3005", "b:1"), 3)].into_iter().collect();
        assert_eq!(exported, expected);
        assert!(unknown.unmappable_item_ids().is_empty());
    }

    #[test]
    fn test_export_is_non_destructive() {
        let catalog = catalog();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        assert!(items.add_item("l", "3005", &["1"], 3, &mut unknown));

        let (first, _) = export(&items, "b");
        let (second, _) = export(&items, "b");
        assert_eq!(first, second);
        assert_eq!(items.num_total_items(), 3);
    }

    #[test]
    fn test_export_selects_composed_parent() {
        let catalog = catalog();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        assert!(items.add_item("l", "73983", &["1"], 2, &mut unknown));

        let (exported, unknown) = export(&items, "b");
        let expected: BTreeMap<ItemId, u32> =
            [(ItemId::new("b:2429c01", "b:1"), 2)].into_iter().collect();
        assert_eq!(exported, expected);
        assert!(unknown.unmappable_item_ids().is_empty());
    }

    #[test]
    fn test_export_partial_parent_then_leaf_fallback() {
        let catalog = catalog();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        assert!(items.add_item("b", "2429", &["1"], 1, &mut unknown));
        assert!(items.add_item("b", "2430", &["1"], 2, &mut unknown));

        let (exported, unknown) = export(&items, "b");
        let expected: BTreeMap<ItemId, u32> = [
            (ItemId::new("b:2429c01", "b:1"), 1),
            (ItemId::new("b:2430", "b:1"), 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(exported, expected);
        assert!(unknown.unmappable_item_ids().is_empty());
    }

    #[test]
    fn test_export_unmappable_keeps_max_origin_count() {
        let catalog = catalog();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        // l:77 has no id in b, so neither leaf can be represented.
        assert!(items.add_item("l", "73983", &["77"], 2, &mut unknown));

        let (exported, unknown) = export(&items, "b");
        assert!(exported.is_empty());
        let expected: BTreeMap<ItemId, u32> =
            [(ItemId::new("l:73983", "l:77"), 2)].into_iter().collect();
        assert_eq!(unknown.unmappable_item_ids(), &expected);
    }

    #[test]
    fn test_export_probes_sibling_colors_through_fixed_entry() {
        let catalog = catalog();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        // The pin (b:100) is picked first; its recipe entry in b:200 has a
        // fixed color, so the search probes the axle's pool colors.
        assert!(items.add_item("b", "100", &["3"], 1, &mut unknown));
        assert!(items.add_item("b", "300", &["5"], 1, &mut unknown));

        let (exported, unknown) = export(&items, "b");
        let expected: BTreeMap<ItemId, u32> =
            [(ItemId::new("b:200", "b:5"), 1)].into_iter().collect();
        assert_eq!(exported, expected);
        assert!(unknown.unmappable_item_ids().is_empty());
    }

    #[test]
    fn test_export_prefers_deeper_hierarchy() {
        let records = vec![
            color(&["b:1"], "White"),
            part(&["b:110"], Some(1.0), &[]),
            part(&["b:111"], Some(1.0), &[]),
            part(&["b:201"], None, &[("b:110", None, 1)]),
            part(&["b:203"], None, &[("b:110", None, 1), ("b:111", None, 1)]),
        ];
        let catalog = Catalog::from_records(&records).unwrap();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        assert!(items.add_item("b", "110", &["1"], 1, &mut unknown));
        assert!(items.add_item("b", "111", &["1"], 1, &mut unknown));

        let (exported, _) = export(&items, "b");
        let expected: BTreeMap<ItemId, u32> =
            [(ItemId::new("b:203", "b:1"), 1)].into_iter().collect();
        assert_eq!(exported, expected);
    }

    #[test]
    fn test_export_tie_break_prefers_smaller_id() {
        let records = vec![
            color(&["b:1"], "White"),
            part(&["b:110"], Some(1.0), &[]),
            part(&["b:202"], None, &[("b:110", None, 1)]),
            part(&["b:201"], None, &[("b:110", None, 1)]),
        ];
        let catalog = Catalog::from_records(&records).unwrap();
        let mut unknown = UnknownItems::new();
        let mut items = RequiredItems::new(&catalog);
        assert!(items.add_item("b", "110", &["1"], 1, &mut unknown));

        let (exported, _) = export(&items, "b");
        let expected: BTreeMap<ItemId, u32> =
            [(ItemId::new("b:201", "b:1"), 1)].into_iter().collect();
        assert_eq!(exported, expected);
    }

    #[test]
    fn test_max_count_in_pool_nested_and_monotonic() {
        let records = vec![
            color(&["b:1"], "White"),
            part(&["b:10"], Some(1.0), &[]),
            part(&["b:11"], Some(1.0), &[]),
            part(&["b:20"], None, &[("b:10", None, 2)]),
            part(&["b:30"], None, &[("b:20", None, 1), ("b:11", None, 1)]),
        ];
        let catalog = Catalog::from_records(&records).unwrap();
        let ten = catalog.find_part("b:10").unwrap();
        let eleven = catalog.find_part("b:11").unwrap();
        let thirty = catalog.find_part("b:30").unwrap();
        let white = catalog.find_color("b:1").unwrap();

        let mut pool: ItemMap = HashMap::new();
        for (part, count) in [(ten, 5), (eleven, 2)] {
            pool.entry(part).or_default().insert(
                white,
                Item {
                    part,
                    color: white,
                    count,
                    origins: HashMap::new(),
                },
            );
        }
        assert_eq!(max_count_in_pool(&catalog, &pool, thirty, white), 2);

        remove_from_pool(&catalog, &mut pool, thirty, white, 1);
        assert_eq!(max_count_in_pool(&catalog, &pool, thirty, white), 1);
        remove_from_pool(&catalog, &mut pool, thirty, white, 1);
        assert_eq!(max_count_in_pool(&catalog, &pool, thirty, white), 0);
        assert!(pool.is_empty());
    }
}
