//! Immutable part/color catalog
//!
//! The catalog holds every known part and color and the relations between
//! them: cross-namespace id aliases, interchangeable (similar) parts,
//! composite recipes and their parent back-references, and per-part weights.
//!
//! It is built once from validated records and never mutated afterwards, so
//! it is safe for unlimited concurrent readers. The object graph is cyclic
//! (parts reference parents, children and similar parts), so parts and
//! colors live in arenas and all relations are index references into them.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::item::{id_pieces, is_valid_id};
use crate::records::{CatalogRecord, ColorRecord, Confirm, PartRecord};

/// Index of a [`Color`] in the catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorRef(u32);

/// Index of a [`Part`] in the catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartRef(u32);

/// Error when building a catalog from records.
///
/// Validation collects every defect found during a build pass and fails
/// with all of them at once, so an operator sees the full damage in one
/// run instead of fixing errors one at a time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("catalog validation failed:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

/// A single color. All ids denote the same color across namespaces.
#[derive(Debug, Clone)]
pub struct Color {
    ids: Vec<String>,
    name: String,
}

impl Color {
    /// The first registered id.
    pub fn primary_id(&self) -> &str {
        &self.ids[0]
    }

    /// The color's id in the given namespace, if it has one.
    pub fn id_in(&self, namespace: &str) -> Option<&str> {
        self.ids
            .iter()
            .map(String::as_str)
            .find(|id| id_pieces(id).is_some_and(|(ns, _)| ns == namespace))
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One entry in a composite part's recipe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionItem {
    /// The sub-part.
    pub part: PartRef,
    /// If set, the sub-part always comes in this color.
    /// Otherwise it inherits the color of the composed part.
    pub color: Option<ColorRef>,
    /// How many sub-parts the composed part needs. Usually 1.
    pub count: u32,
}

/// A single part: one physical mold or assembly.
#[derive(Debug, Clone)]
pub struct Part {
    ids: Vec<String>,
    /// The weight in grams. Nonzero after a successful load.
    weight_grams: f64,
    /// Non-empty for composite parts. The first entry never carries a
    /// fixed color: it anchors color inheritance from the parent.
    items: Vec<CompositionItem>,
    similar: Vec<PartRef>,
    confirm: Vec<PartRef>,
    parents: Vec<PartRef>,
}

impl Part {
    /// The first registered id.
    pub fn primary_id(&self) -> &str {
        &self.ids[0]
    }

    /// The part's id in the given namespace, if it has one.
    pub fn id_in(&self, namespace: &str) -> Option<&str> {
        self.ids
            .iter()
            .map(String::as_str)
            .find(|id| id_pieces(id).is_some_and(|(ns, _)| ns == namespace))
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn weight_grams(&self) -> f64 {
        self.weight_grams
    }

    pub fn is_composite(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn items(&self) -> &[CompositionItem] {
        &self.items
    }

    /// Interchangeable substitutes. Symmetric.
    pub fn similar(&self) -> &[PartRef] {
        &self.similar
    }

    /// Parts that list this part in their recipe.
    pub fn parents(&self) -> &[PartRef] {
        &self.parents
    }

    /// Whether substituting `other` for this part needs user confirmation.
    pub fn needs_confirmation(&self, other: PartRef) -> bool {
        self.confirm.contains(&other)
    }
}

/// Namespace-abbreviation expansion table.
///
/// A declared id like `g:3005` registers under every namespace its tag
/// expands into. Which tags expand into what is build-time configuration;
/// the default table maps the generic tags onto the concrete catalogs.
#[derive(Debug, Clone)]
pub struct Expansion {
    table: HashMap<String, Vec<String>>,
}

impl Default for Expansion {
    fn default() -> Self {
        let mut table = HashMap::new();
        for (tag, targets) in [
            ("g", vec!["b", "l", "o"]),
            ("gb", vec!["b", "o"]),
            ("gl", vec!["l", "o"]),
            ("b", vec!["b"]),
            ("l", vec!["l"]),
            ("o", vec!["o"]),
            ("v", vec!["v"]),
        ] {
            table.insert(
                tag.to_string(),
                targets.into_iter().map(String::from).collect(),
            );
        }
        Self { table }
    }
}

impl Expansion {
    pub fn new(table: HashMap<String, Vec<String>>) -> Self {
        Self { table }
    }

    /// Expand a declared id into the full list of namespace-qualified ids
    /// it registers under.
    pub fn expand(&self, id: &str) -> Result<Vec<String>, String> {
        if !is_valid_id(id) {
            return Err(format!("invalid id: {}", id));
        }
        let Some((tag, raw)) = id_pieces(id) else {
            return Err(format!("invalid id: {}", id));
        };
        let targets = self
            .table
            .get(tag)
            .ok_or_else(|| format!("unknown namespace tag '{}' in id: {}", tag, id))?;
        Ok(targets
            .iter()
            .map(|ns| format!("{}:{}", ns, raw))
            .collect())
    }
}

/// The catalog: arenas of colors and parts plus id lookup maps.
#[derive(Debug, Default)]
pub struct Catalog {
    colors: Vec<Color>,
    parts: Vec<Part>,
    color_ids: HashMap<String, ColorRef>,
    part_ids: HashMap<String, PartRef>,
}

impl Catalog {
    /// Build a catalog with the default namespace expansion table.
    pub fn from_records(records: &[CatalogRecord]) -> Result<Self, CatalogError> {
        Self::from_records_with(records, &Expansion::default())
    }

    /// Build a catalog in three passes: id registration, relation
    /// population, weight computation. Each pass collects all its errors
    /// and fails the load only after the pass completes.
    pub fn from_records_with(
        records: &[CatalogRecord],
        expansion: &Expansion,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Catalog::default();

        // Pass 1: register every declared id, decor ids included, so the
        // relation pass can assume all references resolve.
        let mut errors = Vec::new();
        let mut pending = Vec::new();
        for record in records {
            match record {
                CatalogRecord::Color(color) => {
                    catalog.register_color(color, expansion, &mut errors);
                }
                CatalogRecord::Part(part) => {
                    let part_ref = catalog.register_part(
                        &part.ids,
                        part.weight_grams,
                        expansion,
                        &mut errors,
                    );
                    let decor_refs: Vec<Option<PartRef>> = part
                        .decor
                        .iter()
                        .map(|decor| {
                            catalog.register_part(&decor.ids, None, expansion, &mut errors)
                        })
                        .collect();
                    if let Some(part_ref) = part_ref {
                        pending.push((part_ref, part, decor_refs));
                    }
                }
            }
        }
        finish_pass(&mut errors)?;

        // Pass 2: resolve similar/decor/composition relations.
        for (part_ref, record, decor_refs) in &pending {
            catalog.populate_relations(*part_ref, record, decor_refs, &mut errors);
        }
        finish_pass(&mut errors)?;

        // Pass 3: compute weights.
        let mut visited = HashSet::with_capacity(catalog.parts.len());
        for index in 0..catalog.parts.len() {
            catalog.compute_weight(PartRef(index as u32), &mut visited, &mut errors);
        }
        finish_pass(&mut errors)?;

        Ok(catalog)
    }

    /// Look up a color by any of its namespace-qualified ids.
    pub fn find_color(&self, id: &str) -> Option<ColorRef> {
        self.color_ids.get(id).copied()
    }

    /// Look up a part by any of its namespace-qualified ids.
    pub fn find_part(&self, id: &str) -> Option<PartRef> {
        self.part_ids.get(id).copied()
    }

    pub fn color(&self, color_ref: ColorRef) -> &Color {
        &self.colors[color_ref.0 as usize]
    }

    pub fn part(&self, part_ref: PartRef) -> &Part {
        &self.parts[part_ref.0 as usize]
    }

    pub fn num_colors(&self) -> usize {
        self.colors.len()
    }

    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Number of leaf parts a fully-decomposed instance of this part
    /// contains. Leaf parts count as 1.
    pub fn num_parts_in_hierarchy(&self, part_ref: PartRef) -> u64 {
        let part = self.part(part_ref);
        if part.items.is_empty() {
            return 1;
        }
        part.items
            .iter()
            .map(|item| u64::from(item.count) * self.num_parts_in_hierarchy(item.part))
            .sum()
    }

    /// Total multiplicity of recipe entries that inherit the parent color.
    /// This is the length a color-hint list must have to apply.
    pub fn num_units_without_color(&self, part_ref: PartRef) -> u32 {
        self.part(part_ref)
            .items
            .iter()
            .filter(|item| item.color.is_none())
            .map(|item| item.count)
            .sum()
    }

    /// The recipe entry color for `child` inside `parent`: `None` if the
    /// recipe does not contain `child`, `Some(None)` if the child inherits
    /// the parent color, `Some(Some(c))` if it is fixed to `c`.
    pub fn child_color(&self, parent: PartRef, child: PartRef) -> Option<Option<ColorRef>> {
        self.part(parent)
            .items
            .iter()
            .find(|item| item.part == child)
            .map(|item| item.color)
    }

    /// The first recipe entry without a fixed color, if any.
    pub fn first_child_without_color(&self, parent: PartRef) -> Option<PartRef> {
        self.part(parent)
            .items
            .iter()
            .find(|item| item.color.is_none())
            .map(|item| item.part)
    }

    fn register_color(
        &mut self,
        record: &ColorRecord,
        expansion: &Expansion,
        errors: &mut Vec<String>,
    ) {
        if record.ids.is_empty() {
            errors.push("color with no id".to_string());
            return;
        }
        let mut ids = Vec::new();
        for declared in &record.ids {
            match expansion.expand(declared) {
                Ok(expanded) => ids.extend(expanded),
                Err(message) => errors.push(message),
            }
        }
        if ids.is_empty() {
            return;
        }
        let color_ref = ColorRef(self.colors.len() as u32);
        for id in &ids {
            if self.color_ids.insert(id.clone(), color_ref).is_some() {
                errors.push(format!("duplicate color id: {}", id));
            }
        }
        self.colors.push(Color {
            ids,
            name: record.name.clone(),
        });
    }

    fn register_part(
        &mut self,
        declared_ids: &[String],
        weight_grams: Option<f64>,
        expansion: &Expansion,
        errors: &mut Vec<String>,
    ) -> Option<PartRef> {
        if declared_ids.is_empty() {
            errors.push("part with no id".to_string());
            return None;
        }
        let mut ids = Vec::new();
        for declared in declared_ids {
            match expansion.expand(declared) {
                Ok(expanded) => ids.extend(expanded),
                Err(message) => errors.push(message),
            }
        }
        if ids.is_empty() {
            return None;
        }
        let part_ref = PartRef(self.parts.len() as u32);
        for id in &ids {
            if self.part_ids.insert(id.clone(), part_ref).is_some() {
                errors.push(format!("duplicate part id: {}", id));
            }
        }
        self.parts.push(Part {
            ids,
            weight_grams: weight_grams.unwrap_or(0.0),
            items: Vec::new(),
            similar: Vec::new(),
            confirm: Vec::new(),
            parents: Vec::new(),
        });
        Some(part_ref)
    }

    fn populate_relations(
        &mut self,
        part_ref: PartRef,
        record: &PartRecord,
        decor_refs: &[Option<PartRef>],
        errors: &mut Vec<String>,
    ) {
        let part_id = self.part(part_ref).primary_id().to_string();

        for similar in &record.similar {
            let Some(similar_ref) = self.find_part(&similar.id) else {
                errors.push(format!(
                    "similar part not found: {} in part: {}",
                    similar.id, part_id
                ));
                continue;
            };
            if similar_ref == part_ref {
                errors.push(format!("part similar to self: {}", part_id));
                continue;
            }
            if !self.add_similar(part_ref, similar_ref, errors) {
                continue;
            }
            match similar.confirm {
                Confirm::None => {}
                Confirm::Other => {
                    self.parts[part_ref.0 as usize].confirm.push(similar_ref);
                }
                Confirm::Both => {
                    self.parts[part_ref.0 as usize].confirm.push(similar_ref);
                    self.parts[similar_ref.0 as usize].confirm.push(part_ref);
                }
            }
        }

        // Decor parts were registered in pass 1; wire them as similar
        // with confirmation required in both directions.
        for decor_ref in decor_refs.iter().flatten() {
            if !self.add_similar(part_ref, *decor_ref, errors) {
                continue;
            }
            self.parts[part_ref.0 as usize].confirm.push(*decor_ref);
            self.parts[decor_ref.0 as usize].confirm.push(part_ref);
        }

        if record.items.is_empty() {
            return;
        }
        let mut items = Vec::with_capacity(record.items.len());
        for (index, item) in record.items.iter().enumerate() {
            let Some(child_ref) = self.find_part(&item.id) else {
                errors.push(format!(
                    "contained item not found: {} in part: {}",
                    item.id, part_id
                ));
                continue;
            };
            if child_ref == part_ref {
                errors.push(format!("part contains itself: {}", part_id));
                continue;
            }
            let color = match &item.color {
                None => None,
                Some(color_id) => match self.find_color(color_id) {
                    Some(color_ref) => Some(color_ref),
                    None => {
                        errors.push(format!(
                            "unknown item color: {} in part: {}",
                            color_id, part_id
                        ));
                        continue;
                    }
                },
            };
            if index == 0 && color.is_some() {
                errors.push(format!(
                    "first item must not have a fixed color: {} in part: {}",
                    item.id, part_id
                ));
                continue;
            }
            if item.count == 0 {
                errors.push(format!(
                    "invalid item count for {} in part: {}",
                    item.id, part_id
                ));
                continue;
            }
            if self.part(child_ref).parents.contains(&part_ref) {
                errors.push(format!(
                    "duplicate inclusion of: {} in part: {}",
                    item.id, part_id
                ));
                continue;
            }
            self.parts[child_ref.0 as usize].parents.push(part_ref);
            items.push(CompositionItem {
                part: child_ref,
                color,
                count: item.count,
            });
        }
        self.parts[part_ref.0 as usize].items = items;
    }

    fn add_similar(
        &mut self,
        part_ref: PartRef,
        similar_ref: PartRef,
        errors: &mut Vec<String>,
    ) -> bool {
        if self.part(part_ref).similar.contains(&similar_ref) {
            errors.push(format!(
                "similar part already present: {} in part: {}",
                self.part(similar_ref).primary_id(),
                self.part(part_ref).primary_id()
            ));
            return false;
        }
        self.parts[part_ref.0 as usize].similar.push(similar_ref);
        self.parts[similar_ref.0 as usize].similar.push(part_ref);
        true
    }

    // The visited set only breaks recursion within this pass; it does not
    // mean the weight resolved. Unresolved weights stay 0.0 and are
    // reported once the pass completes.
    fn compute_weight(
        &mut self,
        part_ref: PartRef,
        visited: &mut HashSet<PartRef>,
        errors: &mut Vec<String>,
    ) {
        if !visited.insert(part_ref) {
            return;
        }

        // A composite part weighs the sum of its recipe.
        let items = self.part(part_ref).items.clone();
        if !items.is_empty() {
            if self.part(part_ref).weight_grams > 0.0 {
                errors.push(format!(
                    "composite part must not have a direct weight: {}",
                    self.part(part_ref).primary_id()
                ));
                return;
            }
            let mut weight = 0.0;
            for item in &items {
                self.compute_weight(item.part, visited, errors);
                let child_weight = self.part(item.part).weight_grams;
                if child_weight <= 0.0 {
                    errors.push(format!(
                        "likely loop in sub-parts: {}, {}",
                        self.part(part_ref).primary_id(),
                        self.part(item.part).primary_id()
                    ));
                }
                weight += child_weight * f64::from(item.count);
            }
            self.parts[part_ref.0 as usize].weight_grams = weight;
            return;
        }

        if self.part(part_ref).weight_grams > 0.0 {
            return;
        }

        // A leaf without a weight adopts the first similar part whose
        // weight resolves positive.
        let similar = self.part(part_ref).similar.clone();
        for similar_ref in similar {
            self.compute_weight(similar_ref, visited, errors);
            let weight = self.part(similar_ref).weight_grams;
            if weight > 0.0 {
                self.parts[part_ref.0 as usize].weight_grams = weight;
                return;
            }
        }
        errors.push(format!(
            "unable to compute weight for part: {}",
            self.part(part_ref).primary_id()
        ));
    }
}

fn finish_pass(errors: &mut Vec<String>) -> Result<(), CatalogError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::Invalid(std::mem::take(errors)))
    }
}
