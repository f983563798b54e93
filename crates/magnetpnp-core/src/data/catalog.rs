//! Part catalog
//!
//! The catalog holds every part described by the currently selected input
//! file. It is replaced wholesale on load and cleared wholesale on unload;
//! the placement core only ever reads it.

use super::{Classification, Destination, Part, PartId};
use crate::error::CatalogError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Read access to the parts of the loaded input file
pub trait PartCatalog: Send + Sync {
    /// Replace the catalog content with the parts in `description`
    ///
    /// Returns the number of parts loaded. On error the previous content is kept.
    fn load(&mut self, description: &str) -> Result<usize, CatalogError>;

    /// Drop all parts
    fn unload(&mut self);

    /// Whether a description is currently loaded
    fn is_loaded(&self) -> bool;

    /// Look up a part by id
    fn part(&self, id: PartId) -> Option<&Part>;

    /// All part ids in catalog order
    fn ids(&self) -> Vec<PartId>;

    /// Number of parts
    fn count(&self) -> usize {
        self.ids().len()
    }

    /// Parts in catalog order
    fn parts(&self) -> Vec<&Part> {
        self.ids().into_iter().filter_map(|id| self.part(id)).collect()
    }

    /// Display name of a part
    fn name(&self, id: PartId) -> Option<&str> {
        self.part(id).map(|p| p.name.as_str())
    }

    /// Destination of a part, if it has one
    fn destination(&self, id: PartId) -> Option<Destination> {
        self.part(id).and_then(|p| p.destination)
    }

    /// Height of a part
    fn height(&self, id: PartId) -> Option<f64> {
        self.part(id).map(|p| p.height)
    }

    /// Thread size and type of a part
    fn classification(&self, id: PartId) -> Option<&Classification> {
        self.part(id).map(|p| &p.classification)
    }
}

/// JSON shape of a part description
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogDescription {
    #[serde(default)]
    name: Option<String>,
    parts: Vec<Part>,
}

/// Catalog backed by an ordered in-memory list
#[derive(Debug, Clone, Default)]
pub struct InMemoryPartCatalog {
    object_name: Option<String>,
    order: Vec<PartId>,
    parts: BTreeMap<PartId, Part>,
    loaded: bool,
}

impl InMemoryPartCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog directly from parts (catalog order = slice order)
    pub fn from_parts(parts: Vec<Part>) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        catalog.replace(None, parts)?;
        Ok(catalog)
    }

    /// Name of the object the parts belong to
    pub fn object_name(&self) -> Option<&str> {
        self.object_name.as_deref()
    }

    fn replace(&mut self, name: Option<String>, parts: Vec<Part>) -> Result<usize, CatalogError> {
        let mut order = Vec::with_capacity(parts.len());
        let mut by_id = BTreeMap::new();
        for part in parts {
            if part.id == 0 {
                return Err(CatalogError::InvalidPartId(part.id));
            }
            if by_id.contains_key(&part.id) {
                return Err(CatalogError::DuplicatePart(part.id));
            }
            order.push(part.id);
            by_id.insert(part.id, part);
        }

        let count = order.len();
        self.object_name = name;
        self.order = order;
        self.parts = by_id;
        self.loaded = true;
        Ok(count)
    }
}

impl PartCatalog for InMemoryPartCatalog {
    fn load(&mut self, description: &str) -> Result<usize, CatalogError> {
        let parsed: CatalogDescription =
            serde_json::from_str(description).map_err(|e| CatalogError::CatalogParseError {
                reason: e.to_string(),
            })?;
        let count = self.replace(parsed.name, parsed.parts)?;
        tracing::debug!("Catalog loaded with {} parts", count);
        Ok(count)
    }

    fn unload(&mut self) {
        self.object_name = None;
        self.order.clear();
        self.parts.clear();
        self.loaded = false;
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(&id)
    }

    fn ids(&self) -> Vec<PartId> {
        self.order.clone()
    }

    fn count(&self) -> usize {
        self.order.len()
    }
}

fn part_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*;\s*pnp-part\s+(\{.*\})\s*$").expect("part line pattern is valid")
    })
}

fn object_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*;\s*pnp-object\s+(.+?)\s*$").expect("object line pattern is valid")
    })
}

/// Collect the part description embedded in a G-code file
///
/// Parts are embedded as comment lines `; pnp-part {json}`; an optional
/// `; pnp-object <name>` line names the object. Returns `None` when the
/// file carries no part records. The part JSON is not validated here, so a
/// broken record surfaces as a parse error from [`PartCatalog::load`].
pub fn extract_embedded_description(gcode: &str) -> Option<String> {
    let mut name: Option<String> = None;
    let mut records = Vec::new();

    for line in gcode.lines() {
        if let Some(caps) = part_line_regex().captures(line) {
            records.push(caps[1].to_string());
        } else if let Some(caps) = object_line_regex().captures(line) {
            name.get_or_insert_with(|| caps[1].to_string());
        }
    }

    if records.is_empty() {
        return None;
    }

    let name = name.unwrap_or_else(|| "defaultpart".to_string());
    let name = serde_json::Value::String(name).to_string();
    Some(format!(
        "{{\"name\":{},\"parts\":[{}]}}",
        name,
        records.join(",")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"{
        "name": "bracket",
        "parts": [
            {"id": 2, "name": "a", "type": "hexnut", "thread": 3, "height": 2.4,
             "destination": {"x": 1, "y": 2, "z": 3, "orientation": 0}},
            {"id": 1, "name": "b", "type": "squarenut", "thread": 4, "height": 3.2}
        ]
    }"#;

    #[test]
    fn test_load_keeps_catalog_order() {
        let mut catalog = InMemoryPartCatalog::new();
        let count = catalog.load(DESCRIPTION).expect("Should load");
        assert_eq!(count, 2);
        assert!(catalog.is_loaded());
        assert_eq!(catalog.ids(), vec![2, 1]);
        assert_eq!(catalog.object_name(), Some("bracket"));
        assert_eq!(catalog.name(1), Some("b"));
        assert_eq!(catalog.destination(1), None);
        assert_eq!(catalog.height(2), Some(2.4));
    }

    #[test]
    fn test_failed_load_keeps_previous_content() {
        let mut catalog = InMemoryPartCatalog::new();
        catalog.load(DESCRIPTION).expect("Should load");

        let err = catalog.load("{ not json").unwrap_err();
        assert!(matches!(err, CatalogError::CatalogParseError { .. }));
        assert_eq!(catalog.count(), 2);

        let dup = r#"{"parts": [
            {"id": 9, "type": "hexnut", "thread": 3, "height": 1},
            {"id": 9, "type": "hexnut", "thread": 3, "height": 1}
        ]}"#;
        assert_eq!(catalog.load(dup).unwrap_err(), CatalogError::DuplicatePart(9));
        assert_eq!(catalog.ids(), vec![2, 1]);
    }

    #[test]
    fn test_zero_id_rejected() {
        let mut catalog = InMemoryPartCatalog::new();
        let desc = r#"{"parts": [{"id": 0, "type": "hexnut", "thread": 3, "height": 1}]}"#;
        assert_eq!(catalog.load(desc).unwrap_err(), CatalogError::InvalidPartId(0));
        assert!(!catalog.is_loaded());
    }

    #[test]
    fn test_unload_is_idempotent() {
        let mut catalog = InMemoryPartCatalog::new();
        catalog.unload();
        catalog.unload();
        assert!(!catalog.is_loaded());
        assert_eq!(catalog.count(), 0);
        assert!(catalog.parts().is_empty());
    }

    #[test]
    fn test_extract_embedded_description() {
        let gcode = "G28\n\
            ; pnp-object housing\n\
            ; pnp-part {\"id\": 1, \"type\": \"hexnut\", \"thread\": 3, \"height\": 2.4}\n\
            G1 X10 Y10\n\
            ;pnp-part {\"id\": 2, \"type\": \"hexnut\", \"thread\": 3, \"height\": 2.4}\n\
            M361 P1\n";

        let description = extract_embedded_description(gcode).expect("Should find parts");
        let mut catalog = InMemoryPartCatalog::new();
        assert_eq!(catalog.load(&description).expect("Should load"), 2);
        assert_eq!(catalog.object_name(), Some("housing"));
    }

    #[test]
    fn test_extract_without_parts() {
        assert!(extract_embedded_description("G28\nG1 X1\n; plain comment\n").is_none());
    }
}
