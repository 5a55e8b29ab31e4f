//! Project State Store
//!
//! Owns the single in-memory [`ProjectDocument`], keeps its derived fields
//! consistent after every mutation and mirrors every mutation to the durable
//! slot. All operations are synchronous and run to completion.

use anyhow::Context;
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::db::SlotBackend;
use crate::models::{
    clamp_int, parse_flag, BuildingField, Connectivity, ProjectDocument, Summary,
    BUILDINGS_COUNT_MAX, BUILDINGS_COUNT_MIN, DEVICES_MAX, DEVICES_MIN, FLOORS_MAX, FLOORS_MIN,
};

/// Default slot key holding the serialized document
pub const STORAGE_KEY: &str = "sae_app_state_v1";

/// Top-level sections every stored or imported document must carry
pub const REQUIRED_SECTIONS: [&str; 3] = ["project", "building", "solution"];

/// Errors raised while importing an external document
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to load JSON. Please ensure it is valid JSON ({0}).")]
    Malformed(String),

    #[error("Invalid JSON format. Expected: {{ project, building, solution }} (missing: {})", .0.join(", "))]
    MissingSections(Vec<String>),
}

/// Errors raised by field edits
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FieldError {
    #[error("Unknown field path: {0}")]
    UnknownPath(String),

    #[error("Field {0} is read-only")]
    ReadOnly(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Building index {index} out of range (project has {len} buildings)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors returned by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Field(#[from] FieldError),

    /// Reading or writing durable storage failed. A failed write keeps the
    /// change in the in-memory document.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A leaf of the document addressable by a dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    SystemsIntegratorId,
    ProjectAutoId,
    ProjectName,
    BuildingsCount,
    Connectivity,
    IncludesCloud,
    Integration(String),
}

impl FieldPath {
    /// Parses paths such as `project.projectName` or `solution.integrations.cctv`
    pub fn parse(path: &str) -> Result<Self, FieldError> {
        let field = match path.trim() {
            "project.systemsIntegratorId" => FieldPath::SystemsIntegratorId,
            "project.projectAutoId" => FieldPath::ProjectAutoId,
            "project.projectName" => FieldPath::ProjectName,
            "project.buildingsCount" => FieldPath::BuildingsCount,
            "solution.connectivity" => FieldPath::Connectivity,
            "solution.includesCloud" => FieldPath::IncludesCloud,
            other => match other.strip_prefix("solution.integrations.") {
                Some(key) if !key.is_empty() && !key.contains('.') => {
                    FieldPath::Integration(key.to_string())
                }
                _ => return Err(FieldError::UnknownPath(path.to_string())),
            },
        };
        Ok(field)
    }
}

/// Explicitly owned store for one project document
pub struct ProjectStore {
    backend: Box<dyn SlotBackend>,
    key: String,
    doc: ProjectDocument,
}

impl ProjectStore {
    /// Opens the store on `backend` using the default slot key
    pub fn open(backend: Box<dyn SlotBackend>) -> Self {
        Self::open_with_key(backend, STORAGE_KEY)
    }

    /// Opens the store on `backend`, restoring the document stored under `key`
    pub fn open_with_key(backend: Box<dyn SlotBackend>, key: &str) -> Self {
        let doc = load_document(backend.as_ref(), key);
        Self {
            backend,
            key: key.to_string(),
            doc,
        }
    }

    /// Read access to the current document
    pub fn document(&self) -> &ProjectDocument {
        &self.doc
    }

    pub fn backend(&self) -> &dyn SlotBackend {
        self.backend.as_ref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Re-reads the document from the durable slot. Never fails.
    pub fn load(&mut self) -> &ProjectDocument {
        self.doc = load_document(self.backend.as_ref(), &self.key);
        &self.doc
    }

    /// Writes the full current document to the durable slot
    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.doc).context("Failed to serialize project")?;
        self.backend
            .write(&self.key, &json)
            .with_context(|| format!("Failed to persist project to slot {:?}", self.key))?;
        debug!(
            "Persisted project {} ({} bytes)",
            self.doc.project.project_auto_id,
            json.len()
        );
        Ok(())
    }

    /// Sets a leaf field by dotted path and persists
    pub fn set_field(&mut self, path: &str, value: &str) -> Result<(), StoreError> {
        match FieldPath::parse(path)? {
            FieldPath::SystemsIntegratorId => {
                self.doc.project.systems_integrator_id = value.to_string();
            }
            FieldPath::ProjectName => {
                self.doc.project.project_name = value.to_string();
            }
            FieldPath::ProjectAutoId => {
                return Err(FieldError::ReadOnly(path.to_string()).into());
            }
            FieldPath::BuildingsCount => {
                self.set_buildings_count(clamp_int(
                    value,
                    BUILDINGS_COUNT_MIN,
                    BUILDINGS_COUNT_MAX,
                ))?;
                return Ok(());
            }
            FieldPath::Connectivity => {
                let connectivity = value.parse::<Connectivity>().map_err(|reason| {
                    FieldError::InvalidValue {
                        field: path.to_string(),
                        reason,
                    }
                })?;
                self.doc.solution.connectivity = connectivity;
            }
            FieldPath::IncludesCloud => {
                self.doc.solution.includes_cloud = parse_bool_field(path, value)?;
            }
            FieldPath::Integration(key) => {
                let enabled = parse_bool_field(path, value)?;
                self.doc.solution.integrations.insert(key, enabled);
            }
        }
        self.save()
    }

    /// Clamps `n` into the building count bounds, reconciles the building list and persists
    pub fn set_buildings_count(&mut self, n: i64) -> Result<(), StoreError> {
        let count = n.clamp(BUILDINGS_COUNT_MIN, BUILDINGS_COUNT_MAX);
        self.doc.project.buildings_count = u32::try_from(count).unwrap_or(1);
        self.doc.reconcile_buildings();
        self.save()
    }

    /// Sets one field of the building at `index` (0-based); numeric fields are clamped
    pub fn set_building_field(
        &mut self,
        index: usize,
        field: BuildingField,
        value: &str,
    ) -> Result<(), StoreError> {
        let len = self.doc.building.items.len();
        let entry = self
            .doc
            .building
            .items
            .get_mut(index)
            .ok_or(FieldError::IndexOutOfRange { index, len })?;

        match field {
            BuildingField::Name => entry.name = value.to_string(),
            BuildingField::Floors => {
                entry.floors = clamped_u32(value, FLOORS_MIN, FLOORS_MAX);
            }
            BuildingField::ApproxDevices => {
                entry.approx_devices = clamped_u32(value, DEVICES_MIN, DEVICES_MAX);
            }
        }
        self.save()
    }

    /// Building totals, recomputed on every call
    pub fn compute_summary(&self) -> Summary {
        self.doc.summary()
    }

    /// Replaces the current document with one parsed from `raw`.
    ///
    /// On failure the current document is left untouched. On success the
    /// auto id is back-filled if absent, the building list is reconciled and
    /// the new document is persisted.
    pub fn import_document(&mut self, raw: &str) -> Result<&ProjectDocument, StoreError> {
        let mut doc = parse_document(raw)?;
        if doc.ensure_auto_id() {
            debug!("Imported document had no auto id, assigned {}", doc.project.project_auto_id);
        }
        doc.reconcile_buildings();

        self.doc = doc;
        self.save()?;
        Ok(&self.doc)
    }

    /// Serializes the full current document as pretty-printed JSON
    pub fn export_document(&self) -> Result<String, StoreError> {
        let json =
            serde_json::to_string_pretty(&self.doc).context("Failed to serialize project")?;
        Ok(json)
    }

    /// Discards the current document for a fresh default one and persists it
    pub fn reset(&mut self) -> Result<&ProjectDocument, StoreError> {
        self.doc = ProjectDocument::new();
        self.save()?;
        Ok(&self.doc)
    }
}

fn clamped_u32(value: &str, min: i64, max: i64) -> u32 {
    u32::try_from(clamp_int(value, min, max)).unwrap_or(0)
}

fn parse_bool_field(path: &str, value: &str) -> Result<bool, FieldError> {
    parse_flag(value).ok_or_else(|| FieldError::InvalidValue {
        field: path.to_string(),
        reason: format!("expected true or false, got {:?}", value),
    })
}

/// Validates and parses an external document.
///
/// The raw text must be a JSON object carrying the three required sections
/// (present and not null). Leaf fields are tolerated when missing.
pub fn parse_document(raw: &str) -> Result<ProjectDocument, ImportError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ImportError::Malformed(e.to_string()))?;

    let Value::Object(map) = &value else {
        return Err(ImportError::MissingSections(
            REQUIRED_SECTIONS.iter().map(|s| s.to_string()).collect(),
        ));
    };

    let missing: Vec<String> = REQUIRED_SECTIONS
        .iter()
        .filter(|section| map.get(**section).map_or(true, Value::is_null))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingSections(missing));
    }

    serde_json::from_value(value).map_err(|e| ImportError::Malformed(e.to_string()))
}

/// Reads the document stored under `key`, falling back to a fresh document
/// when the slot is empty, unreadable, unparseable or missing a section
pub fn load_document(backend: &dyn SlotBackend, key: &str) -> ProjectDocument {
    let raw = match backend.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No stored project under {:?}, starting fresh", key);
            return ProjectDocument::new();
        }
        Err(e) => {
            warn!("Failed to read stored project, starting fresh: {:#}", e);
            return ProjectDocument::new();
        }
    };

    match parse_document(&raw) {
        Ok(mut doc) => {
            // The auto id is only generated on creation or import; a stored
            // document without one keeps it empty
            doc.reconcile_buildings();
            doc
        }
        Err(e) => {
            warn!("Discarding stored project: {}", e);
            ProjectDocument::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use crate::models::BuildingEntry;

    fn memory_store() -> (ProjectStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = ProjectStore::open(Box::new(backend.clone()));
        (store, backend)
    }

    fn stored(backend: &MemoryBackend) -> ProjectDocument {
        let raw = backend.read(STORAGE_KEY).unwrap().expect("slot written");
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_open_empty_slot_creates_fresh_document() {
        let (store, backend) = memory_store();
        assert_eq!(store.document().project.buildings_count, 1);
        assert_eq!(store.document().building.items.len(), 1);
        // Loading alone does not write
        assert!(backend.read(STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_open_discards_corrupt_slot() {
        let backend = MemoryBackend::with_slot(STORAGE_KEY, "{not json");
        let store = ProjectStore::open(Box::new(backend));
        assert_eq!(store.document().building.items.len(), 1);

        let backend = MemoryBackend::with_slot(STORAGE_KEY, r#"{"project":{},"building":{}}"#);
        let store = ProjectStore::open(Box::new(backend));
        assert_eq!(store.document().project.project_name, "");
        assert!(!store.document().project.project_auto_id.is_empty());
    }

    #[test]
    fn test_open_restores_and_reconciles() {
        let raw = r#"{
            "project": {"projectAutoId": "abc", "projectName": "Campus", "buildingsCount": 3},
            "building": {"items": [{"name": "North", "floors": 4, "approxDevices": 10}]},
            "solution": {"connectivity": "WAN"}
        }"#;
        let backend = MemoryBackend::with_slot(STORAGE_KEY, raw);
        let store = ProjectStore::open(Box::new(backend));

        let doc = store.document();
        assert_eq!(doc.project.project_auto_id, "abc");
        assert_eq!(doc.project.project_name, "Campus");
        assert_eq!(doc.building.items.len(), 3);
        assert_eq!(doc.building.items[0].name, "North");
        assert_eq!(doc.building.items[2], BuildingEntry::default_at(2));
        assert_eq!(doc.solution.connectivity, Connectivity::Wan);
    }

    #[test]
    fn test_open_does_not_invent_auto_id() {
        let raw = r#"{
            "project": {"projectName": "No id"},
            "building": {"items": []},
            "solution": {}
        }"#;
        let backend = MemoryBackend::with_slot(STORAGE_KEY, raw);

        let first = ProjectStore::open(Box::new(backend.clone()));
        let second = ProjectStore::open(Box::new(backend.clone()));
        assert_eq!(first.document().project.project_auto_id, "");
        assert_eq!(
            crate::export::export_file_name(first.document()),
            crate::export::export_file_name(second.document())
        );
        // Loading alone never rewrites the slot
        assert_eq!(backend.read(STORAGE_KEY).unwrap().as_deref(), Some(raw));
    }

    #[test]
    fn test_set_buildings_count_in_range() {
        let (mut store, _) = memory_store();
        for n in 1..=50 {
            store.set_buildings_count(n).unwrap();
            assert_eq!(store.document().building.items.len(), n as usize);
            assert_eq!(store.document().project.buildings_count, n as u32);
        }
    }

    #[test]
    fn test_set_buildings_count_clamps() {
        let (mut store, backend) = memory_store();

        store.set_buildings_count(0).unwrap();
        assert_eq!(store.document().project.buildings_count, 1);
        assert_eq!(store.document().building.items.len(), 1);

        store.set_buildings_count(120).unwrap();
        assert_eq!(store.document().project.buildings_count, 50);
        assert_eq!(store.document().building.items.len(), 50);

        assert_eq!(stored(&backend).building.items.len(), 50);
    }

    #[test]
    fn test_grow_preserves_existing_entries() {
        let (mut store, _) = memory_store();
        store
            .set_building_field(0, BuildingField::Name, "Tower")
            .unwrap();
        store
            .set_building_field(0, BuildingField::Floors, "12")
            .unwrap();

        store.set_buildings_count(3).unwrap();

        let items = &store.document().building.items;
        assert_eq!(items[0].name, "Tower");
        assert_eq!(items[0].floors, 12);
        assert_eq!(items[1].name, "Building 2");
        assert_eq!(items[2].floors, 1);
        assert_eq!(items[2].approx_devices, 50);
    }

    #[test]
    fn test_shrink_then_grow_forgets_discarded_entries() {
        let (mut store, _) = memory_store();
        store.set_buildings_count(3).unwrap();
        store
            .set_building_field(2, BuildingField::Name, "Annex")
            .unwrap();

        store.set_buildings_count(2).unwrap();
        assert_eq!(store.document().building.items.len(), 2);

        store.set_buildings_count(3).unwrap();
        assert_eq!(
            store.document().building.items[2],
            BuildingEntry::default_at(2)
        );
    }

    #[test]
    fn test_building_field_clamping() {
        let (mut store, backend) = memory_store();

        store
            .set_building_field(0, BuildingField::Floors, "500")
            .unwrap();
        assert_eq!(store.document().building.items[0].floors, 200);

        store
            .set_building_field(0, BuildingField::Floors, "-5")
            .unwrap();
        assert_eq!(store.document().building.items[0].floors, 1);

        store
            .set_building_field(0, BuildingField::Floors, "abc")
            .unwrap();
        assert_eq!(store.document().building.items[0].floors, 1);

        store
            .set_building_field(0, BuildingField::ApproxDevices, "250000")
            .unwrap();
        assert_eq!(store.document().building.items[0].approx_devices, 100_000);

        store
            .set_building_field(0, BuildingField::ApproxDevices, "oops")
            .unwrap();
        assert_eq!(store.document().building.items[0].approx_devices, 0);
        assert_eq!(stored(&backend).building.items[0].approx_devices, 0);
    }

    #[test]
    fn test_building_index_out_of_range() {
        let (mut store, _) = memory_store();
        let err = store
            .set_building_field(1, BuildingField::Name, "Ghost")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Field(FieldError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_set_field_paths() {
        let (mut store, backend) = memory_store();

        store.set_field("project.projectName", "West Park").unwrap();
        store.set_field("project.systemsIntegratorId", "12345").unwrap();
        store.set_field("project.buildingsCount", "4").unwrap();
        store.set_field("solution.connectivity", "vpn").unwrap();
        store.set_field("solution.includesCloud", "true").unwrap();
        store.set_field("solution.integrations.cctv", "yes").unwrap();
        store.set_field("solution.integrations.bms", "off").unwrap();

        let doc = stored(&backend);
        assert_eq!(doc.project.project_name, "West Park");
        assert_eq!(doc.project.systems_integrator_id, "12345");
        assert_eq!(doc.project.buildings_count, 4);
        assert_eq!(doc.building.items.len(), 4);
        assert_eq!(doc.solution.connectivity, Connectivity::Vpn);
        assert!(doc.solution.includes_cloud);
        assert!(doc.solution.integration("cctv"));
        assert!(!doc.solution.integration("bms"));
    }

    #[test]
    fn test_set_field_rejections() {
        let (mut store, _) = memory_store();
        let id = store.document().project.project_auto_id.clone();

        assert!(matches!(
            store.set_field("project.projectAutoId", "x"),
            Err(StoreError::Field(FieldError::ReadOnly(_)))
        ));
        assert!(matches!(
            store.set_field("project.unknown", "x"),
            Err(StoreError::Field(FieldError::UnknownPath(_)))
        ));
        assert!(matches!(
            store.set_field("solution.connectivity", "satellite"),
            Err(StoreError::Field(FieldError::InvalidValue { .. }))
        ));
        assert_eq!(store.document().project.project_auto_id, id);
    }

    #[test]
    fn test_buildings_count_text_clamps() {
        let (mut store, _) = memory_store();
        store.set_field("project.buildingsCount", "abc").unwrap();
        assert_eq!(store.document().project.buildings_count, 1);
        store.set_field("project.buildingsCount", "75").unwrap();
        assert_eq!(store.document().project.buildings_count, 50);
    }

    #[test]
    fn test_compute_summary() {
        let (mut store, _) = memory_store();
        store.set_buildings_count(2).unwrap();
        store.set_building_field(0, BuildingField::Floors, "2").unwrap();
        store
            .set_building_field(0, BuildingField::ApproxDevices, "10")
            .unwrap();
        store.set_building_field(1, BuildingField::Floors, "3").unwrap();
        store
            .set_building_field(1, BuildingField::ApproxDevices, "5")
            .unwrap();

        assert_eq!(
            store.compute_summary(),
            Summary {
                buildings: 2,
                total_floors: 5,
                total_devices: 15
            }
        );
    }

    #[test]
    fn test_export_import_round_trip() {
        let (mut store, _) = memory_store();
        store.set_field("project.projectName", "Round Trip").unwrap();
        store.set_buildings_count(3).unwrap();
        store
            .set_building_field(1, BuildingField::ApproxDevices, "777")
            .unwrap();
        store.set_field("solution.connectivity", "WAN").unwrap();
        let before = store.document().clone();

        let exported = store.export_document().unwrap();
        let (mut other, _) = memory_store();
        let imported = other.import_document(&exported).unwrap();

        assert_eq!(*imported, before);
    }

    #[test]
    fn test_import_missing_sections_leaves_document() {
        let (mut store, backend) = memory_store();
        store.set_field("project.projectName", "Keep me").unwrap();
        let before = store.document().clone();

        let err = store.import_document(r#"{"building":{}}"#).unwrap_err();
        match err {
            StoreError::Import(ImportError::MissingSections(missing)) => {
                assert_eq!(missing, vec!["project".to_string(), "solution".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*store.document(), before);
        assert_eq!(stored(&backend), before);
    }

    #[test]
    fn test_import_malformed() {
        let (mut store, _) = memory_store();
        let before = store.document().clone();

        let err = store.import_document("not json").unwrap_err();
        assert!(matches!(err, StoreError::Import(ImportError::Malformed(_))));
        assert_eq!(*store.document(), before);

        let err = store
            .import_document(r#"{"project": 5, "building": {}, "solution": {}}"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::Import(ImportError::Malformed(_))));
    }

    #[test]
    fn test_import_backfills_id_and_reconciles() {
        let (mut store, backend) = memory_store();
        let raw = r#"{
            "project": {"projectName": "Imported", "buildingsCount": 2},
            "building": {"items": [
                {"name": "A", "floors": 1, "approxDevices": 1},
                {"name": "B", "floors": 1, "approxDevices": 1},
                {"name": "C", "floors": 1, "approxDevices": 1}
            ]},
            "solution": {}
        }"#;

        let doc = store.import_document(raw).unwrap().clone();
        assert!(!doc.project.project_auto_id.is_empty());
        assert_eq!(doc.building.items.len(), 2);
        assert_eq!(doc.building.items[1].name, "B");
        assert_eq!(stored(&backend), doc);
    }

    #[test]
    fn test_import_keeps_existing_id() {
        let (mut store, _) = memory_store();
        let raw = r#"{"project": {"projectAutoId": "fixed-id"}, "building": {}, "solution": {}}"#;
        let doc = store.import_document(raw).unwrap();
        assert_eq!(doc.project.project_auto_id, "fixed-id");
        assert_eq!(doc.building.items.len(), 1);
    }

    #[test]
    fn test_reset_generates_new_id() {
        let (mut store, backend) = memory_store();
        store.set_buildings_count(5).unwrap();
        let old_id = store.document().project.project_auto_id.clone();

        let doc = store.reset().unwrap().clone();
        assert_ne!(doc.project.project_auto_id, old_id);
        assert_eq!(doc.project.buildings_count, 1);
        assert_eq!(doc.building.items, vec![BuildingEntry::default_at(0)]);
        assert_eq!(stored(&backend), doc);
    }

    #[test]
    fn test_write_failure_is_surfaced() {
        let (mut store, backend) = memory_store();
        backend.set_fail_writes(true);

        let err = store.set_field("project.projectName", "Unsaved").unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        // The edit stays in memory
        assert_eq!(store.document().project.project_name, "Unsaved");

        backend.set_fail_writes(false);
        store.save().unwrap();
        assert_eq!(stored(&backend).project.project_name, "Unsaved");
    }

    #[test]
    fn test_independent_instances() {
        let (mut first, _) = memory_store();
        let (second, _) = memory_store();
        first.set_buildings_count(7).unwrap();
        assert_eq!(second.document().building.items.len(), 1);
        assert_ne!(
            first.document().project.project_auto_id,
            second.document().project.project_auto_id
        );
    }
}
