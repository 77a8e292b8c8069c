//! Project file persistence.
//!
//! A project is saved as a single JSON document. Loading is all-or-nothing:
//! any structural problem yields [`PageboxError::CorruptProjectFile`] and no
//! partially built project is ever returned.

pub mod schema;

use chrono::{DateTime, SubsecRound, Utc};
use std::io::Write;
use std::path::Path;

use crate::error::PageboxError;
use crate::model::ProjectData;
use crate::store::ProjectStore;
use schema::{from_record, to_record, ProjectRecord, REQUIRED_KEYS};

/// Serialize a project to pretty-printed JSON. Does not touch `last_saved`.
pub fn to_json(data: &ProjectData) -> Result<String, PageboxError> {
    Ok(serde_json::to_string_pretty(&to_record(data))?)
}

/// Parse and validate a project document.
pub fn load(json: &str) -> Result<ProjectData, PageboxError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PageboxError::CorruptProjectFile(format!("invalid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| PageboxError::CorruptProjectFile("top level is not an object".into()))?;
    for key in REQUIRED_KEYS {
        if !object.contains_key(*key) {
            return Err(PageboxError::CorruptProjectFile(format!(
                "missing required key '{key}'"
            )));
        }
    }

    let record: ProjectRecord = serde_json::from_value(value)
        .map_err(|e| PageboxError::CorruptProjectFile(e.to_string()))?;
    from_record(record).map_err(PageboxError::CorruptProjectFile)
}

/// Stamp `last_saved` and write the project to `path` atomically.
///
/// The document is written to a temporary file next to `path` and renamed
/// over it, so a crash never leaves a half-written project behind.
pub fn save_to_path(store: &mut ProjectStore, path: &Path) -> Result<DateTime<Utc>, PageboxError> {
    let now = Utc::now().trunc_subsecs(0);
    let previous = store.data_mut().last_saved.replace(now);

    let written = write_atomic(store.data(), path);
    if written.is_err() {
        store.data_mut().last_saved = previous;
    }
    written?;

    tracing::info!(path = %path.display(), files = store.data().files.len(), "saved project");
    Ok(now)
}

fn write_atomic(data: &ProjectData, path: &Path) -> Result<(), PageboxError> {
    let json = to_json(data)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| PageboxError::Io(e.error))?;
    Ok(())
}

/// Read a project file into a fresh store.
pub fn load_from_path(path: &Path) -> Result<ProjectStore, PageboxError> {
    let json = std::fs::read_to_string(path)?;
    let data = load(&json)?;
    tracing::debug!(
        path = %path.display(),
        files = data.files.len(),
        columns = data.columns.len(),
        "loaded project"
    );
    Ok(ProjectStore::from_data(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Extraction;
    use crate::geometry::RelRect;
    use crate::model::{PageRef, TextSource};
    use crate::store::{BoxReading, FileImport};
    use crate::template::capture_template;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn sample_store() -> ProjectStore {
        let mut store = ProjectStore::new();
        let a = PathBuf::from("/docs/a.pdf");
        store.add_file(FileImport {
            path: a.clone(),
            file_size: 1234,
            page_count: 2,
        });
        store.add_file(FileImport {
            path: PathBuf::from("/docs/b.pdf"),
            file_size: 99,
            page_count: 1,
        });
        store.add_column("Invoice No").unwrap();
        store.add_column("Date").unwrap();

        let p0 = PageRef::new(&a, 0);
        let invoice = store
            .set_box(&p0, "Invoice No", RelRect::new(0.1, 0.1, 0.3, 0.05))
            .unwrap();
        store
            .set_box(&p0, "Date", RelRect::new(0.6, 0.1, 0.25, 0.05))
            .unwrap();
        store
            .apply_page_extractions(
                &p0,
                vec![BoxReading::new(&invoice, Extraction::new("INV-042", TextSource::Ocr))],
            )
            .unwrap();
        store
            .set_cell_value(&PageRef::new(&a, 1), "Date", "2024-01-02")
            .unwrap();
        capture_template(&mut store, &p0, "invoice", "first layout").unwrap();
        store.set_last_selected_page(Some(p0)).unwrap();
        store
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let mut store = sample_store();
        store.data_mut().last_saved = Some(Utc::now().trunc_subsecs(0));
        let json = to_json(store.data()).unwrap();
        let loaded = load(&json).unwrap();
        assert_eq!(&loaded, store.data());
    }

    #[test]
    fn test_json_shape() {
        let json = to_json(sample_store().data()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["version"], 1);
        assert_eq!(v["columns"][0], "Invoice No");
        assert_eq!(v["files"][0]["fileName"], "a.pdf");
        assert_eq!(v["files"][0]["pageCount"], 2);
        assert_eq!(v["files"][0]["pages"][0]["boxes"][0]["rect"].as_array().unwrap().len(), 4);
        assert_eq!(v["files"][0]["pages"][0]["cells"]["Invoice No"]["source"], "ocr");
        assert_eq!(v["lastSelectedPage"]["pageIndex"], 0);
        assert!(v["lastSaved"].is_null());
    }

    #[test]
    fn test_hidden_column_round_trip() {
        let mut store = sample_store();
        store.add_column("Notes").unwrap();
        store.set_column_visible("Notes", false).unwrap();

        let json = to_json(store.data()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["columns"][0], "Invoice No");
        assert_eq!(
            v["columns"][1],
            serde_json::json!({ "name": "Notes", "visible": false })
        );

        let loaded = load(&json).unwrap();
        assert_eq!(&loaded, store.data());
        let visible: Vec<&str> = loaded.visible_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(visible, ["Invoice No"]);
    }

    #[test]
    fn test_missing_required_key() {
        let json = r#"{ "files": [], "columns": [], "templates": [], "lastSaved": null }"#;
        let err = load(json).unwrap_err();
        assert!(matches!(
            err,
            PageboxError::CorruptProjectFile(ref m) if m.contains("lastSelectedPage")
        ));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let json = r#"{ "files": [], "columns": ["A"], "templates": [], "lastSaved": null,
                        "lastSelectedPage": null, "theme": "dark" }"#;
        let data = load(json).unwrap();
        assert_eq!(data.columns, ["A"]);
    }

    #[test]
    fn test_out_of_range_rect_rejected() {
        let mut v: serde_json::Value =
            serde_json::from_str(&to_json(sample_store().data()).unwrap()).unwrap();
        v["files"][0]["pages"][0]["boxes"][0]["rect"] = serde_json::json!([0.9, 0.1, 0.3, 0.05]);
        assert!(matches!(
            load(&v.to_string()),
            Err(PageboxError::CorruptProjectFile(_))
        ));
    }

    #[test]
    fn test_structural_errors_rejected() {
        let base: serde_json::Value =
            serde_json::from_str(&to_json(sample_store().data()).unwrap()).unwrap();

        let mut dup_column = base.clone();
        dup_column["columns"] = serde_json::json!(["Date", "Date"]);
        assert!(load(&dup_column.to_string()).is_err());

        let mut unknown_column = base.clone();
        unknown_column["files"][0]["pages"][0]["boxes"][0]["column"] = serde_json::json!("Nope");
        assert!(load(&unknown_column.to_string()).is_err());

        let mut bad_index = base.clone();
        bad_index["files"][1]["pages"][0]["pageIndex"] = serde_json::json!(7);
        assert!(load(&bad_index.to_string()).is_err());

        let mut newer = base.clone();
        newer["version"] = serde_json::json!(2);
        assert!(load(&newer.to_string()).is_err());

        let mut two_boxes = base;
        // Boxes are written in column order: "Date" first, then "Invoice No".
        two_boxes["files"][0]["pages"][0]["boxes"][0]["column"] = serde_json::json!("Invoice No");
        assert!(load(&two_boxes.to_string()).is_err());
    }

    #[test]
    fn test_save_to_path_stamps_time_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        let mut store = sample_store();

        let stamped = save_to_path(&mut store, &path).unwrap();
        assert_eq!(store.data().last_saved, Some(stamped));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Z\""));

        let reopened = load_from_path(&path).unwrap();
        assert_eq!(reopened.data(), store.data());
    }

    #[test]
    fn test_failed_load_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_from_path(&path),
            Err(PageboxError::CorruptProjectFile(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
