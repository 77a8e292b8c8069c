use std::path::{Path, PathBuf};

use crate::batch::{CancelFlag, Progress};
use crate::error::PageboxError;
use crate::extraction::RenderBackend;
use crate::store::{AddFileOutcome, FileImport, SharedProject};

#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: Vec<PathBuf>,
    /// Paths that were already in the project and got refreshed.
    pub updated: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, PageboxError)>,
    pub cancelled: bool,
}

/// Add PDF files to a project.
///
/// Paths are made absolute, sized from filesystem metadata and paged through
/// `backend`. A file that cannot be read is recorded in the report and the
/// rest still import. Cancellation is checked before each file.
pub fn import_files(
    project: &SharedProject,
    backend: &dyn RenderBackend,
    paths: &[PathBuf],
    progress: &mut dyn FnMut(&Progress),
    cancel: &CancelFlag,
) -> ImportReport {
    let mut report = ImportReport::default();

    for (i, path) in paths.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(completed = i, total = paths.len(), "import cancelled");
            report.cancelled = true;
            break;
        }

        match inspect(backend, path) {
            Ok(import) => {
                let path = import.path.clone();
                match project.write(|store| store.add_file(import)) {
                    AddFileOutcome::Added => report.added.push(path),
                    AddFileOutcome::Updated => report.updated.push(path),
                }
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not import file");
                report.failed.push((path.clone(), error));
            }
        }

        progress(&Progress {
            completed: i + 1,
            total: paths.len(),
            current: Some(path.display().to_string()),
        });
    }

    tracing::info!(
        added = report.added.len(),
        updated = report.updated.len(),
        failed = report.failed.len(),
        "import finished"
    );
    report
}

fn inspect(backend: &dyn RenderBackend, path: &Path) -> Result<FileImport, PageboxError> {
    let absolute = std::fs::canonicalize(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PageboxError::FileNotFound(path.to_path_buf()),
        _ => PageboxError::Io(e),
    })?;
    let file_size = std::fs::metadata(&absolute)?.len();
    let page_count = backend.page_count(&absolute)?;
    Ok(FileImport {
        path: absolute,
        file_size,
        page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PageHandle;
    use crate::store::ProjectStore;
    use std::sync::Arc;

    struct CountingPages(usize);

    impl RenderBackend for CountingPages {
        fn page_count(&self, file: &Path) -> Result<usize, PageboxError> {
            if file.extension().is_some_and(|e| e == "pdf") {
                Ok(self.0)
            } else {
                Err(PageboxError::Backend(format!("{} is not a PDF", file.display())))
            }
        }

        fn open_page(
            &self,
            _file: &Path,
            _page: usize,
        ) -> Result<Arc<dyn PageHandle>, PageboxError> {
            Err(PageboxError::Backend("not used".into()))
        }

        fn backend_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_import_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.pdf");
        let not_pdf = dir.path().join("notes.txt");
        std::fs::write(&good, b"%PDF-1.4 hello").unwrap();
        std::fs::write(&not_pdf, b"text").unwrap();
        let missing = dir.path().join("missing.pdf");

        let shared = SharedProject::new(ProjectStore::new());
        let mut ticks = 0;
        let report = import_files(
            &shared,
            &CountingPages(3),
            &[good.clone(), not_pdf, missing],
            &mut |_: &Progress| ticks += 1,
            &CancelFlag::new(),
        );

        assert_eq!(ticks, 3);
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[1].1, PageboxError::FileNotFound(_)));
        let data = shared.snapshot();
        assert_eq!(data.files[0].page_count, 3);
        assert_eq!(data.files[0].file_size, 14);
        assert!(data.files[0].path.is_absolute());
    }

    #[test]
    fn test_reimport_updates() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.pdf");
        std::fs::write(&good, b"%PDF").unwrap();
        let shared = SharedProject::new(ProjectStore::new());

        import_files(
            &shared,
            &CountingPages(2),
            &[good.clone()],
            &mut |_: &Progress| {},
            &CancelFlag::new(),
        );
        let report = import_files(
            &shared,
            &CountingPages(5),
            &[good],
            &mut |_: &Progress| {},
            &CancelFlag::new(),
        );
        assert_eq!(report.updated.len(), 1);
        let data = shared.snapshot();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].pages.len(), 5);
    }

    #[test]
    fn test_cancel_stops_before_next_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let p = dir.path().join(format!("{i}.pdf"));
                std::fs::write(&p, b"%PDF").unwrap();
                p
            })
            .collect();
        let shared = SharedProject::new(ProjectStore::new());
        let cancel = CancelFlag::new();
        let report = import_files(
            &shared,
            &CountingPages(1),
            &paths,
            &mut |_: &Progress| cancel.cancel(),
            &cancel,
        );
        assert!(report.cancelled);
        assert_eq!(report.added.len(), 1);
    }
}
