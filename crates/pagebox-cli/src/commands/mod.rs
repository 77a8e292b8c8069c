pub mod boxes;
pub mod column;
pub mod import;
pub mod project;
pub mod recognize;
pub mod render;
pub mod template;

use indicatif::{ProgressBar, ProgressStyle};
use pagebox_core::error::PageboxError;
use pagebox_core::model::PageRef;
use pagebox_core::project::{load_from_path, save_to_path};
use pagebox_core::{Progress, ProjectStore};
use std::path::{Path, PathBuf};

/// Load a project, apply `f`, and save it back if `f` succeeded.
pub fn mutate<R>(
    project: &Path,
    f: impl FnOnce(&mut ProjectStore) -> Result<R, PageboxError>,
) -> Result<R, PageboxError> {
    let mut store = load_from_path(project)?;
    let result = f(&mut store)?;
    save_to_path(&mut store, project)?;
    Ok(result)
}

/// Resolve a file argument to the absolute path stored in the project.
pub fn page_ref(file: &Path, page: usize) -> PageRef {
    PageRef::new(absolute(file), page)
}

pub fn absolute(file: &Path) -> PathBuf {
    std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf())
}

/// Progress bar on stderr, fed from core progress callbacks.
pub fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

pub fn tick(pb: &ProgressBar, p: &Progress) {
    pb.set_position(p.completed as u64);
    if let Some(ref current) = p.current {
        pb.set_message(current.clone());
    }
}

/// 1-based page number on the command line, 0-based inside.
pub fn parse_page(s: &str) -> Result<usize, String> {
    let n: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a page number"))?;
    n.checked_sub(1)
        .ok_or_else(|| "page numbers start at 1".to_string())
}

/// Four comma-separated numbers.
pub fn parse_quad(s: &str) -> Result<[f64; 4], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("'{s}' must be four comma-separated numbers"))?;
    <[f64; 4]>::try_from(parts)
        .map_err(|_| format!("'{s}' must be four comma-separated numbers"))
}

/// `WIDTHxHEIGHT` or `WIDTH,HEIGHT`.
pub fn parse_size(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', ','])
        .ok_or_else(|| format!("'{s}' must look like 1200x1600"))?;
    let w: f64 = w.trim().parse().map_err(|_| format!("bad width in '{s}'"))?;
    let h: f64 = h.trim().parse().map_err(|_| format!("bad height in '{s}'"))?;
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("page size must be positive, got '{s}'"));
    }
    Ok((w, h))
}
