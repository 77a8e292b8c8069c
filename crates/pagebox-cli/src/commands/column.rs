use pagebox_core::error::PageboxError;
use pagebox_core::project::load_from_path;
use std::path::Path;

use super::mutate;

pub fn add(project: &Path, name: &str) -> Result<(), PageboxError> {
    mutate(project, |store| store.add_column(name))?;
    eprintln!("Added column '{}'", name.trim());
    Ok(())
}

pub fn remove(project: &Path, name: &str) -> Result<(), PageboxError> {
    mutate(project, |store| store.remove_column(name))?;
    eprintln!("Removed column '{name}' and its boxes and values");
    Ok(())
}

pub fn rename(project: &Path, old: &str, new: &str) -> Result<(), PageboxError> {
    mutate(project, |store| store.rename_column(old, new))?;
    eprintln!("Renamed column '{old}' to '{}'", new.trim());
    Ok(())
}

pub fn set_visible(project: &Path, name: &str, visible: bool) -> Result<(), PageboxError> {
    mutate(project, |store| store.set_column_visible(name, visible))?;
    eprintln!(
        "Column '{name}' is now {}",
        if visible { "shown" } else { "hidden" }
    );
    Ok(())
}

pub fn list(project: &Path) -> Result<(), PageboxError> {
    let store = load_from_path(project)?;
    for (i, column) in store.columns().iter().enumerate() {
        let boxes = store
            .data()
            .files
            .iter()
            .flat_map(|f| f.pages.iter())
            .filter(|p| p.box_for(&column.name).is_some())
            .count();
        let hidden = if column.visible { "" } else { ", hidden" };
        println!("{:>3}. {}  ({boxes} box(es){hidden})", i + 1, column.name);
    }
    Ok(())
}
