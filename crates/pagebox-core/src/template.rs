//! Named box layouts that can be stamped onto any page.
//!
//! A template holds only relative rectangles keyed by column name. Nothing
//! links a page back to the template it was built from, so editing or
//! deleting a template never touches boxes already applied.

use std::collections::BTreeMap;

use crate::error::PageboxError;
use crate::model::{Column, PageRef, Template};
use crate::store::{place_box, ProjectStore};

/// What happens to a target page's existing boxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Replace only the boxes of columns the template defines.
    #[default]
    ReplaceMatching,
    /// Remove every box on the page before placing the template's boxes.
    ClearPage,
}

#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: Vec<PageRef>,
    /// Pages left untouched, with the reason.
    pub skipped: Vec<(PageRef, PageboxError)>,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Snapshot every box on `page` into a template called `name`.
///
/// Extracted values are not copied. An existing template of the same name is
/// replaced.
pub fn capture_template(
    store: &mut ProjectStore,
    page: &PageRef,
    name: &str,
    remark: &str,
) -> Result<Template, PageboxError> {
    let name = validate_template_name(name)?;
    let page_data = store.page(page)?;
    let boxes: BTreeMap<String, _> = page_data
        .boxes
        .iter()
        .map(|(column, b)| (column.clone(), b.rect))
        .collect();

    let template = Template {
        name,
        ref_page: Some(page.clone()),
        remark: remark.to_string(),
        boxes,
    };

    let templates = &mut store.data_mut().templates;
    match templates.iter_mut().find(|t| t.name == template.name) {
        Some(existing) => *existing = template.clone(),
        None => templates.push(template.clone()),
    }
    tracing::info!(
        template = %template.name,
        %page,
        boxes = template.boxes.len(),
        "captured template"
    );
    Ok(template)
}

/// Apply the stored template `name` to every page in `targets`.
pub fn apply_template(
    store: &mut ProjectStore,
    name: &str,
    targets: &[PageRef],
    policy: ConflictPolicy,
) -> Result<ApplyReport, PageboxError> {
    let template = store
        .data()
        .template(name)
        .cloned()
        .ok_or_else(|| PageboxError::TemplateNotFound(name.to_string()))?;
    Ok(apply(store, &template, targets, policy))
}

/// Place `template`'s boxes on each target page.
///
/// Each page is updated as a unit: it is checked before anything changes, so
/// a bad target is skipped untouched and the others still proceed. Columns
/// the template names but the project lacks are created. Replaced boxes follow
/// the usual rule: their cells are cleared and flagged for re-extraction.
pub fn apply(
    store: &mut ProjectStore,
    template: &Template,
    targets: &[PageRef],
    policy: ConflictPolicy,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for target in targets {
        if let Err(e) = store.page(target) {
            tracing::warn!(template = %template.name, page = %target, error = %e, "skipping page");
            report.skipped.push((target.clone(), e));
            continue;
        }

        for column in template.boxes.keys() {
            if !store.data().has_column(column) {
                tracing::info!(
                    column = %column,
                    template = %template.name,
                    "creating column from template"
                );
                store.data_mut().columns.push(Column::new(column.clone()));
            }
        }

        let first_id = store.allocate_box_ids(template.boxes.len() as u64);
        let page_data = match store.page_mut_or_err(target) {
            Ok(p) => p,
            Err(e) => {
                report.skipped.push((target.clone(), e));
                continue;
            }
        };

        if policy == ConflictPolicy::ClearPage {
            let removed: Vec<String> = page_data.boxes.keys().cloned().collect();
            page_data.boxes.clear();
            for column in removed {
                if let Some(cell) = page_data.cells.get_mut(&column) {
                    cell.stale = false;
                }
            }
        }

        for ((column, rect), id) in template.boxes.iter().zip(first_id..) {
            place_box(page_data, target, column, *rect, id);
        }
        report.applied.push(target.clone());
    }

    tracing::info!(
        template = %template.name,
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "applied template"
    );
    report
}

pub fn delete_template(store: &mut ProjectStore, name: &str) -> Result<Template, PageboxError> {
    let templates = &mut store.data_mut().templates;
    let idx = templates
        .iter()
        .position(|t| t.name == name)
        .ok_or_else(|| PageboxError::TemplateNotFound(name.to_string()))?;
    Ok(templates.remove(idx))
}

pub fn rename_template(store: &mut ProjectStore, old: &str, new: &str) -> Result<(), PageboxError> {
    if store.data().template(old).is_none() {
        return Err(PageboxError::TemplateNotFound(old.to_string()));
    }
    let new = validate_template_name(new)?;
    let new = new.as_str();
    if old == new {
        return Ok(());
    }
    if store.data().template(new).is_some() {
        return Err(PageboxError::DuplicateTemplate(new.to_string()));
    }
    if let Some(t) = store.data_mut().templates.iter_mut().find(|t| t.name == old) {
        t.name = new.to_string();
    }
    Ok(())
}

pub fn set_template_remark(
    store: &mut ProjectStore,
    name: &str,
    remark: &str,
) -> Result<(), PageboxError> {
    let t = store
        .data_mut()
        .templates
        .iter_mut()
        .find(|t| t.name == name)
        .ok_or_else(|| PageboxError::TemplateNotFound(name.to_string()))?;
    t.remark = remark.to_string();
    Ok(())
}

pub fn templates(store: &ProjectStore) -> &[Template] {
    &store.data().templates
}

fn validate_template_name(name: &str) -> Result<String, PageboxError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PageboxError::InvalidTemplateName(
            "template name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}
