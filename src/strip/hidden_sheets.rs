//! Eliminación de hojas ocultas.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::constants::{ODF_CONTENT_PART, ODF_OBJECT_REPLACEMENTS_DIR, ODF_SETTINGS_PART};
use crate::document::Document;
use crate::error::Result;
use crate::format::Format;
use crate::graph::MANIFEST_PART;
use crate::odf::content::{ContentEdit, OdfTable, parse_tables, rewrite_content};
use crate::odf::settings::rewrite_settings;
use crate::ooxml::workbook::{WorkbookEdit, rewrite_workbook};
use crate::report::SanitizationReport;
use crate::sheets::{SheetEntry, list_sheets};

use super::{apply_rewrite, remove_calc_chain, remove_sheet_titles};

/// Reparto de las hojas entre las que se quedan y las que se quitan.
#[derive(Debug, Default)]
struct SheetPlan {
    removed: Vec<SheetEntry>,
    /// Hoja oculta que se conserva visible porque no quedaba ninguna otra.
    forced: Option<SheetEntry>,
}

impl SheetPlan {
    fn new(sheets: &[SheetEntry]) -> Self {
        let mut removed: Vec<SheetEntry> = sheets
            .iter()
            .filter(|sheet| !sheet.visibility.is_visible())
            .cloned()
            .collect();
        let forced = if !removed.is_empty() && removed.len() == sheets.len() {
            Some(removed.remove(0))
        } else {
            None
        };
        Self { removed, forced }
    }

    fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.forced.is_none()
    }

    fn removed_ids(&self) -> BTreeSet<String> {
        self.removed.iter().map(|sheet| sheet.rel_id.clone()).collect()
    }

    fn removed_names(&self) -> Vec<String> {
        self.removed.iter().map(|sheet| sheet.name.clone()).collect()
    }

    fn record(&self, report: &mut SanitizationReport) {
        if let Some(sheet) = &self.forced {
            warn!(sheet = %sheet.name, "todas las hojas estaban ocultas; se conserva la primera como visible");
            report.forced_visible = Some(sheet.name.clone());
        }
        for sheet in &self.removed {
            debug!(sheet = %sheet.name, visibility = ?sheet.visibility, "hoja oculta eliminada");
        }
        report.hidden_sheets_removed += self.removed.len();
        report.removed_sheets.extend(self.removed_names());
    }
}

/// Elimina las hojas ocultas y muy ocultas, manteniendo el orden de las demás.
pub fn strip_hidden_sheets(doc: Document, report: &mut SanitizationReport) -> Result<Document> {
    match doc.format {
        Format::Ooxml => strip_ooxml(doc, report),
        Format::Odf => strip_odf(doc, report),
    }
}

fn strip_ooxml(mut doc: Document, report: &mut SanitizationReport) -> Result<Document> {
    let Some(workbook) = doc.sheet_list_part() else {
        return Ok(doc);
    };
    let sheets = list_sheets(&doc)?;
    let plan = SheetPlan::new(&sheets);
    if plan.is_empty() {
        return Ok(doc);
    }

    for sheet in &plan.removed {
        if let Some(target) = &sheet.target {
            let removed = doc.remove_part(target);
            report.record_removed_parts(removed);
        }
    }

    let edit = WorkbookEdit {
        removed_sheets: plan.removed_ids(),
        unhide: plan.forced.as_ref().map(|sheet| sheet.rel_id.clone()),
        strip_code_names: false,
    };
    if let Some(bytes) = doc.archive.get(&workbook) {
        let rewritten = rewrite_workbook(&workbook, bytes, &sheets, &edit)?;
        apply_rewrite(&mut doc, &workbook, rewritten);
    }

    if !plan.removed.is_empty() {
        remove_calc_chain(&mut doc, &workbook, report);
        remove_sheet_titles(&mut doc, &plan.removed_names())?;
    }

    plan.record(report);
    info!(removed = plan.removed.len(), "hojas ocultas OOXML eliminadas");
    Ok(doc)
}

fn strip_odf(mut doc: Document, report: &mut SanitizationReport) -> Result<Document> {
    let Some(bytes) = doc.archive.get(ODF_CONTENT_PART) else {
        return Ok(doc);
    };
    let tables = parse_tables(bytes)?;
    let entries: Vec<SheetEntry> = tables.iter().map(|table| table.entry.clone()).collect();
    let plan = SheetPlan::new(&entries);
    if plan.is_empty() {
        return Ok(doc);
    }

    let unhide = plan.forced.as_ref().and_then(|forced| {
        tables
            .iter()
            .find(|table| table.entry.name == forced.name)
            .map(|table| {
                let style = table.style_name.clone().filter(|_| table.hidden_by_style);
                (table.entry.name.clone(), style)
            })
    });
    let edit = ContentEdit {
        removed_tables: plan.removed_ids(),
        unhide,
        strip_scripts: false,
    };
    let rewritten = rewrite_content(ODF_CONTENT_PART, bytes, &edit)?;
    apply_rewrite(&mut doc, ODF_CONTENT_PART, rewritten);

    let orphaned = orphaned_objects(&tables, &edit.removed_tables);
    remove_embedded_objects(&mut doc, &orphaned, report);

    let fallback = entries
        .iter()
        .find(|entry| !edit.removed_tables.contains(&entry.rel_id))
        .map(|entry| entry.name.clone())
        .unwrap_or_default();
    if let Some(settings) = doc.archive.get(ODF_SETTINGS_PART) {
        let rewritten = rewrite_settings(ODF_SETTINGS_PART, settings, &edit.removed_tables, &fallback)?;
        apply_rewrite(&mut doc, ODF_SETTINGS_PART, rewritten);
    }

    plan.record(report);
    info!(removed = plan.removed.len(), "tablas ocultas ODF eliminadas");
    Ok(doc)
}

/// Objetos incrustados de las tablas quitadas que ninguna tabla restante usa.
fn orphaned_objects(tables: &[OdfTable], removed: &BTreeSet<String>) -> BTreeSet<String> {
    let (dropped, kept): (Vec<&OdfTable>, Vec<&OdfTable>) = tables
        .iter()
        .partition(|table| removed.contains(&table.entry.rel_id));
    let in_use: BTreeSet<&String> = kept.iter().flat_map(|table| &table.objects).collect();
    dropped
        .iter()
        .flat_map(|table| &table.objects)
        .filter(|object| !in_use.contains(object))
        .cloned()
        .collect()
}

/// Quita cada objeto (su subdirectorio, su imagen de sustitución y su entrada
/// en el manifiesto) a través de la cascada de `Document::remove_part`.
fn remove_embedded_objects(
    doc: &mut Document,
    objects: &BTreeSet<String>,
    report: &mut SanitizationReport,
) {
    for object in objects {
        let dir = format!("{object}/");
        let replacement = format!("{ODF_OBJECT_REPLACEMENTS_DIR}{object}");
        let parts: Vec<String> = doc
            .archive
            .file_names()
            .filter(|name| {
                name.starts_with(dir.as_str()) || *name == object.as_str() || *name == replacement.as_str()
            })
            .map(str::to_string)
            .collect();
        for part in &parts {
            report.record_removed_parts(doc.remove_part(part));
        }

        let directories: Vec<String> = doc
            .graph
            .table(MANIFEST_PART)
            .map(|table| {
                table
                    .entries()
                    .iter()
                    .filter(|rel| rel.target.starts_with(dir.as_str()))
                    .map(|rel| rel.target.clone())
                    .collect()
            })
            .unwrap_or_default();
        for entry in &directories {
            doc.graph.remove_all_referencing(entry);
        }
        doc.archive.remove_dir_entries(&dir);
        debug!(object = %object, parts = parts.len(), "objeto incrustado eliminado");
    }
}
