//! Eliminación de macros.
//!
//! En OOXML el código vive en `vbaProject.bin` (más sus firmas) y en hojas de
//! macros de Excel 4.0; en ODF, en las bibliotecas `Basic/`, `Scripts/` y
//! `Dialogs/`, enlazadas al documento mediante `script:event-listener`.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::constants::{
    CONTENT_TYPES_PART, MACRO_CONTENT_TYPES, MACRO_TEMPLATE_CT, MACRO_WORKBOOK_CT,
    MACROSHEET_REL_SUFFIXES, ODF_CONTENT_PART, ODF_MACRO_DIRS, ODF_STYLES_PART, TEMPLATE_CT,
    WORKBOOK_CT,
};
use crate::document::Document;
use crate::error::{Result, SanitizeError};
use crate::format::{Format, PartKind};
use crate::graph::MANIFEST_PART;
use crate::odf::content::{ContentEdit, rewrite_content};
use crate::ooxml::workbook::{WorkbookEdit, rewrite_workbook};
use crate::paths;
use crate::report::SanitizationReport;
use crate::sheets::{SheetEntry, list_sheets};

use super::{apply_rewrite, remove_calc_chain, remove_sheet_titles};

/// Índices de bibliotecas ODF: describen módulos pero no contienen código.
const ODF_LIBRARY_INDEXES: [&str; 4] = ["script-lc.xml", "script-lb.xml", "dialog-lc.xml", "dialog-lb.xml"];

/// Referencia a una parte con código ejecutable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MacroReference {
    /// Parte que declara la referencia (`[Content_Types].xml` si nadie la relaciona).
    pub owner: String,
    /// Identificador de relación o ruta de la entrada del manifiesto.
    pub entry: String,
    pub target: String,
    pub rel_type: String,
}

impl MacroReference {
    fn is_signature(&self) -> bool {
        self.rel_type.contains("vbaProjectSignature")
    }
}

/// Busca todas las partes de macros y cómo están referenciadas.
pub fn find_macro_references(doc: &Document) -> Vec<MacroReference> {
    let mut references = Vec::new();
    for name in doc.archive.file_names() {
        if doc.part_kind_of(name) != PartKind::MacroStorage {
            continue;
        }
        let referrers = doc.graph.referrers(name);
        if referrers.is_empty() {
            references.push(MacroReference {
                owner: CONTENT_TYPES_PART.to_string(),
                entry: paths::content_type_name(name),
                target: name.to_string(),
                rel_type: doc.graph.content_type_of(name).unwrap_or_default().to_string(),
            });
            continue;
        }
        for (owner, rel) in referrers {
            references.push(MacroReference {
                owner: owner.to_string(),
                entry: rel.id.clone(),
                target: name.to_string(),
                rel_type: if rel.rel_type.is_empty() {
                    doc.graph.content_type_of(name).unwrap_or_default().to_string()
                } else {
                    rel.rel_type.clone()
                },
            });
        }
    }
    references
}

/// Elimina todas las macros del documento.
pub fn strip_macros(doc: Document, report: &mut SanitizationReport) -> Result<Document> {
    match doc.format {
        Format::Ooxml => strip_ooxml(doc, report),
        Format::Odf => strip_odf(doc, report),
    }
}

fn strip_ooxml(mut doc: Document, report: &mut SanitizationReport) -> Result<Document> {
    let references = find_macro_references(&doc);
    if references.is_empty() {
        debug!("sin macros OOXML");
        return Ok(doc);
    }

    let mut targets: Vec<&str> = Vec::new();
    for reference in &references {
        if !targets.contains(&reference.target.as_str()) {
            targets.push(&reference.target);
        }
    }
    let signatures: BTreeSet<&str> = references
        .iter()
        .filter(|reference| reference.is_signature())
        .map(|reference| reference.target.as_str())
        .collect();

    let workbook = doc.sheet_list_part();
    let sheets = list_sheets(&doc)?;
    let macro_sheets: Vec<_> = sheets
        .iter()
        .filter(|sheet| {
            sheet.target.as_deref().is_some_and(|target| {
                references.iter().any(|reference| {
                    paths::same_part(&reference.target, target)
                        && MACROSHEET_REL_SUFFIXES
                            .iter()
                            .any(|suffix| reference.rel_type.ends_with(suffix))
                })
            })
        })
        .collect();
    if !sheets.is_empty() && macro_sheets.len() == sheets.len() {
        return Err(SanitizeError::malformed_part(
            workbook.unwrap_or_default(),
            "el libro sólo contiene hojas de macros",
        ));
    }
    // Si las hojas de macros eran las únicas visibles, la primera restante pasa a visible.
    let forced = if macro_sheets.is_empty() {
        None
    } else {
        let remaining: Vec<&SheetEntry> = sheets
            .iter()
            .filter(|sheet| !macro_sheets.iter().any(|m| m.rel_id == sheet.rel_id))
            .collect();
        match remaining.iter().any(|sheet| sheet.visibility.is_visible()) {
            true => None,
            false => remaining.first().map(|sheet| (*sheet).clone()),
        }
    };

    let mut macros_removed = 0;
    for target in &targets {
        if !doc.archive.contains(target) {
            continue;
        }
        let removed = doc.remove_part(target);
        if !removed.is_empty() && !signatures.contains(target) {
            macros_removed += 1;
        }
        debug!(part = *target, cascade = removed.len(), "parte de macros eliminada");
        report.record_removed_parts(removed);
    }

    if let Some(workbook) = &workbook {
        let edit = WorkbookEdit {
            removed_sheets: macro_sheets.iter().map(|sheet| sheet.rel_id.clone()).collect(),
            unhide: forced.as_ref().map(|sheet| sheet.rel_id.clone()),
            strip_code_names: true,
        };
        if let Some(bytes) = doc.archive.get(workbook) {
            let rewritten = rewrite_workbook(workbook, bytes, &sheets, &edit)?;
            apply_rewrite(&mut doc, workbook, rewritten);
        }

        if !macro_sheets.is_empty() {
            let names: Vec<String> = macro_sheets.iter().map(|sheet| sheet.name.clone()).collect();
            remove_calc_chain(&mut doc, workbook, report);
            remove_sheet_titles(&mut doc, &names)?;
        }

        if let Some(content_types) = doc.graph.content_types_mut() {
            let plain = match content_types.content_type_of(workbook) {
                Some(ct) if ct.eq_ignore_ascii_case(MACRO_WORKBOOK_CT) => Some(WORKBOOK_CT),
                Some(ct) if ct.eq_ignore_ascii_case(MACRO_TEMPLATE_CT) => Some(TEMPLATE_CT),
                _ => None,
            };
            if let Some(plain) = plain {
                content_types.set_override(workbook, plain);
            }
        }
    }

    if let Some(content_types) = doc.graph.content_types_mut() {
        content_types.remove_defaults_of_type(&MACRO_CONTENT_TYPES);
    }

    if let Some(sheet) = forced {
        warn!(sheet = %sheet.name, "sólo quedaban hojas ocultas tras quitar las hojas de macros; se muestra la primera");
        report.forced_visible = Some(sheet.name);
    }

    info!(macros = macros_removed, "macros OOXML eliminadas");
    report.macros_removed += macros_removed;
    Ok(doc)
}

fn strip_odf(mut doc: Document, report: &mut SanitizationReport) -> Result<Document> {
    let references = find_macro_references(&doc);

    let mut macros_removed = 0;
    for reference in &references {
        if !doc.archive.contains(&reference.target) {
            continue;
        }
        let removed = doc.remove_part(&reference.target);
        let file_name = reference.target.rsplit('/').next().unwrap_or_default();
        if !removed.is_empty() && !ODF_LIBRARY_INDEXES.contains(&file_name) {
            macros_removed += 1;
        }
        report.record_removed_parts(removed);
    }

    // Entradas de directorio del manifiesto y del ZIP.
    let directory_entries: Vec<String> = doc
        .graph
        .table(MANIFEST_PART)
        .map(|table| {
            table
                .entries()
                .iter()
                .filter(|rel| ODF_MACRO_DIRS.iter().any(|dir| rel.target.starts_with(dir)))
                .map(|rel| rel.target.clone())
                .collect()
        })
        .unwrap_or_default();
    for entry in directory_entries {
        doc.graph.remove_all_referencing(&entry);
    }
    for dir in ODF_MACRO_DIRS {
        doc.archive.remove_dir_entries(dir);
    }

    let edit = ContentEdit {
        strip_scripts: true,
        ..ContentEdit::default()
    };
    for part in [ODF_CONTENT_PART, ODF_STYLES_PART] {
        if let Some(bytes) = doc.archive.get(part) {
            let rewritten = rewrite_content(part, bytes, &edit)?;
            if rewritten.is_some() {
                info!(part, "enlaces a macros eliminados");
            }
            apply_rewrite(&mut doc, part, rewritten);
        }
    }

    if macros_removed > 0 {
        info!(macros = macros_removed, "macros ODF eliminadas");
    }
    report.macros_removed += macros_removed;
    Ok(doc)
}
