//! Etapas de saneamiento.
//!
//! Cada etapa consume el [`Document`] y devuelve uno nuevo: o se aplican todos
//! sus cambios o el documento se descarta con el error.

pub mod hidden_sheets;
pub mod macros;

use tracing::debug;

use crate::constants::{APP_PROPERTIES_PART, CALC_CHAIN_REL};
use crate::document::Document;
use crate::error::Result;
use crate::ooxml::app_properties;
use crate::report::SanitizationReport;

pub use hidden_sheets::strip_hidden_sheets;
pub use macros::{MacroReference, find_macro_references, strip_macros};

/// Sustituye una parte XML si la reescritura produjo bytes nuevos.
fn apply_rewrite(doc: &mut Document, part: &str, rewritten: Option<Vec<u8>>) {
    if let Some(bytes) = rewritten {
        debug!(part, "parte reescrita");
        doc.archive.replace(part, bytes);
    }
}

/// La cadena de cálculo indexa celdas por hoja; la aplicación la regenera.
fn remove_calc_chain(doc: &mut Document, workbook: &str, report: &mut SanitizationReport) {
    let targets: Vec<String> = doc
        .graph
        .table(workbook)
        .map(|table| {
            table
                .entries()
                .iter()
                .filter(|rel| !rel.external && rel.rel_type.ends_with(CALC_CHAIN_REL))
                .map(|rel| rel.target.clone())
                .collect()
        })
        .unwrap_or_default();
    for target in targets {
        let removed = doc.remove_part(&target);
        report.record_removed_parts(removed);
    }
}

/// Quita de `docProps/app.xml` los títulos de las hojas eliminadas.
fn remove_sheet_titles(doc: &mut Document, names: &[String]) -> Result<()> {
    let Some(bytes) = doc.archive.get(APP_PROPERTIES_PART) else {
        return Ok(());
    };
    let rewritten = app_properties::remove_sheet_titles(bytes, names)?;
    apply_rewrite(doc, APP_PROPERTIES_PART, rewritten);
    Ok(())
}
