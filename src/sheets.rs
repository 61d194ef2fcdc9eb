//! Lista de hojas declarada por el libro.

use serde::Serialize;

use crate::document::Document;
use crate::error::Result;
use crate::format::Format;
use crate::{odf, ooxml};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetVisibility {
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetVisibility {
    /// Interpreta el atributo `state` de SpreadsheetML. Un valor ausente o
    /// desconocido equivale a visible.
    pub fn from_state(state: Option<&str>) -> Self {
        match state {
            Some("hidden") => SheetVisibility::Hidden,
            Some("veryHidden") => SheetVisibility::VeryHidden,
            _ => SheetVisibility::Visible,
        }
    }

    pub fn is_visible(self) -> bool {
        self == SheetVisibility::Visible
    }
}

/// Una hoja tal como aparece en la lista del libro.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SheetEntry {
    pub name: String,
    /// `sheetId` en OOXML; posición (desde 1) en ODF.
    pub sheet_id: String,
    pub visibility: SheetVisibility,
    /// Identificador con el que el libro referencia la hoja: `r:id` en OOXML,
    /// nombre de la tabla en ODF.
    pub rel_id: String,
    /// Parte con los datos de la hoja. Las tablas ODF viven dentro de `content.xml`.
    pub target: Option<String>,
}

/// Hojas del documento en el orden del libro.
pub fn list_sheets(doc: &Document) -> Result<Vec<SheetEntry>> {
    let Some(part) = doc.sheet_list_part() else {
        return Ok(Vec::new());
    };
    let Some(bytes) = doc.archive.get(&part) else {
        return Ok(Vec::new());
    };
    match doc.format {
        Format::Ooxml => ooxml::workbook::parse_sheets(&part, bytes, &doc.graph),
        Format::Odf => Ok(odf::content::parse_tables(bytes)?
            .into_iter()
            .map(|table| table.entry)
            .collect()),
    }
}
