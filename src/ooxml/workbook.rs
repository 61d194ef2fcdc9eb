//! Lectura y reescritura de `xl/workbook.xml`.
//!
//! La lista `<sheets>` es posicional: `definedName/@localSheetId` y
//! `workbookView/@activeTab` guardan índices sobre ella, así que al quitar
//! hojas hay que renumerarlos.

use std::collections::BTreeSet;

use quick_xml::events::BytesStart;

use crate::error::{Result, SanitizeError};
use crate::graph::RelationshipGraph;
use crate::sheets::{SheetEntry, SheetVisibility};
use crate::xml::{
    self, Action, AttrEdit, XmlRewrite, children_named, descendants_named, element_text_content,
    parse_element,
};

/// Lee la lista de hojas. Devuelve una lista vacía si la parte no es un libro.
pub fn parse_sheets(part: &str, bytes: &[u8], graph: &RelationshipGraph) -> Result<Vec<SheetEntry>> {
    let root = parse_element(part, bytes)?;
    if root.name != "workbook" {
        return Ok(Vec::new());
    }
    let Some(sheets) = children_named(&root, "sheets").next() else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for sheet in children_named(sheets, "sheet") {
        let name = sheet
            .attributes
            .get("name")
            .cloned()
            .ok_or_else(|| SanitizeError::malformed_part(part, "hoja sin atributo name"))?;
        let Some(rel_id) = sheet.attributes.get("id").cloned() else {
            return Err(SanitizeError::malformed_part(
                part,
                format!("la hoja `{name}` no tiene r:id"),
            ));
        };
        let Some(target) = graph.resolve(part, &rel_id) else {
            return Err(SanitizeError::malformed_relationship(
                part,
                format!("la hoja `{name}` referencia `{rel_id}`, que no existe"),
            ));
        };

        entries.push(SheetEntry {
            sheet_id: sheet.attributes.get("sheetId").cloned().unwrap_or_default(),
            visibility: SheetVisibility::from_state(sheet.attributes.get("state").map(String::as_str)),
            target: Some(target.to_string()),
            rel_id,
            name,
        });
    }
    Ok(entries)
}

/// Cambios pendientes sobre el libro.
#[derive(Clone, Debug, Default)]
pub struct WorkbookEdit {
    /// `r:id` de las hojas que salen de la lista.
    pub removed_sheets: BTreeSet<String>,
    /// `r:id` de la hoja que debe quedar visible.
    pub unhide: Option<String>,
    /// Quita `codeName`, que sólo tiene sentido con un proyecto VBA.
    pub strip_code_names: bool,
}

impl WorkbookEdit {
    pub fn is_empty(&self) -> bool {
        self.removed_sheets.is_empty() && self.unhide.is_none() && !self.strip_code_names
    }
}

/// Aplica `edit` al libro. Devuelve `None` si el XML no cambió.
pub fn rewrite_workbook(
    part: &str,
    bytes: &[u8],
    sheets: &[SheetEntry],
    edit: &WorkbookEdit,
) -> Result<Option<Vec<u8>>> {
    if edit.is_empty() {
        return Ok(None);
    }

    let mut next = 0;
    let index_map: Vec<Option<usize>> = sheets
        .iter()
        .map(|sheet| {
            if edit.removed_sheets.contains(&sheet.rel_id) {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect();
    // Pestaña a la que saltar si la activa desaparece: la primera visible que queda.
    let fallback_tab = sheets
        .iter()
        .zip(&index_map)
        .find(|(sheet, new)| {
            new.is_some()
                && (sheet.visibility.is_visible() || edit.unhide.as_deref() == Some(sheet.rel_id.as_str()))
        })
        .and_then(|(_, new)| *new)
        .unwrap_or(0);

    let removed_names: Vec<&str> = sheets
        .iter()
        .filter(|sheet| edit.removed_sheets.contains(&sheet.rel_id))
        .map(|sheet| sheet.name.as_str())
        .collect();
    let root = parse_element(part, bytes)?;
    let stale_names: BTreeSet<usize> = descendants_named(&root, "definedName")
        .into_iter()
        .enumerate()
        .filter(|(_, name)| {
            let formula = element_text_content(name);
            removed_names
                .iter()
                .any(|sheet| references_sheet(&formula, sheet))
        })
        .map(|(index, _)| index)
        .collect();

    let mut rewriter = WorkbookRewriter {
        edit,
        index_map,
        fallback_tab,
        stale_names,
        defined_name_index: 0,
    };
    let (updated, changed) = xml::rewrite_xml(part, bytes, &mut rewriter)?;
    Ok(changed.then_some(updated))
}

/// Indica si una fórmula nombra la hoja `sheet` como `Hoja!A1` o `'Mi hoja'!A1`.
fn references_sheet(formula: &str, sheet: &str) -> bool {
    let quoted = format!("'{}'!", sheet.replace('\'', "''"));
    if formula.contains(&quoted) {
        return true;
    }
    let bare = format!("{sheet}!");
    formula.match_indices(&bare).any(|(start, _)| {
        formula[..start]
            .chars()
            .next_back()
            .is_none_or(|previous| !(previous.is_alphanumeric() || matches!(previous, '_' | '.' | '\'' | ']')))
    })
}

struct WorkbookRewriter<'a> {
    edit: &'a WorkbookEdit,
    index_map: Vec<Option<usize>>,
    fallback_tab: usize,
    /// Posiciones de los `definedName` cuya fórmula apunta a una hoja eliminada.
    stale_names: BTreeSet<usize>,
    defined_name_index: usize,
}

impl WorkbookRewriter<'_> {
    fn remap_tab(&self, value: &str) -> AttrEdit {
        match value.parse::<usize>() {
            Ok(old) => {
                let new = self
                    .index_map
                    .get(old)
                    .copied()
                    .flatten()
                    .unwrap_or(self.fallback_tab);
                AttrEdit::Set(new.to_string())
            }
            Err(_) => AttrEdit::Keep,
        }
    }
}

impl XmlRewrite for WorkbookRewriter<'_> {
    fn start(&mut self, path: &[String], element: &BytesStart<'_>) -> Result<Action> {
        let local = xml::local_name(element);
        let action = match local.as_str() {
            "sheet" if path.last().is_some_and(|parent| parent == "sheets") => {
                let rel_id = xml::attr(element, "id").unwrap_or_default();
                if self.edit.removed_sheets.contains(&rel_id) {
                    return Ok(Action::Remove);
                }
                if self.edit.unhide.as_deref() != Some(rel_id.as_str()) {
                    return Ok(Action::Keep);
                }
                xml::edit_attributes(element, |name, _| match name {
                    "state" => AttrEdit::Drop,
                    _ => AttrEdit::Keep,
                })
            }
            "definedName" => {
                let index = self.defined_name_index;
                self.defined_name_index += 1;
                if self.stale_names.contains(&index) {
                    return Ok(Action::Remove);
                }
                let Some(local_id) = xml::attr(element, "localSheetId")
                    .and_then(|value| value.parse::<usize>().ok())
                else {
                    return Ok(Action::Keep);
                };
                match self.index_map.get(local_id) {
                    Some(None) => return Ok(Action::Remove),
                    Some(Some(new)) if *new != local_id => {
                        let new = new.to_string();
                        xml::edit_attributes(element, |name, _| match name {
                            "localSheetId" => AttrEdit::Set(new.clone()),
                            _ => AttrEdit::Keep,
                        })
                    }
                    _ => None,
                }
            }
            "workbookView" => xml::edit_attributes(element, |name, value| match name {
                "activeTab" | "firstSheet" => self.remap_tab(value),
                _ => AttrEdit::Keep,
            }),
            "workbookPr" | "fileVersion" if self.edit.strip_code_names => {
                xml::edit_attributes(element, |name, _| match name {
                    "codeName" => AttrEdit::Drop,
                    _ => AttrEdit::Keep,
                })
            }
            _ => None,
        };
        Ok(action.map_or(Action::Keep, Action::Replace))
    }
}
