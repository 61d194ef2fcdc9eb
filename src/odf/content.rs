//! Tablas, estilos y scripts de `content.xml`.
//!
//! Una tabla ODF se oculta por su estilo automático
//! (`style:table-properties/@table:display="false"`) o, en documentos más
//! antiguos, con `table:display` directamente sobre `table:table`.

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::BytesStart;

use crate::constants::ODF_CONTENT_PART;
use crate::error::Result;
use crate::paths;
use crate::sheets::{SheetEntry, SheetVisibility};
use crate::xml::{self, Action, AttrEdit, XmlRewrite, children_named, descendants_named, parse_element};

/// Tabla de la hoja de cálculo junto con el origen de su visibilidad.
#[derive(Clone, Debug)]
pub struct OdfTable {
    pub entry: SheetEntry,
    pub style_name: Option<String>,
    pub hidden_by_style: bool,
    pub hidden_by_attribute: bool,
    /// Rutas del paquete de los objetos e imágenes incrustados en la tabla
    /// (`draw:object`, `draw:image`), sin `./` inicial ni `/` final.
    pub objects: BTreeSet<String>,
}

/// Lee las tablas de `office:spreadsheet` en orden.
pub fn parse_tables(bytes: &[u8]) -> Result<Vec<OdfTable>> {
    let root = parse_element(ODF_CONTENT_PART, bytes)?;

    let mut table_display: BTreeMap<String, bool> = BTreeMap::new();
    for styles in children_named(&root, "automatic-styles") {
        for style in children_named(styles, "style") {
            if style.attributes.get("family").map(String::as_str) != Some("table") {
                continue;
            }
            let Some(name) = style.attributes.get("name") else {
                continue;
            };
            let display = children_named(style, "table-properties")
                .find_map(|props| props.attributes.get("display"))
                .is_none_or(|value| value != "false");
            table_display.insert(name.clone(), display);
        }
    }

    let Some(spreadsheet) = children_named(&root, "body")
        .flat_map(|body| children_named(body, "spreadsheet"))
        .next()
    else {
        return Ok(Vec::new());
    };

    let tables = children_named(spreadsheet, "table")
        .enumerate()
        .map(|(index, table)| {
            let name = table.attributes.get("name").cloned().unwrap_or_default();
            let style_name = table.attributes.get("style-name").cloned();
            let hidden_by_style = style_name
                .as_ref()
                .and_then(|style| table_display.get(style))
                .is_some_and(|display| !display);
            let hidden_by_attribute = table
                .attributes
                .get("display")
                .is_some_and(|value| value == "false");
            let objects = ["object", "image"]
                .into_iter()
                .flat_map(|kind| descendants_named(table, kind))
                .filter_map(|element| element.attributes.get("href"))
                .filter_map(|href| embedded_path(href))
                .collect();
            let visibility = if hidden_by_style || hidden_by_attribute {
                SheetVisibility::Hidden
            } else {
                SheetVisibility::Visible
            };

            OdfTable {
                entry: SheetEntry {
                    sheet_id: (index + 1).to_string(),
                    rel_id: name.clone(),
                    target: None,
                    visibility,
                    name,
                },
                style_name,
                hidden_by_style,
                hidden_by_attribute,
                objects,
            }
        })
        .collect();
    Ok(tables)
}

/// Ruta dentro del paquete de un `xlink:href`; `None` para enlaces externos.
fn embedded_path(href: &str) -> Option<String> {
    if href.contains(':') || href.starts_with('/') || href.starts_with("../") {
        return None;
    }
    let path = paths::normalize(href);
    let path = path.trim_end_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

/// Cambios pendientes sobre `content.xml` (o `styles.xml` para los scripts).
#[derive(Clone, Debug, Default)]
pub struct ContentEdit {
    pub removed_tables: BTreeSet<String>,
    /// Tabla que vuelve a mostrarse y el estilo que la ocultaba.
    pub unhide: Option<(String, Option<String>)>,
    /// Quita `office:script` y los `script:event-listener`.
    pub strip_scripts: bool,
}

impl ContentEdit {
    pub fn is_empty(&self) -> bool {
        self.removed_tables.is_empty() && self.unhide.is_none() && !self.strip_scripts
    }
}

/// Aplica `edit` a una parte XML de ODF. Devuelve `None` si nada cambió.
pub fn rewrite_content(part: &str, bytes: &[u8], edit: &ContentEdit) -> Result<Option<Vec<u8>>> {
    if edit.is_empty() {
        return Ok(None);
    }

    // Expresiones con nombre anclados a una tabla eliminada.
    let root = parse_element(part, bytes)?;
    let stale_ranges: BTreeSet<usize> = named_expressions(&root)
        .into_iter()
        .enumerate()
        .filter(|(_, address)| {
            edit.removed_tables
                .iter()
                .any(|table| address_names_table(address, table))
        })
        .map(|(index, _)| index)
        .collect();

    let mut rewriter = ContentRewriter {
        edit,
        stale_ranges,
        range_index: 0,
        in_unhidden_style: false,
    };
    let (updated, changed) = xml::rewrite_xml(part, bytes, &mut rewriter)?;
    Ok(changed.then_some(updated))
}

const NAMED_EXPRESSION_ELEMENTS: [&str; 2] = ["named-range", "named-expression"];

/// Direcciones de cada `table:named-range` y `table:named-expression`, en orden de documento.
fn named_expressions(root: &xmltree::Element) -> Vec<String> {
    let found: Vec<&xmltree::Element> = descendants_named(root, "named-expressions")
        .into_iter()
        .flat_map(|container| {
            container.children.iter().filter_map(|node| match node {
                xmltree::XMLNode::Element(child)
                    if NAMED_EXPRESSION_ELEMENTS.contains(&child.name.as_str()) =>
                {
                    Some(child)
                }
                _ => None,
            })
        })
        .collect();
    found
        .into_iter()
        .map(|element| {
            ["base-cell-address", "cell-range-address", "expression"]
                .iter()
                .filter_map(|attr| element.attributes.get(*attr))
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Las direcciones ODF nombran la tabla como `$Hoja.$A$1` o `$'Mi hoja'.$A$1`.
fn address_names_table(address: &str, table: &str) -> bool {
    let quoted = format!("'{}'.", table.replace('\'', "''"));
    let bare = format!("{table}.");
    [quoted, bare].iter().any(|pattern| {
        address.match_indices(pattern.as_str()).any(|(start, _)| {
            address[..start]
                .chars()
                .next_back()
                .is_none_or(|previous| matches!(previous, '$' | '[' | ' ' | ':' | ';' | '('))
        })
    })
}

struct ContentRewriter<'a> {
    edit: &'a ContentEdit,
    stale_ranges: BTreeSet<usize>,
    range_index: usize,
    in_unhidden_style: bool,
}

impl ContentRewriter<'_> {
    fn unhide_table(&self) -> Option<&str> {
        self.edit.unhide.as_ref().map(|(table, _)| table.as_str())
    }

    fn unhide_style(&self) -> Option<&str> {
        self.edit.unhide.as_ref().and_then(|(_, style)| style.as_deref())
    }
}

fn show(element: &BytesStart<'_>) -> Option<BytesStart<'static>> {
    xml::edit_attributes(element, |name, _| match name {
        "display" => AttrEdit::Set("true".to_string()),
        _ => AttrEdit::Keep,
    })
}

impl XmlRewrite for ContentRewriter<'_> {
    fn start(&mut self, path: &[String], element: &BytesStart<'_>) -> Result<Action> {
        let local = xml::local_name(element);
        let parent = path.last().map(String::as_str);

        let action = match (local.as_str(), parent) {
            ("table", Some("spreadsheet")) => {
                let name = xml::attr(element, "name").unwrap_or_default();
                if self.edit.removed_tables.contains(&name) {
                    return Ok(Action::Remove);
                }
                if self.unhide_table() == Some(name.as_str()) {
                    show(element)
                } else {
                    None
                }
            }
            ("style", _) => {
                self.in_unhidden_style = self.unhide_style().is_some()
                    && xml::attr(element, "name").as_deref() == self.unhide_style()
                    && xml::attr(element, "family").as_deref() == Some("table");
                None
            }
            ("table-properties", Some("style")) if self.in_unhidden_style => show(element),
            ("named-range" | "named-expression", Some("named-expressions")) => {
                let index = self.range_index;
                self.range_index += 1;
                if self.stale_ranges.contains(&index) {
                    return Ok(Action::Remove);
                }
                None
            }
            ("script", Some("scripts")) if self.edit.strip_scripts => return Ok(Action::Remove),
            ("event-listener", _)
                if self.edit.strip_scripts && xml::attr(element, "language").is_some() =>
            {
                return Ok(Action::Remove);
            }
            _ => None,
        };
        Ok(action.map_or(Action::Keep, Action::Replace))
    }

    fn end(&mut self, _path: &[String], local_name: &str) {
        if local_name == "style" {
            self.in_unhidden_style = false;
        }
    }
}
