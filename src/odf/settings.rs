//! Estado de vista de `settings.xml`.
//!
//! Cada vista guarda un mapa `Tables` con una entrada por tabla y el nombre de
//! la tabla activa (`ActiveTable`). Ambos nombran tablas de `content.xml`.

use std::collections::BTreeSet;

use quick_xml::events::BytesStart;

use crate::error::Result;
use crate::xml::{self, Action, XmlRewrite};

/// Quita las entradas de tablas eliminadas y reubica la tabla activa en `fallback`.
pub fn rewrite_settings(
    part: &str,
    bytes: &[u8],
    removed_tables: &BTreeSet<String>,
    fallback: &str,
) -> Result<Option<Vec<u8>>> {
    if removed_tables.is_empty() {
        return Ok(None);
    }
    let mut rewriter = SettingsRewriter {
        removed_tables,
        fallback,
        tables_depth: None,
        in_active_table: false,
    };
    let (updated, changed) = xml::rewrite_xml(part, bytes, &mut rewriter)?;
    Ok(changed.then_some(updated))
}

struct SettingsRewriter<'a> {
    removed_tables: &'a BTreeSet<String>,
    fallback: &'a str,
    /// Profundidad del `config-item-map-named` llamado `Tables`.
    tables_depth: Option<usize>,
    in_active_table: bool,
}

impl XmlRewrite for SettingsRewriter<'_> {
    fn start(&mut self, path: &[String], element: &BytesStart<'_>) -> Result<Action> {
        let local = xml::local_name(element);
        let name = xml::attr(element, "name");

        match local.as_str() {
            "config-item-map-named" if name.as_deref() == Some("Tables") => {
                self.tables_depth = Some(path.len());
            }
            "config-item-map-entry"
                if self.tables_depth.is_some_and(|depth| path.len() == depth + 1)
                    && name.as_ref().is_some_and(|table| self.removed_tables.contains(table)) =>
            {
                return Ok(Action::Remove);
            }
            "config-item" => {
                self.in_active_table = name.as_deref() == Some("ActiveTable");
            }
            _ => {}
        }
        Ok(Action::Keep)
    }

    fn end(&mut self, path: &[String], local_name: &str) {
        match local_name {
            "config-item-map-named" if self.tables_depth == Some(path.len()) => {
                self.tables_depth = None;
            }
            "config-item" => self.in_active_table = false,
            _ => {}
        }
    }

    fn text(&mut self, _path: &[String], text: &str) -> Option<String> {
        (self.in_active_table && self.removed_tables.contains(text.trim()))
            .then(|| self.fallback.to_string())
    }
}
