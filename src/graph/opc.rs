//! Tablas de relaciones OPC (`_rels/*.rels`).

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::archive::Archive;
use crate::constants::CONTENT_TYPES_PART;
use crate::error::{Result, SanitizeError};
use crate::paths;
use crate::xml::{self, Action, XmlRewrite, children_named, parse_element};

use super::content_types::ContentTypes;
use super::{Relationship, RelationshipGraph, RelationshipTable, TableFlavor};

const EMPTY_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\"></Relationships>";

/// Construye el grafo de un paquete OOXML y valida que no haya destinos colgantes.
pub(crate) fn build_opc_graph(archive: &Archive) -> Result<RelationshipGraph> {
    let content_types_bytes = archive.get(CONTENT_TYPES_PART).ok_or_else(|| {
        SanitizeError::malformed_part(CONTENT_TYPES_PART, "falta la declaración de tipos")
    })?;
    let content_types = ContentTypes::parse(content_types_bytes)?;

    let mut tables = BTreeMap::new();
    for name in archive.file_names() {
        let Some(owner) = paths::owner_of_rels(name) else {
            continue;
        };
        let owner = if owner.is_empty() {
            owner
        } else {
            match archive.resolve_name(&owner) {
                Some(real) => real.to_string(),
                None => {
                    return Err(SanitizeError::malformed_relationship(
                        name,
                        format!("la tabla pertenece a `{owner}`, que no existe"),
                    ));
                }
            }
        };

        let bytes = archive.get(name).unwrap_or_default();
        let table = parse_table(archive, name, &owner, bytes)?;
        debug!(part = name, entries = table.entries.len(), "tabla de relaciones cargada");
        tables.insert(owner, table);
    }

    let graph = RelationshipGraph::from_parts(tables, Some(content_types));
    graph.validate(archive)?;
    Ok(graph)
}

fn parse_table(
    archive: &Archive,
    storage: &str,
    owner: &str,
    bytes: &[u8],
) -> Result<RelationshipTable> {
    let root = parse_element(storage, bytes)?;
    let mut table = RelationshipTable::new(storage.to_string(), owner.to_string(), TableFlavor::Opc);
    let mut seen = BTreeSet::new();

    for node in children_named(&root, "Relationship") {
        let Some(id) = node.attributes.get("Id").cloned() else {
            return Err(SanitizeError::malformed_relationship(
                storage,
                "relación sin atributo Id",
            ));
        };
        if !seen.insert(id.clone()) {
            return Err(SanitizeError::malformed_relationship(
                storage,
                format!("identificador duplicado `{id}`"),
            ));
        }

        let rel_type = node.attributes.get("Type").cloned().unwrap_or_default();
        let raw_target = node.attributes.get("Target").cloned().unwrap_or_default();
        let external = node
            .attributes
            .get("TargetMode")
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));

        let target = if external {
            raw_target.clone()
        } else {
            let resolved = paths::resolve_target(owner, &raw_target);
            archive
                .resolve_name(&resolved)
                .map(str::to_string)
                .unwrap_or(resolved)
        };

        table.entries.push(Relationship {
            id,
            rel_type,
            target,
            raw_target,
            external,
        });
    }

    Ok(table)
}

/// Quita las relaciones eliminadas y agrega las nuevas antes del cierre de `Relationships`.
struct RelsRewriter<'a> {
    removed: &'a BTreeSet<String>,
    added: &'a [Relationship],
    element_name: Option<String>,
}

impl XmlRewrite for RelsRewriter<'_> {
    fn start(&mut self, _path: &[String], element: &BytesStart<'_>) -> Result<Action> {
        if xml::local_name(element) != "Relationship" {
            return Ok(Action::Keep);
        }
        if self.element_name.is_none() {
            self.element_name = Some(String::from_utf8_lossy(element.name().as_ref()).into_owned());
        }
        match xml::attr(element, "Id") {
            Some(id) if self.removed.contains(&id) => Ok(Action::Remove),
            _ => Ok(Action::Keep),
        }
    }

    fn closing(&mut self, path: &[String], local_name: &str) -> Vec<Event<'static>> {
        if path.len() != 1 || local_name != "Relationships" || self.added.is_empty() {
            return Vec::new();
        }
        let tag = self
            .element_name
            .clone()
            .unwrap_or_else(|| "Relationship".to_string());
        let mut events = Vec::with_capacity(self.added.len());
        for rel in self.added {
            let mut element = BytesStart::new(tag.clone());
            element.push_attribute(("Id", rel.id.as_str()));
            element.push_attribute(("Type", rel.rel_type.as_str()));
            element.push_attribute(("Target", rel.raw_target.as_str()));
            events.push(Event::Empty(element));
        }
        events
    }
}

pub(super) fn flush_table(table: &RelationshipTable, archive: &mut Archive) -> Result<()> {
    let current = match archive.get(&table.storage_part) {
        Some(bytes) => bytes.to_vec(),
        None => EMPTY_RELS.as_bytes().to_vec(),
    };

    let mut rewriter = RelsRewriter {
        removed: &table.removed,
        added: &table.added,
        element_name: None,
    };
    let (updated, changed) = xml::rewrite_xml(&table.storage_part, &current, &mut rewriter)?;
    if changed || !archive.contains(&table.storage_part) {
        archive.insert(table.storage_part.clone(), updated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ZipBuilder, default_limits, minimal_xlsx};

    #[test]
    fn builds_tables_for_every_rels_part() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let archive = Archive::from_bytes(&minimal_xlsx().finish(), default_limits())?;
        let graph = build_opc_graph(&archive)?;

        assert_eq!(graph.resolve("", "rId1"), Some("xl/workbook.xml"));
        assert_eq!(
            graph.resolve("xl/workbook.xml", "rId1"),
            Some("xl/worksheets/sheet1.xml")
        );
        assert_eq!(graph.referrers("xl/worksheets/sheet1.xml").len(), 1);
        Ok(())
    }

    #[test]
    fn dangling_target_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let bytes = minimal_xlsx()
            .without("xl/worksheets/sheet1.xml")
            .finish();
        let archive = Archive::from_bytes(&bytes, default_limits())?;
        let err = build_opc_graph(&archive).unwrap_err();
        assert!(
            matches!(err, SanitizeError::MalformedRelationship { ref part, .. } if part == "xl/_rels/workbook.xml.rels"),
            "{err}"
        );
        Ok(())
    }

    #[test]
    fn external_targets_are_not_checked() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/>
</Relationships>"#;
        let bytes = minimal_xlsx()
            .replacing("xl/_rels/workbook.xml.rels", rels.as_bytes())
            .finish();
        let archive = Archive::from_bytes(&bytes, default_limits())?;
        let graph = build_opc_graph(&archive)?;
        let table = graph.table("xl/workbook.xml").expect("tabla del libro");
        assert!(table.get("rId9").is_some_and(|rel| rel.external));
        Ok(())
    }

    #[test]
    fn flush_removes_and_appends_entries() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let bytes = ZipBuilder::new()
            .file(
                CONTENT_TYPES_PART,
                br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
            )
            .file(
                "_rels/.rels",
                br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t/a" Target="a.xml"/><Relationship Id="rId2" Type="t/b" Target="b.xml"/></Relationships>"#,
            )
            .file("a.xml", b"<a/>")
            .file("b.xml", b"<b/>")
            .finish();
        let mut archive = Archive::from_bytes(&bytes, default_limits())?;
        let mut graph = build_opc_graph(&archive)?;

        assert!(graph.remove_entry("", "rId1").is_some());
        graph.add_entry("", "rId3", "b.xml", "t/c")?;
        graph.flush(&mut archive)?;

        let rels = String::from_utf8(archive.get("_rels/.rels").unwrap_or_default().to_vec())?;
        assert!(!rels.contains("rId1"));
        assert!(rels.contains(r#"<Relationship Id="rId2" Type="t/b" Target="b.xml"/>"#));
        assert!(rels.contains(r#"<Relationship Id="rId3" Type="t/c" Target="/b.xml"/>"#));
        assert!(!graph.is_dirty());
        Ok(())
    }
}
