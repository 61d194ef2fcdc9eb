//! Manifiesto ODF (`META-INF/manifest.xml`).

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::archive::Archive;
use crate::error::{Result, SanitizeError};
use crate::paths;
use crate::xml::{self, Action, XmlRewrite, children_named, parse_element};

use super::{Relationship, RelationshipGraph, RelationshipTable, TableFlavor};

pub(crate) const MANIFEST_PART: &str = "META-INF/manifest.xml";

/// Construye el grafo de un paquete ODF. Un paquete sin manifiesto produce un grafo vacío.
pub(crate) fn build_manifest_graph(archive: &Archive) -> Result<RelationshipGraph> {
    let mut tables = BTreeMap::new();

    if let Some(bytes) = archive.get(MANIFEST_PART) {
        let root = parse_element(MANIFEST_PART, bytes)?;
        let mut table = RelationshipTable::new(
            MANIFEST_PART.to_string(),
            MANIFEST_PART.to_string(),
            TableFlavor::OdfManifest,
        );
        let mut seen = BTreeSet::new();

        for entry in children_named(&root, "file-entry") {
            let Some(full_path) = entry.attributes.get("full-path").cloned() else {
                return Err(SanitizeError::malformed_relationship(
                    MANIFEST_PART,
                    "entrada sin manifest:full-path",
                ));
            };
            // La entrada "/" describe el documento completo.
            if full_path == "/" {
                continue;
            }
            if !seen.insert(full_path.clone()) {
                return Err(SanitizeError::malformed_relationship(
                    MANIFEST_PART,
                    format!("entrada duplicada `{full_path}`"),
                ));
            }

            let normalized = paths::normalize(&full_path);
            let target = archive
                .resolve_name(&normalized)
                .map(str::to_string)
                .unwrap_or(normalized);
            table.entries.push(Relationship {
                id: full_path.clone(),
                rel_type: entry.attributes.get("media-type").cloned().unwrap_or_default(),
                target,
                raw_target: full_path,
                external: false,
            });
        }

        debug!(entries = table.entries.len(), "manifiesto ODF cargado");
        tables.insert(MANIFEST_PART.to_string(), table);
    }

    let graph = RelationshipGraph::from_parts(tables, None);
    graph.validate(archive)?;
    Ok(graph)
}

struct ManifestRewriter<'a> {
    removed: &'a BTreeSet<String>,
    added: &'a [Relationship],
    prefix: Option<String>,
}

impl ManifestRewriter<'_> {
    fn qualified(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }
}

impl XmlRewrite for ManifestRewriter<'_> {
    fn start(&mut self, path: &[String], element: &BytesStart<'_>) -> Result<Action> {
        if path.is_empty() {
            let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
            self.prefix = name.split_once(':').map(|(prefix, _)| prefix.to_string());
            return Ok(Action::Keep);
        }
        if xml::local_name(element) != "file-entry" {
            return Ok(Action::Keep);
        }
        match xml::attr(element, "full-path") {
            Some(full_path) if self.removed.contains(&full_path) => Ok(Action::Remove),
            _ => Ok(Action::Keep),
        }
    }

    fn closing(&mut self, path: &[String], local_name: &str) -> Vec<Event<'static>> {
        if path.len() != 1 || local_name != "manifest" {
            return Vec::new();
        }
        self.added
            .iter()
            .map(|entry| {
                let mut element = BytesStart::new(self.qualified("file-entry"));
                element.push_attribute((self.qualified("full-path").as_str(), entry.raw_target.as_str()));
                element.push_attribute((self.qualified("media-type").as_str(), entry.rel_type.as_str()));
                Event::Empty(element)
            })
            .collect()
    }
}

pub(super) fn flush_manifest(table: &RelationshipTable, archive: &mut Archive) -> Result<()> {
    let Some(current) = archive.get(&table.storage_part).map(<[u8]>::to_vec) else {
        return Err(SanitizeError::malformed_part(
            table.storage_part.clone(),
            "el manifiesto desapareció",
        ));
    };
    let mut rewriter = ManifestRewriter {
        removed: &table.removed,
        added: &table.added,
        prefix: None,
    };
    let (updated, changed) = xml::rewrite_xml(&table.storage_part, &current, &mut rewriter)?;
    if changed {
        archive.replace(&table.storage_part, updated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{default_limits, minimal_ods};

    #[test]
    fn manifest_entries_become_relationships() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let archive = Archive::from_bytes(&minimal_ods().finish(), default_limits())?;
        let graph = build_manifest_graph(&archive)?;

        assert_eq!(graph.resolve(MANIFEST_PART, "content.xml"), Some("content.xml"));
        assert_eq!(graph.resolve(MANIFEST_PART, "/"), None);
        assert_eq!(graph.content_type_of("content.xml"), Some("text/xml"));
        Ok(())
    }

    #[test]
    fn missing_manifest_target_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let bytes = minimal_ods().without("styles.xml").finish();
        let archive = Archive::from_bytes(&bytes, default_limits())?;
        let err = build_manifest_graph(&archive).unwrap_err();
        assert!(matches!(err, SanitizeError::MalformedRelationship { .. }), "{err}");
        Ok(())
    }

    #[test]
    fn flush_drops_removed_entries() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut archive = Archive::from_bytes(&minimal_ods().finish(), default_limits())?;
        let mut graph = build_manifest_graph(&archive)?;

        assert_eq!(graph.remove_all_referencing("styles.xml"), 1);
        graph.add_entry(MANIFEST_PART, "Thumbnails/", "Thumbnails/", "")?;
        graph.flush(&mut archive)?;

        let xml = String::from_utf8(archive.get(MANIFEST_PART).unwrap_or_default().to_vec())?;
        assert!(!xml.contains("styles.xml"));
        assert!(xml.contains(r#"<manifest:file-entry manifest:full-path="content.xml""#));
        assert!(xml.contains(
            r#"<manifest:file-entry manifest:full-path="Thumbnails/" manifest:media-type=""/>"#
        ));
        Ok(())
    }
}
