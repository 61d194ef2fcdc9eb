//! Documento abierto: contenedor, familia y grafo de referencias.
//!
//! Cada etapa recibe el documento por valor y lo devuelve transformado; si una
//! etapa falla el documento se descarta entero y nada llega a disco.

use tracing::debug;

use crate::archive::Archive;
use crate::constants::{CONTENT_TYPES_PART, ODF_MIMETYPE_PART};
use crate::error::Result;
use crate::format::{Format, PartKind};
use crate::graph::{MANIFEST_PART, RelationshipGraph};
use crate::paths;

#[derive(Debug)]
pub struct Document {
    pub format: Format,
    pub archive: Archive,
    pub graph: RelationshipGraph,
}

impl Document {
    /// Construye el grafo y valida que no haya referencias colgantes.
    pub fn open(format: Format, archive: Archive) -> Result<Self> {
        let graph = format.build_graph(&archive)?;
        Ok(Self {
            format,
            archive,
            graph,
        })
    }

    pub fn part_kind_of(&self, path: &str) -> PartKind {
        self.format.part_kind_of(path, &self.graph)
    }

    pub fn sheet_list_part(&self) -> Option<String> {
        self.format
            .sheet_list_part(&self.graph)
            .filter(|part| self.archive.contains(part))
    }

    /// Elimina una parte junto con toda referencia hacia ella.
    ///
    /// También desaparecen su tabla de relaciones y, en cascada, los destinos
    /// de esa tabla que ninguna otra parte siga referenciando. Devuelve los
    /// nombres de todas las partes eliminadas.
    pub fn remove_part(&mut self, name: &str) -> Vec<String> {
        let mut removed = Vec::new();
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            let Some(real) = self.archive.resolve_name(&current).map(str::to_string) else {
                continue;
            };
            if is_protected(&real) {
                continue;
            }

            self.archive.remove(&real);
            let references = self.graph.remove_all_referencing(&real);
            debug!(part = %real, references, "parte retirada");

            if let Some(table) = self.graph.drop_table(&real) {
                self.archive.remove(table.storage_part());
                for rel in table.entries() {
                    if rel.external || paths::same_part(&rel.target, &real) {
                        continue;
                    }
                    if self.graph.referrers(&rel.target).is_empty() {
                        pending.push(rel.target.clone());
                    }
                }
            }
            removed.push(real);
        }

        removed
    }
}

fn is_protected(part: &str) -> bool {
    [CONTENT_TYPES_PART, MANIFEST_PART, ODF_MIMETYPE_PART]
        .iter()
        .any(|protected| paths::same_part(part, protected))
        || paths::owner_of_rels(&paths::normalize(part)).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{default_limits, macro_xlsx};

    fn open_macro_xlsx() -> Result<Document> {
        let archive = Archive::from_bytes(&macro_xlsx().finish(), default_limits())?;
        Document::open(Format::Ooxml, archive)
    }

    #[test]
    fn removal_cascades_to_orphaned_targets() -> Result<()> {
        let mut doc = open_macro_xlsx()?;
        let removed = doc.remove_part("xl/worksheets/sheet2.xml");

        assert_eq!(removed, ["xl/worksheets/sheet2.xml", "xl/drawings/drawing1.xml"]);
        assert!(!doc.archive.contains("xl/worksheets/_rels/sheet2.xml.rels"));
        assert!(doc.graph.resolve("xl/workbook.xml", "rId2").is_none());
        assert_eq!(
            doc.graph.content_type_of("xl/drawings/drawing1.xml"),
            Some("application/xml")
        );

        doc.graph.flush(&mut doc.archive)?;
        doc.graph.validate(&doc.archive)?;
        Ok(())
    }

    #[test]
    fn shared_targets_survive() -> Result<()> {
        let mut doc = open_macro_xlsx()?;
        doc.graph
            .add_entry("xl/worksheets/sheet1.xml", "rId7", "xl/drawings/drawing1.xml", "t/drawing")?;

        let removed = doc.remove_part("xl/worksheets/sheet2.xml");
        assert_eq!(removed, ["xl/worksheets/sheet2.xml"]);
        assert!(doc.archive.contains("xl/drawings/drawing1.xml"));
        Ok(())
    }

    #[test]
    fn structural_parts_are_never_removed() -> Result<()> {
        let mut doc = open_macro_xlsx()?;
        assert!(doc.remove_part("[Content_Types].xml").is_empty());
        assert!(doc.remove_part("xl/_rels/workbook.xml.rels").is_empty());
        assert!(doc.remove_part("xl/missing.xml").is_empty());
        Ok(())
    }
}
