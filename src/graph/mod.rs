//! Grafo de referencias cruzadas entre partes.
//!
//! Une en una sola estructura las tablas de relaciones OPC (`_rels/*.rels`),
//! las declaraciones de `[Content_Types].xml` y el manifiesto ODF
//! (`META-INF/manifest.xml`). Las mutaciones se guardan en memoria y solo se
//! serializan con [`RelationshipGraph::flush`].

mod content_types;
mod manifest;
mod opc;

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::archive::Archive;
use crate::error::{Result, SanitizeError};
use crate::paths;

pub use content_types::ContentTypes;
pub(crate) use manifest::{MANIFEST_PART, build_manifest_graph};
pub(crate) use opc::build_opc_graph;

/// Formato de la tabla en disco.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableFlavor {
    /// Tabla `_rels/*.rels` de Open Packaging Conventions.
    Opc,
    /// Entradas `manifest:file-entry` de ODF.
    OdfManifest,
}

/// Una referencia con identificador desde una parte hacia otra.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Destino normalizado al nombre real de la parte en el contenedor.
    pub target: String,
    /// Destino tal como figura en la tabla.
    pub raw_target: String,
    pub external: bool,
}

/// Tabla de relaciones de una parte dueña.
#[derive(Clone, Debug)]
pub struct RelationshipTable {
    /// Parte donde se almacena la tabla.
    pub(crate) storage_part: String,
    pub(crate) owner: String,
    pub(crate) flavor: TableFlavor,
    pub(crate) entries: Vec<Relationship>,
    pub(crate) removed: BTreeSet<String>,
    pub(crate) added: Vec<Relationship>,
}

impl RelationshipTable {
    pub(crate) fn new(storage_part: String, owner: String, flavor: TableFlavor) -> Self {
        Self {
            storage_part,
            owner,
            flavor,
            entries: Vec::new(),
            removed: BTreeSet::new(),
            added: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn storage_part(&self) -> &str {
        &self.storage_part
    }

    pub fn entries(&self) -> &[Relationship] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|rel| rel.id == id)
    }

    fn is_dirty(&self) -> bool {
        !self.removed.is_empty() || !self.added.is_empty()
    }

    fn remove(&mut self, id: &str) -> Option<Relationship> {
        let index = self.entries.iter().position(|rel| rel.id == id)?;
        let relationship = self.entries.remove(index);
        if let Some(added) = self.added.iter().position(|rel| rel.id == id) {
            self.added.remove(added);
        } else {
            self.removed.insert(relationship.id.clone());
        }
        Some(relationship)
    }
}

/// Grafo completo de un contenedor.
#[derive(Clone, Debug, Default)]
pub struct RelationshipGraph {
    tables: BTreeMap<String, RelationshipTable>,
    content_types: Option<ContentTypes>,
    /// Tablas cuyo almacenamiento debe desaparecer al serializar.
    dropped_storage: BTreeSet<String>,
}

impl RelationshipGraph {
    pub(crate) fn from_parts(
        tables: BTreeMap<String, RelationshipTable>,
        content_types: Option<ContentTypes>,
    ) -> Self {
        Self {
            tables,
            content_types,
            dropped_storage: BTreeSet::new(),
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = &RelationshipTable> {
        self.tables.values()
    }

    pub fn table(&self, owner: &str) -> Option<&RelationshipTable> {
        self.tables.get(owner)
    }

    pub fn content_types(&self) -> Option<&ContentTypes> {
        self.content_types.as_ref()
    }

    pub(crate) fn content_types_mut(&mut self) -> Option<&mut ContentTypes> {
        self.content_types.as_mut()
    }

    /// Registra una relación nueva desde `owner` hacia `target`.
    pub fn add_entry(&mut self, owner: &str, id: &str, target: &str, rel_type: &str) -> Result<()> {
        let flavor = if self.content_types.is_some() {
            TableFlavor::Opc
        } else {
            TableFlavor::OdfManifest
        };
        let table = self.tables.entry(owner.to_string()).or_insert_with(|| {
            let storage = match flavor {
                TableFlavor::Opc => paths::rels_for_part(owner),
                TableFlavor::OdfManifest => MANIFEST_PART.to_string(),
            };
            RelationshipTable::new(storage, owner.to_string(), flavor)
        });

        if table.get(id).is_some() {
            return Err(SanitizeError::malformed_relationship(
                table.storage_part.clone(),
                format!("el identificador `{id}` ya existe"),
            ));
        }

        let raw_target = match table.flavor {
            TableFlavor::Opc => paths::content_type_name(target),
            TableFlavor::OdfManifest => paths::normalize(target),
        };
        let relationship = Relationship {
            id: id.to_string(),
            rel_type: rel_type.to_string(),
            target: paths::normalize(target),
            raw_target,
            external: false,
        };
        table.removed.remove(id);
        table.entries.push(relationship.clone());
        table.added.push(relationship);
        Ok(())
    }

    /// Quita una relación concreta de la tabla de `owner`.
    pub fn remove_entry(&mut self, owner: &str, id: &str) -> Option<Relationship> {
        let removed = self.tables.get_mut(owner)?.remove(id);
        if let Some(rel) = &removed {
            debug!(owner, id, target = %rel.target, "relación eliminada");
        }
        removed
    }

    /// Borra toda entrada (relación, manifiesto o tipo de contenido) que apunte a `target`.
    /// Devuelve cuántas entradas se eliminaron.
    pub fn remove_all_referencing(&mut self, target: &str) -> usize {
        let mut removed = 0;
        for table in self.tables.values_mut() {
            let ids: Vec<String> = table
                .entries
                .iter()
                .filter(|rel| !rel.external && paths::same_part(&rel.target, target))
                .map(|rel| rel.id.clone())
                .collect();
            for id in ids {
                if table.remove(&id).is_some() {
                    debug!(owner = %table.owner, id = %id, target, "referencia eliminada");
                    removed += 1;
                }
            }
        }

        if let Some(content_types) = self.content_types.as_mut()
            && content_types.remove_override(target)
        {
            removed += 1;
        }

        removed
    }

    /// Destino de la relación `id` declarada por `owner`.
    pub fn resolve(&self, owner: &str, id: &str) -> Option<&str> {
        self.tables
            .get(owner)?
            .get(id)
            .map(|rel| rel.target.as_str())
    }

    /// Relaciones internas que apuntan a `target`, como pares (dueño, relación).
    pub fn referrers(&self, target: &str) -> Vec<(&str, &Relationship)> {
        self.tables
            .values()
            .flat_map(|table| {
                table
                    .entries
                    .iter()
                    .filter(|rel| !rel.external && paths::same_part(&rel.target, target))
                    .map(move |rel| (table.owner.as_str(), rel))
            })
            .collect()
    }

    /// Relaciones cuyo tipo termina en alguno de los sufijos dados.
    pub fn relationships_with_type_suffix<'a>(
        &'a self,
        suffixes: &'a [&'a str],
    ) -> impl Iterator<Item = (&'a str, &'a Relationship)> + 'a {
        self.tables.values().flat_map(move |table| {
            table
                .entries
                .iter()
                .filter(move |rel| suffixes.iter().any(|suffix| rel.rel_type.ends_with(suffix)))
                .map(move |rel| (table.owner.as_str(), rel))
        })
    }

    /// Tipo de contenido declarado para una parte.
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        match &self.content_types {
            Some(content_types) => content_types.content_type_of(part),
            None => self
                .tables
                .get(MANIFEST_PART)?
                .entries
                .iter()
                .find(|rel| paths::same_part(&rel.target, part))
                .map(|rel| rel.rel_type.as_str()),
        }
    }

    /// Olvida la tabla de `owner` (la parte dueña ya no existe). Devuelve la
    /// tabla retirada para que el llamador pueda seguir sus destinos.
    pub(crate) fn drop_table(&mut self, owner: &str) -> Option<RelationshipTable> {
        let table = self.tables.remove(owner)?;
        self.dropped_storage.insert(table.storage_part.clone());
        Some(table)
    }

    /// Comprueba que todo destino interno exista en el contenedor.
    pub fn validate(&self, archive: &Archive) -> Result<()> {
        for table in self.tables.values() {
            for rel in &table.entries {
                if rel.external || rel.target.ends_with('/') {
                    continue;
                }
                if !archive.contains(&rel.target) {
                    return Err(SanitizeError::malformed_relationship(
                        table.storage_part.clone(),
                        format!(
                            "la relación `{}` apunta a `{}`, que no existe",
                            rel.id, rel.raw_target
                        ),
                    ));
                }
            }
        }
        if let Some(content_types) = &self.content_types {
            content_types.validate(archive)?;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        !self.dropped_storage.is_empty()
            || self.tables.values().any(RelationshipTable::is_dirty)
            || self.content_types.as_ref().is_some_and(ContentTypes::is_dirty)
    }

    /// Escribe en el contenedor las tablas modificadas.
    pub fn flush(&mut self, archive: &mut Archive) -> Result<()> {
        for storage in std::mem::take(&mut self.dropped_storage) {
            let still_used = self.tables.values().any(|t| t.storage_part == storage);
            if !still_used {
                archive.remove(&storage);
            }
        }

        for table in self.tables.values_mut() {
            if !table.is_dirty() {
                continue;
            }
            match table.flavor {
                TableFlavor::Opc => opc::flush_table(table, archive)?,
                TableFlavor::OdfManifest => manifest::flush_manifest(table, archive)?,
            }
            table.removed.clear();
            table.added.clear();
        }

        if let Some(content_types) = self.content_types.as_mut()
            && content_types.is_dirty()
        {
            content_types.flush(archive)?;
        }
        Ok(())
    }
}
