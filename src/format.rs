//! Familias de contenedor y clasificación de partes.
//!
//! OOXML y ODF comparten el mismo contrato (grafo de referencias, tipo de
//! parte y parte con la lista de hojas); [`Format`] despacha a las funciones
//! propias de cada familia.

use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::constants::{
    CONTENT_TYPES_PART, DEFAULT_VBA_PROJECT_PART, MACRO_CONTENT_TYPES, MACRO_REL_SUFFIXES,
    ODF_CONTENT_PART, ODF_MACRO_DIRS, ODF_MIMETYPE_PART, OFFICE_DOCUMENT_REL,
};
use crate::error::Result;
use crate::graph::{MANIFEST_PART, RelationshipGraph, build_manifest_graph, build_opc_graph};
use crate::paths;

/// Familia detectada para la entrada completa.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContainerFormat {
    Csv,
    Ooxml,
    Odf,
}

impl ContainerFormat {
    pub fn label(self) -> &'static str {
        match self {
            ContainerFormat::Csv => "CSV",
            ContainerFormat::Ooxml => "OOXML",
            ContainerFormat::Odf => "ODF",
        }
    }
}

/// Papel de una parte dentro del contenedor. Se deriva bajo demanda.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PartKind {
    Manifest,
    ContentTypes,
    Relationships,
    WorkbookDefinition,
    SheetData,
    MacroStorage,
    Other,
}

/// Familia de un contenedor ZIP ya abierto.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Ooxml,
    Odf,
}

impl Format {
    pub fn container(self) -> ContainerFormat {
        match self {
            Format::Ooxml => ContainerFormat::Ooxml,
            Format::Odf => ContainerFormat::Odf,
        }
    }

    /// Lee todas las tablas de referencias del contenedor.
    pub fn build_graph(self, archive: &Archive) -> Result<RelationshipGraph> {
        match self {
            Format::Ooxml => build_opc_graph(archive),
            Format::Odf => build_manifest_graph(archive),
        }
    }

    /// Parte que contiene la lista ordenada de hojas.
    pub fn sheet_list_part(self, graph: &RelationshipGraph) -> Option<String> {
        match self {
            Format::Ooxml => graph
                .table("")?
                .entries()
                .iter()
                .find(|rel| !rel.external && rel.rel_type.ends_with(OFFICE_DOCUMENT_REL))
                .map(|rel| rel.target.clone()),
            Format::Odf => Some(ODF_CONTENT_PART.to_string()),
        }
    }

    pub fn part_kind_of(self, path: &str, graph: &RelationshipGraph) -> PartKind {
        match self {
            Format::Ooxml => ooxml_part_kind(path, graph),
            Format::Odf => odf_part_kind(path),
        }
    }
}

fn ooxml_part_kind(path: &str, graph: &RelationshipGraph) -> PartKind {
    if paths::same_part(path, CONTENT_TYPES_PART) {
        return PartKind::ContentTypes;
    }
    if paths::owner_of_rels(&paths::normalize(path)).is_some() {
        return PartKind::Relationships;
    }
    if is_ooxml_macro_part(path, graph) {
        return PartKind::MacroStorage;
    }
    if Format::Ooxml
        .sheet_list_part(graph)
        .is_some_and(|workbook| paths::same_part(&workbook, path))
    {
        return PartKind::WorkbookDefinition;
    }

    let is_sheet = graph.referrers(path).iter().any(|(_, rel)| {
        ["/worksheet", "/chartsheet", "/dialogsheet"]
            .iter()
            .any(|suffix| rel.rel_type.ends_with(suffix))
    });
    if is_sheet {
        PartKind::SheetData
    } else {
        PartKind::Other
    }
}

pub(crate) fn is_ooxml_macro_part(path: &str, graph: &RelationshipGraph) -> bool {
    if paths::same_part(path, DEFAULT_VBA_PROJECT_PART) {
        return true;
    }
    if graph.content_type_of(path).is_some_and(|ct| {
        MACRO_CONTENT_TYPES
            .iter()
            .any(|macro_ct| ct.eq_ignore_ascii_case(macro_ct))
    }) {
        return true;
    }
    graph.referrers(path).iter().any(|(_, rel)| {
        MACRO_REL_SUFFIXES
            .iter()
            .any(|suffix| rel.rel_type.ends_with(suffix))
    })
}

fn odf_part_kind(path: &str) -> PartKind {
    let normalized = paths::normalize(path);
    if normalized == ODF_MIMETYPE_PART || normalized == MANIFEST_PART {
        return PartKind::Manifest;
    }
    if normalized == ODF_CONTENT_PART {
        return PartKind::WorkbookDefinition;
    }
    if is_odf_macro_part(&normalized) {
        return PartKind::MacroStorage;
    }
    PartKind::Other
}

pub(crate) fn is_odf_macro_part(path: &str) -> bool {
    ODF_MACRO_DIRS.iter().any(|dir| path.starts_with(dir))
}
