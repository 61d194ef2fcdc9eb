//! Saneamiento de hojas de cálculo.
//!
//! Abre libros OOXML (`.xlsx`, `.xlsm`) y ODF (`.ods`), elimina las macros y
//! las hojas ocultas, repara todas las referencias cruzadas afectadas y vuelve
//! a empaquetar un contenedor válido. Los CSV se copian sin cambios.

pub mod archive;
pub mod batch;
pub mod classifier;
pub mod constants;
pub mod document;
pub mod error;
pub mod format;
pub mod graph;
pub mod hashing;
pub mod odf;
pub mod ooxml;
pub mod options;
pub mod paths;
pub mod pipeline;
pub mod repacker;
pub mod report;
pub mod sheets;
pub mod strip;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use archive::{Archive, ArchiveLimits, Part};
pub use document::Document;
pub use error::{ErrorCategory, SanitizeError};
pub use format::{ContainerFormat, Format, PartKind};
pub use graph::{Relationship, RelationshipGraph, RelationshipTable};
pub use options::SanitizeOptions;
pub use pipeline::{SanitizeOutcome, sanitize_bytes, sanitize_file};
pub use report::SanitizationReport;
pub use sheets::{SheetEntry, SheetVisibility};
pub use strip::MacroReference;
