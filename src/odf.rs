//! Partes propias de OpenDocument Spreadsheet.

pub mod content;
pub mod settings;
