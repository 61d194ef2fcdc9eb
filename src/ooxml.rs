//! Partes propias de SpreadsheetML.

pub mod app_properties;
pub mod workbook;
