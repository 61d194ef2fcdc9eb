//! Resumen de lo que se eliminó en una ejecución.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::ContainerFormat;

/// Resultado observable de un saneamiento. El motor lo produce pero nunca lo consulta.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizationReport {
    pub format: ContainerFormat,
    pub macros_removed: usize,
    pub hidden_sheets_removed: usize,
    pub visible_sheets: usize,
    /// Hoja oculta que se conservó visible para que el libro siga siendo válido.
    pub forced_visible: Option<String>,
    pub removed_sheets: Vec<String>,
    pub removed_parts: Vec<String>,
    pub input_sha256: String,
    pub output_sha256: String,
    pub sanitized_at: DateTime<Utc>,
}

impl SanitizationReport {
    pub fn new(format: ContainerFormat) -> Self {
        Self {
            format,
            macros_removed: 0,
            hidden_sheets_removed: 0,
            visible_sheets: 0,
            forced_visible: None,
            removed_sheets: Vec::new(),
            removed_parts: Vec::new(),
            input_sha256: String::new(),
            output_sha256: String::new(),
            sanitized_at: Utc::now(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.macros_removed == 0 && self.hidden_sheets_removed == 0 && self.removed_parts.is_empty()
    }

    pub(crate) fn record_removed_parts(&mut self, parts: impl IntoIterator<Item = String>) {
        for part in parts {
            if !self.removed_parts.contains(&part) {
                self.removed_parts.push(part);
            }
        }
    }

    /// Filas (etiqueta, valor, nivel) para la salida en terminal.
    pub fn entries(&self) -> Vec<ReportEntry> {
        let mut entries = vec![
            ReportEntry::info("Formato", self.format.label()),
            count_entry("Macros eliminadas", self.macros_removed),
            count_entry("Hojas ocultas eliminadas", self.hidden_sheets_removed),
            ReportEntry::info("Hojas visibles", self.visible_sheets.to_string()),
        ];
        if !self.removed_sheets.is_empty() {
            entries.push(ReportEntry::info(
                "Hojas quitadas",
                self.removed_sheets.join(", "),
            ));
        }
        if let Some(sheet) = &self.forced_visible {
            entries.push(ReportEntry::warning(
                "Hoja forzada a visible",
                format!("{sheet} (no quedaba ninguna hoja visible)"),
            ));
        }
        if !self.removed_parts.is_empty() {
            entries.push(ReportEntry::info(
                "Partes eliminadas",
                self.removed_parts.len().to_string(),
            ));
        }
        entries.push(ReportEntry::muted("SHA-256 entrada", &self.input_sha256));
        entries.push(ReportEntry::muted("SHA-256 salida", &self.output_sha256));
        entries
    }
}

fn count_entry(label: &str, count: usize) -> ReportEntry {
    if count == 0 {
        ReportEntry::info(label, "0")
    } else {
        ReportEntry::success(label, count.to_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntryLevel {
    Info,
    Warning,
    Success,
    Muted,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportEntry {
    pub label: String,
    pub value: String,
    pub level: EntryLevel,
}

impl ReportEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>, level: EntryLevel) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            level,
        }
    }

    pub fn info(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, EntryLevel::Info)
    }

    pub fn warning(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, EntryLevel::Warning)
    }

    pub fn success(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, EntryLevel::Success)
    }

    pub fn muted(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, EntryLevel::Muted)
    }
}
