//! Opciones que el llamador entrega al motor.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveLimits;
use crate::error::{Result, SanitizeError};

const MIB: u64 = 1024 * 1024;

/// Comportamiento seleccionable de una ejecución.
///
/// Los campos ausentes en un archivo de configuración toman el valor por defecto.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SanitizeOptions {
    pub remove_macros: bool,
    pub remove_hidden_sheets: bool,
    pub overwrite: bool,
    /// Tamaño inflado máximo de una parte.
    pub max_part_bytes: u64,
    /// Tamaño inflado máximo del contenedor completo.
    pub max_total_bytes: u64,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            remove_macros: true,
            remove_hidden_sheets: true,
            overwrite: false,
            max_part_bytes: 256 * MIB,
            max_total_bytes: 512 * MIB,
        }
    }
}

impl SanitizeOptions {
    /// Carga opciones desde un JSON.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| SanitizeError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            SanitizeError::malformed_part(path.display().to_string(), format!("configuración inválida: {e}"))
        })
    }

    pub fn limits(&self) -> ArchiveLimits {
        ArchiveLimits {
            max_part_bytes: self.max_part_bytes,
            max_total_bytes: self.max_total_bytes,
        }
    }
}
