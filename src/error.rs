//! Errores del motor de saneamiento.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Categoría de un error según el momento en que aborta la ejecución.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// Entrada ilegible o en un formato no soportado.
    Input,
    /// Contenedor dañado o con referencias inconsistentes.
    Structural,
    /// Política del llamador (destino existente sin permiso de sobrescritura).
    Policy,
    /// Fallo al escribir el resultado.
    Write,
}

impl ErrorCategory {
    /// Código de salida sugerido para la CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Input => 2,
            ErrorCategory::Structural => 3,
            ErrorCategory::Policy => 4,
            ErrorCategory::Write => 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("No se pudo leer `{}`: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Formato no soportado: {0}")]
    UnsupportedFormat(String),

    #[error("Relación inválida en `{part}`: {detail}")]
    MalformedRelationship { part: String, detail: String },

    #[error("Parte dañada `{part}`: {detail}")]
    MalformedPart { part: String, detail: String },

    #[error("El destino `{}` ya existe. Usa --overwrite para reemplazarlo.", .0.display())]
    DestinationExists(PathBuf),

    #[error("No se pudo escribir `{}`: {detail}", path.display())]
    WriteError { path: PathBuf, detail: String },
}

impl SanitizeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SanitizeError::ReadError { .. } | SanitizeError::UnsupportedFormat(_) => {
                ErrorCategory::Input
            }
            SanitizeError::MalformedRelationship { .. } | SanitizeError::MalformedPart { .. } => {
                ErrorCategory::Structural
            }
            SanitizeError::DestinationExists(_) => ErrorCategory::Policy,
            SanitizeError::WriteError { .. } => ErrorCategory::Write,
        }
    }

    pub(crate) fn malformed_part(part: impl Into<String>, detail: impl ToString) -> Self {
        SanitizeError::MalformedPart {
            part: part.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn malformed_relationship(part: impl Into<String>, detail: impl ToString) -> Self {
        SanitizeError::MalformedRelationship {
            part: part.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn write_error(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        SanitizeError::WriteError {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}

pub type Result<T, E = SanitizeError> = std::result::Result<T, E>;
