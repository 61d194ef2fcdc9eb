//! Ejecución completa: clasificación, etapas de saneamiento y escritura.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::classifier::{InputKind, classify_bytes, detect_container};
use crate::document::Document;
use crate::error::{Result, SanitizeError};
use crate::format::ContainerFormat;
use crate::hashing::sha256_hex;
use crate::options::SanitizeOptions;
use crate::repacker;
use crate::report::SanitizationReport;
use crate::sheets::list_sheets;
use crate::strip::{find_macro_references, strip_hidden_sheets, strip_macros};

/// Bytes saneados junto con su informe.
#[derive(Clone, Debug)]
pub struct SanitizeOutcome {
    pub bytes: Vec<u8>,
    pub report: SanitizationReport,
}

/// Sanea un archivo completo en memoria.
pub fn sanitize_bytes(bytes: &[u8], options: &SanitizeOptions) -> Result<SanitizeOutcome> {
    let input_sha256 = sha256_hex(bytes);

    if classify_bytes(bytes)? == InputKind::Csv {
        debug!("entrada de texto delimitado; se copia sin cambios");
        let mut report = SanitizationReport::new(ContainerFormat::Csv);
        // Un CSV es una única hoja, siempre visible.
        report.visible_sheets = 1;
        report.output_sha256 = input_sha256.clone();
        report.input_sha256 = input_sha256;
        return Ok(SanitizeOutcome {
            bytes: bytes.to_vec(),
            report,
        });
    }

    let archive = Archive::from_bytes(bytes, options.limits())?;
    let format = detect_container(&archive)?;
    let mut doc = Document::open(format, archive)?;
    let mut report = SanitizationReport::new(format.container());
    report.input_sha256 = input_sha256;

    if options.remove_macros {
        doc = strip_macros(doc, &mut report)?;
    } else {
        let found = find_macro_references(&doc);
        if !found.is_empty() {
            warn!(parts = found.len(), "el documento contiene macros y se conservan");
        }
    }

    if options.remove_hidden_sheets {
        doc = strip_hidden_sheets(doc, &mut report)?;
    }

    report.visible_sheets = list_sheets(&doc)?
        .iter()
        .filter(|sheet| sheet.visibility.is_visible())
        .count();

    let output = repacker::repack(doc)?;
    repacker::verify(&output, options.limits())?;
    report.output_sha256 = sha256_hex(&output);

    info!(
        format = report.format.label(),
        macros = report.macros_removed,
        hidden_sheets = report.hidden_sheets_removed,
        visible_sheets = report.visible_sheets,
        "saneamiento completado"
    );
    Ok(SanitizeOutcome {
        bytes: output,
        report,
    })
}

/// Sanea `input` y escribe el resultado en `output`.
///
/// El resultado se escribe en un temporal junto al destino y se publica al
/// final. Sin `overwrite`, un destino existente nunca se reemplaza, aunque
/// aparezca durante el saneamiento. Ante cualquier error el temporal se
/// elimina y el destino queda como estaba.
pub fn sanitize_file(
    input: &Path,
    output: &Path,
    options: &SanitizeOptions,
) -> Result<SanitizationReport> {
    ensure_destination_allowed(output, options)?;

    let bytes = fs::read(input).map_err(|source| SanitizeError::ReadError {
        path: input.to_path_buf(),
        source,
    })?;
    let outcome = sanitize_bytes(&bytes, options)?;

    let temp_path = generate_temp_filename(output);
    if let Err(error) = write_new_file(&temp_path, &outcome.bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(SanitizeError::write_error(output, error));
    }

    publish(&temp_path, output, options.overwrite)?;

    info!(output = %output.display(), "resultado escrito");
    Ok(outcome.report)
}

fn ensure_destination_allowed(output: &Path, options: &SanitizeOptions) -> Result<()> {
    if !options.overwrite && output.exists() {
        return Err(SanitizeError::DestinationExists(output.to_path_buf()));
    }
    Ok(())
}

/// Mueve el temporal a `output`. Sin `overwrite` se crea un enlace duro, que
/// falla si el destino ya existe, y luego se borra el temporal.
fn publish(temp_path: &Path, output: &Path, overwrite: bool) -> Result<()> {
    if overwrite {
        return fs::rename(temp_path, output).map_err(|e| {
            let _ = fs::remove_file(temp_path);
            SanitizeError::write_error(output, format!("no se pudo mover el archivo temporal: {e}"))
        });
    }

    let linked = fs::hard_link(temp_path, output);
    let _ = fs::remove_file(temp_path);
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(SanitizeError::DestinationExists(output.to_path_buf()))
        }
        Err(e) => Err(SanitizeError::write_error(
            output,
            format!("no se pudo publicar el archivo temporal: {e}"),
        )),
    }
}

fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create_new(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Nombre temporal único en el mismo directorio que `path`.
fn generate_temp_filename(path: &Path) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let extension = path.extension().unwrap_or_default().to_string_lossy();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let sequence = COUNTER.fetch_add(1, Ordering::Relaxed);

    parent.join(format!(
        ".{stem}_temp_{timestamp}_{}_{sequence}.{extension}",
        process::id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_names_are_unique_and_hidden() {
        let first = generate_temp_filename(Path::new("salida/libro.xlsx"));
        let second = generate_temp_filename(Path::new("salida/libro.xlsx"));

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("salida")));
        let name = first.file_name().unwrap_or_default().to_string_lossy();
        assert!(name.starts_with(".libro_temp_"));
        assert!(name.ends_with(".xlsx"));
    }

    #[test]
    fn bare_file_name_uses_current_directory() {
        let temp = generate_temp_filename(Path::new("libro.ods"));
        assert_eq!(temp.parent(), Some(Path::new(".")));
    }

    #[test]
    fn destination_created_meanwhile_is_not_replaced() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("limpio.xlsx");
        let temp = generate_temp_filename(&output);
        write_new_file(&temp, b"saneado")?;
        fs::write(&output, b"ajeno")?;

        let error = publish(&temp, &output, false).unwrap_err();
        assert!(matches!(error, SanitizeError::DestinationExists(_)), "{error}");
        assert_eq!(fs::read(&output)?, b"ajeno");
        assert!(!temp.exists());
        Ok(())
    }

    #[test]
    fn new_destination_is_published_without_leftovers() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("limpio.xlsx");
        let temp = generate_temp_filename(&output);
        write_new_file(&temp, b"saneado")?;

        publish(&temp, &output, false)?;
        assert_eq!(fs::read(&output)?, b"saneado");
        assert!(!temp.exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn overwrite_replaces_through_rename() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("limpio.xlsx");
        fs::write(&output, b"previo")?;
        let temp = generate_temp_filename(&output);
        write_new_file(&temp, b"saneado")?;

        publish(&temp, &output, true)?;
        assert_eq!(fs::read(&output)?, b"saneado");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
