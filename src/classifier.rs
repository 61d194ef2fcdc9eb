//! Detección de la familia de la entrada a partir de su contenido.
//!
//! La extensión del archivo no participa: sólo cuentan los bytes mágicos y,
//! para contenedores ZIP, las partes características de cada familia.

use tracing::debug;

use crate::archive::Archive;
use crate::constants::{
    CONTENT_TYPES_PART, MACRO_TEMPLATE_CT, MACRO_WORKBOOK_CT, ODF_MIMETYPE_PART,
    ODF_SPREADSHEET_MIME, ODF_SPREADSHEET_TEMPLATE_MIME, OFFICE_DOCUMENT_REL, ROOT_RELS_PART,
    TEMPLATE_CT, WORKBOOK_CT,
};
use crate::error::{Result, SanitizeError};
use crate::format::Format;
use crate::graph::{ContentTypes, MANIFEST_PART};
use crate::paths;
use crate::xml::{children_named, parse_element};

/// Firma de Compound File Binary (`.xls`, `.doc`).
const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Bytes iniciales que se examinan para decidir si la entrada es texto.
const TEXT_SAMPLE: usize = 8192;

const WORKBOOK_CONTENT_TYPES: [&str; 4] =
    [WORKBOOK_CT, MACRO_WORKBOOK_CT, TEMPLATE_CT, MACRO_TEMPLATE_CT];

/// Resultado de la primera inspección de la entrada.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    /// Texto delimitado: se copia sin cambios.
    Csv,
    /// Contenedor ZIP pendiente de abrir.
    Zip,
}

/// Decide si la entrada es un ZIP o texto plano.
///
/// OLE2 se rechaza siempre. Otra firma reconocible (PDF, imágenes) sólo se
/// rechaza si los bytes no son texto: varias firmas tienen dos o tres bytes
/// (`BM`, `MZ`, `ID3`) y coinciden con CSV legítimos.
pub fn classify_bytes(bytes: &[u8]) -> Result<InputKind> {
    if infer::archive::is_zip(bytes) {
        return Ok(InputKind::Zip);
    }
    if bytes.starts_with(&OLE2_MAGIC) {
        return Err(SanitizeError::UnsupportedFormat(
            "libro binario OLE2 (.xls)".to_string(),
        ));
    }
    match infer::get(bytes) {
        Some(kind) if !looks_like_text(bytes) => Err(SanitizeError::UnsupportedFormat(format!(
            "contenido {} ({})",
            kind.mime_type(),
            kind.extension()
        ))),
        Some(kind) => {
            debug!(mime = kind.mime_type(), "firma binaria en texto válido; se trata como CSV");
            Ok(InputKind::Csv)
        }
        None => Ok(InputKind::Csv),
    }
}

/// UTF-8 válido y sin bytes NUL en la muestra inicial.
fn looks_like_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(TEXT_SAMPLE)];
    if sample.contains(&0) {
        return false;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        // Un carácter multibyte cortado al final de la muestra no cuenta.
        Err(error) => error.error_len().is_none() && sample.len() == TEXT_SAMPLE,
    }
}

/// Determina la familia de un contenedor ZIP ya abierto.
pub fn detect_container(archive: &Archive) -> Result<Format> {
    if let Some(content_types) = archive.get(CONTENT_TYPES_PART) {
        let content_types = ContentTypes::parse(content_types)?;
        let main_type = ooxml_main_part(archive)?
            .and_then(|part| content_types.content_type_of(&part).map(str::to_string));
        return match main_type {
            Some(ct) if WORKBOOK_CONTENT_TYPES.iter().any(|w| ct.eq_ignore_ascii_case(w)) => {
                debug!(content_type = %ct, "contenedor OOXML");
                Ok(Format::Ooxml)
            }
            Some(ct) => Err(SanitizeError::UnsupportedFormat(format!(
                "paquete OOXML que no es un libro (`{ct}`)"
            ))),
            None => Err(SanitizeError::UnsupportedFormat(
                "paquete OOXML sin parte principal declarada".to_string(),
            )),
        };
    }

    if let Some(mimetype) = archive.get(ODF_MIMETYPE_PART) {
        let mimetype = String::from_utf8_lossy(mimetype);
        let mimetype = mimetype.trim();
        if mimetype == ODF_SPREADSHEET_MIME || mimetype == ODF_SPREADSHEET_TEMPLATE_MIME {
            debug!(mimetype, "contenedor ODF");
            return Ok(Format::Odf);
        }
        return Err(SanitizeError::UnsupportedFormat(format!(
            "documento ODF de tipo `{mimetype}`"
        )));
    }

    if archive.contains(MANIFEST_PART) {
        debug!("contenedor ODF sin parte mimetype");
        return Ok(Format::Odf);
    }

    Err(SanitizeError::UnsupportedFormat(
        "ZIP sin [Content_Types].xml ni manifiesto ODF".to_string(),
    ))
}

/// Destino de la relación `officeDocument` de `_rels/.rels`.
fn ooxml_main_part(archive: &Archive) -> Result<Option<String>> {
    let Some(bytes) = archive.get(ROOT_RELS_PART) else {
        return Ok(None);
    };
    let root = parse_element(ROOT_RELS_PART, bytes)?;
    let target = children_named(&root, "Relationship")
        .filter(|rel| {
            !rel.attributes
                .get("TargetMode")
                .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
        })
        .find(|rel| {
            rel.attributes
                .get("Type")
                .is_some_and(|rel_type| rel_type.ends_with(OFFICE_DOCUMENT_REL))
        })
        .and_then(|rel| rel.attributes.get("Target"))
        .map(|target| paths::resolve_target("", target));
    Ok(target)
}
