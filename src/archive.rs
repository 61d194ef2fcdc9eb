//! Modelo en memoria del contenedor ZIP y su reempaquetado.

use std::io::{Cursor, Read, Write};

use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{Result, SanitizeError};
use crate::paths;

/// Parámetros de escritura que se conservan de la entrada original.
#[derive(Clone, Copy, Debug)]
pub struct PartOptions {
    pub compression: CompressionMethod,
    pub last_modified: Option<DateTime>,
    pub unix_mode: Option<u32>,
}

impl Default for PartOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
            last_modified: None,
            unix_mode: None,
        }
    }
}

/// Una entrada del contenedor.
#[derive(Clone, Debug)]
pub struct Part {
    pub name: String,
    pub data: Vec<u8>,
    pub options: PartOptions,
    pub is_dir: bool,
    pub modified: bool,
}

/// Límites de inflado al cargar el contenedor.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

/// Contenedor abierto: partes en su orden original.
#[derive(Clone, Debug, Default)]
pub struct Archive {
    parts: Vec<Part>,
}

impl Archive {
    /// Abre un ZIP completo en memoria respetando los límites de tamaño.
    pub fn from_bytes(bytes: &[u8], limits: ArchiveLimits) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| SanitizeError::malformed_part("<zip>", e))?;

        let mut parts = Vec::with_capacity(zip.len());
        let mut total: u64 = 0;

        for i in 0..zip.len() {
            let file = zip
                .by_index(i)
                .map_err(|e| SanitizeError::malformed_part("<zip>", e))?;
            let name = file.name().to_string();

            let options = PartOptions {
                compression: file.compression(),
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
            };

            if file.is_dir() {
                parts.push(Part {
                    name,
                    data: Vec::new(),
                    options,
                    is_dir: true,
                    modified: false,
                });
                continue;
            }

            let mut data = Vec::new();
            file.take(limits.max_part_bytes + 1)
                .read_to_end(&mut data)
                .map_err(|e| SanitizeError::malformed_part(&name, e))?;
            if data.len() as u64 > limits.max_part_bytes {
                return Err(SanitizeError::malformed_part(
                    &name,
                    format!(
                        "supera el límite de {} bytes descomprimidos",
                        limits.max_part_bytes
                    ),
                ));
            }

            total += data.len() as u64;
            if total > limits.max_total_bytes {
                return Err(SanitizeError::malformed_part(
                    &name,
                    format!(
                        "el contenedor supera el límite total de {} bytes",
                        limits.max_total_bytes
                    ),
                ));
            }

            parts.push(Part {
                name,
                data,
                options,
                is_dir: false,
                modified: false,
            });
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Nombres de las partes con contenido, en orden.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|part| !part.is_dir)
            .map(|part| part.name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.parts
            .iter()
            .position(|part| part.name == name)
            .or_else(|| {
                self.parts
                    .iter()
                    .position(|part| paths::same_part(&part.name, name))
            })
    }

    /// Nombre real de la parte dentro del ZIP, tolerando diferencias de mayúsculas.
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.parts[i].name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Indica si existe alguna entrada bajo el directorio `prefix/`.
    pub fn contains_dir(&self, prefix: &str) -> bool {
        let prefix = paths::normalize(prefix);
        let prefix = prefix.trim_end_matches('/');
        self.parts.iter().any(|part| {
            let name = paths::normalize(&part.name);
            name.len() > prefix.len()
                && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
                && name.as_bytes()[prefix.len()] == b'/'
        })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.position(name).map(|i| self.parts[i].data.as_slice())
    }

    /// Sustituye el contenido de una parte existente y la marca como modificada.
    pub fn replace(&mut self, name: &str, data: Vec<u8>) -> bool {
        match self.position(name) {
            Some(i) => {
                let part = &mut self.parts[i];
                if part.data != data {
                    part.data = data;
                    part.modified = true;
                }
                true
            }
            None => false,
        }
    }

    /// Agrega una parte nueva al final del contenedor.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        if self.replace(&name, data.clone()) {
            return;
        }
        self.parts.push(Part {
            name,
            data,
            options: PartOptions::default(),
            is_dir: false,
            modified: true,
        });
    }

    /// Elimina una parte y devuelve su contenido.
    pub fn remove(&mut self, name: &str) -> Option<Part> {
        let index = self.position(name)?;
        debug!(part = %self.parts[index].name, "parte eliminada del contenedor");
        Some(self.parts.remove(index))
    }

    /// Elimina las entradas de directorio vacías bajo `prefix`.
    pub fn remove_dir_entries(&mut self, prefix: &str) -> usize {
        let before = self.parts.len();
        self.parts.retain(|part| {
            !(part.is_dir && paths::normalize(&part.name).starts_with(prefix))
        });
        before - self.parts.len()
    }

    pub fn modified_parts(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|part| part.modified)
            .map(|part| part.name.as_str())
    }

    /// Serializa el contenedor como un ZIP nuevo en el orden original.
    pub fn repack(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for part in &self.parts {
            let compression = match part.options.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = FileOptions::<'_, ()>::default().compression_method(compression);
            if let Some(mode) = part.options.unix_mode {
                options = options.unix_permissions(mode);
            }
            if let Some(time) = part.options.last_modified {
                options = options.last_modified_time(time);
            }

            if part.is_dir {
                writer
                    .add_directory(part.name.as_str(), options)
                    .map_err(|e| repack_error(&part.name, e))?;
                continue;
            }

            writer
                .start_file(part.name.as_str(), options)
                .map_err(|e| repack_error(&part.name, e))?;
            writer
                .write_all(&part.data)
                .map_err(|e| repack_error(&part.name, e))?;
        }

        let cursor = writer.finish().map_err(|e| repack_error("<zip>", e))?;
        Ok(cursor.into_inner())
    }
}

fn repack_error(part: &str, error: impl ToString) -> SanitizeError {
    SanitizeError::write_error(
        "<memoria>",
        format!("no se pudo escribir la parte `{part}`: {}", error.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ZipBuilder, default_limits};

    #[test]
    fn load_preserves_order_and_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = ZipBuilder::new()
            .stored("mimetype", b"application/vnd.oasis.opendocument.spreadsheet")
            .file("content.xml", b"<a/>")
            .dir("Basic/")
            .file("Basic/script-lc.xml", b"<b/>")
            .finish();

        let archive = Archive::from_bytes(&bytes, default_limits())?;
        let names: Vec<_> = archive.parts().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["mimetype", "content.xml", "Basic/", "Basic/script-lc.xml"]
        );
        assert_eq!(archive.get("content.xml"), Some(&b"<a/>"[..]));
        assert!(archive.contains_dir("Basic"));
        assert!(!archive.contains_dir("Scripts"));

        let repacked = Archive::from_bytes(&archive.repack()?, default_limits())?;
        assert_eq!(repacked.parts()[0].options.compression, CompressionMethod::Stored);
        assert_eq!(repacked.get("Basic/script-lc.xml"), Some(&b"<b/>"[..]));
        Ok(())
    }

    #[test]
    fn lookup_ignores_case() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = ZipBuilder::new().file("xl/vbaProject.bin", b"vba").finish();
        let mut archive = Archive::from_bytes(&bytes, default_limits())?;
        assert_eq!(archive.resolve_name("XL/VBAPROJECT.BIN"), Some("xl/vbaProject.bin"));
        assert!(archive.remove("/xl/vbaproject.bin").is_some());
        assert!(archive.is_empty());
        Ok(())
    }

    #[test]
    fn oversized_part_is_rejected() {
        let bytes = ZipBuilder::new().file("big.xml", &[b'x'; 64]).finish();
        let limits = ArchiveLimits {
            max_part_bytes: 16,
            max_total_bytes: 1024,
        };
        let err = Archive::from_bytes(&bytes, limits).unwrap_err();
        assert!(matches!(err, SanitizeError::MalformedPart { ref part, .. } if part == "big.xml"));
    }

    #[test]
    fn replace_marks_only_changed_parts() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = ZipBuilder::new()
            .file("a.xml", b"<a/>")
            .file("b.xml", b"<b/>")
            .finish();
        let mut archive = Archive::from_bytes(&bytes, default_limits())?;
        archive.replace("a.xml", b"<a/>".to_vec());
        archive.replace("b.xml", b"<b x=\"1\"/>".to_vec());
        assert_eq!(archive.modified_parts().collect::<Vec<_>>(), ["b.xml"]);
        Ok(())
    }
}
