//! Serialización final del documento y verificación del resultado.

use tracing::{debug, info};

use crate::archive::{Archive, ArchiveLimits};
use crate::classifier::detect_container;
use crate::document::Document;
use crate::error::{Result, SanitizeError};

/// Vuelca el grafo en el contenedor y lo empaqueta de nuevo.
///
/// Las partes no modificadas se escriben con los mismos bytes que tenían.
pub fn repack(mut doc: Document) -> Result<Vec<u8>> {
    if doc.graph.is_dirty() {
        doc.graph.flush(&mut doc.archive)?;
    }
    debug!(modified = doc.archive.modified_parts().count(), "reempaquetando");
    doc.archive.repack()
}

/// Reabre el resultado y comprueba que su grafo no tenga referencias colgantes.
pub fn verify(bytes: &[u8], limits: ArchiveLimits) -> Result<()> {
    let archive = Archive::from_bytes(bytes, limits).map_err(verification_error)?;
    let format = detect_container(&archive).map_err(verification_error)?;
    format.build_graph(&archive).map_err(verification_error)?;
    info!(format = format.container().label(), parts = archive.len(), "resultado verificado");
    Ok(())
}

fn verification_error(error: SanitizeError) -> SanitizeError {
    SanitizeError::write_error("<memoria>", format!("el resultado no supera la verificación: {error}"))
}
