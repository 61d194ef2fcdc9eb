//! Saneamiento masivo de directorios completos.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SanitizeError};
use crate::options::SanitizeOptions;
use crate::pipeline::sanitize_file;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xltx", "xltm", "ods", "ots", "csv"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BatchEvent {
    Started { total: usize },
    Processing { index: usize, total: usize, path: PathBuf },
    Success { path: PathBuf, macros_removed: usize, hidden_sheets_removed: usize },
    Failure { path: PathBuf, error: String, exit_code: i32 },
    Finished { successes: usize, failures: usize },
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Lista las hojas de cálculo bajo `root`, ordenadas por ruta.
pub fn collect_candidate_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(SanitizeError::ReadError {
            path: root.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "la ruta proporcionada no es un directorio",
            ),
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(root).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.map_err(|e| SanitizeError::ReadError {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: std::io::Error::other(e.to_string()),
        })?;
        if entry.file_type().is_file() && is_spreadsheet(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Ruta de salida que replica la posición relativa de `file` bajo `root`.
pub fn output_path_for(root: &Path, out_dir: &Path, file: &Path) -> PathBuf {
    match file.strip_prefix(root) {
        Ok(relative) => out_dir.join(relative),
        Err(_) => out_dir.join(file.file_name().unwrap_or_default()),
    }
}

/// Sanea cada archivo en `jobs` hilos y notifica el progreso por `sender`.
///
/// Un archivo que falla no detiene a los demás.
pub fn run_batch_with_sender(
    files: Vec<PathBuf>,
    root: &Path,
    out_dir: &Path,
    options: &SanitizeOptions,
    jobs: usize,
    sender: Sender<BatchEvent>,
) {
    let total = files.len();
    let _ = sender.send(BatchEvent::Started { total });

    let queue = Arc::new(Mutex::new(files.into_iter().enumerate()));
    let workers = jobs.clamp(1, total.max(1));
    let mut successes = 0;
    let mut failures = 0;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let sender = sender.clone();
                scope.spawn(move || {
                    let mut ok = 0;
                    let mut failed = 0;
                    loop {
                        let next = match queue.lock() {
                            Ok(mut queue) => queue.next(),
                            Err(_) => None,
                        };
                        let Some((index, path)) = next else {
                            break;
                        };

                        let _ = sender.send(BatchEvent::Processing {
                            index: index + 1,
                            total,
                            path: path.clone(),
                        });
                        match sanitize_one(&path, root, out_dir, options) {
                            Ok(event) => {
                                ok += 1;
                                let _ = sender.send(event);
                            }
                            Err(error) => {
                                failed += 1;
                                warn!(path = %path.display(), %error, "no se pudo sanear");
                                let _ = sender.send(BatchEvent::Failure {
                                    path,
                                    error: error.to_string(),
                                    exit_code: error.category().exit_code(),
                                });
                            }
                        }
                    }
                    (ok, failed)
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok((ok, failed)) => {
                    successes += ok;
                    failures += failed;
                }
                Err(_) => warn!("un hilo de trabajo terminó con pánico"),
            }
        }
    });

    let _ = sender.send(BatchEvent::Finished {
        successes,
        failures,
    });
}

/// Código de salida del peor fallo del lote, o `None` si no hubo ninguno.
pub fn worst_exit_code(events: &[BatchEvent]) -> Option<i32> {
    events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::Failure { exit_code, .. } => Some(*exit_code),
            _ => None,
        })
        .max()
}

fn sanitize_one(
    path: &Path,
    root: &Path,
    out_dir: &Path,
    options: &SanitizeOptions,
) -> Result<BatchEvent> {
    let output = output_path_for(root, out_dir, path);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| SanitizeError::write_error(parent, e))?;
    }
    debug!(input = %path.display(), output = %output.display(), "saneando");

    let report = sanitize_file(path, &output, options)?;
    Ok(BatchEvent::Success {
        path: path.to_path_buf(),
        macros_removed: report.macros_removed,
        hidden_sheets_removed: report.hidden_sheets_removed,
    })
}
