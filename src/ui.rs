use console::style;
use std::path::Path;

use sheetscrub::batch::BatchEvent;
use sheetscrub::report::{EntryLevel, SanitizationReport};
use sheetscrub::SanitizeError;

use crate::formatting::{format_size_change, format_timestamp, short_digest};

const LABEL_WIDTH: usize = 26;

/// `sizes` es el par (entrada, salida) en bytes, si pudo leerse.
pub fn render_report(report: &SanitizationReport, output: &Path, sizes: Option<(u64, u64)>) {
    println!("\n{}", style("┌─ SheetScrub · informe de saneamiento ─").green());
    println!(
        "{}",
        style(format!("│ Archivo: {}", output.display())).green().bold()
    );

    for entry in report.entries() {
        let value = if entry.label.starts_with("SHA-256") {
            short_digest(&entry.value)
        } else {
            entry.value.clone()
        };
        let label = format!("{:<width$}", entry.label, width = LABEL_WIDTH);
        let value = match entry.level {
            EntryLevel::Info => style(value).white(),
            EntryLevel::Success => style(value).green().bold(),
            EntryLevel::Warning => style(value).yellow().bold(),
            EntryLevel::Muted => style(value).dim(),
        };
        println!("{} {} {}", style("│").green(), style(label).cyan(), value);
    }

    if let Some((before, after)) = sizes {
        println!(
            "{} {} {}",
            style("│").green(),
            style(format!("{:<width$}", "Tamaño", width = LABEL_WIDTH)).cyan(),
            format_size_change(before, after)
        );
    }
    println!(
        "{} {} {}",
        style("│").green(),
        style(format!("{:<width$}", "Fecha", width = LABEL_WIDTH)).cyan(),
        style(format_timestamp(report.sanitized_at)).dim()
    );
    println!("{}\n", style("└─").green());
}

pub fn render_warning(message: &str) {
    println!("{}", style(format!("⚠ {message}")).yellow());
}

pub fn render_error(error: &SanitizeError) {
    eprintln!("\n{}", style("┌─ No se pudo sanear el archivo ─").red());
    eprintln!("{}", style(format!("│ {error}")).red());
    eprintln!("{}", style("└─").red());
}

pub fn render_batch_event(event: &BatchEvent) {
    match event {
        BatchEvent::Started { total } => {
            println!(
                "\n{}",
                style(format!("┌─ SheetScrub · lote de {total} archivo(s) ─")).cyan()
            );
        }
        BatchEvent::Processing { index, total, path } => {
            println!(
                "{} {}",
                style(format!("│ [{index}/{total}]")).dim(),
                path.display()
            );
        }
        BatchEvent::Success {
            macros_removed,
            hidden_sheets_removed,
            ..
        } => {
            println!(
                "{}",
                style(format!(
                    "│   ✓ macros: {macros_removed}, hojas ocultas: {hidden_sheets_removed}"
                ))
                .green()
            );
        }
        BatchEvent::Failure { path, error, .. } => {
            println!(
                "{}",
                style(format!("│   ✗ {}: {error}", path.display())).red()
            );
        }
        BatchEvent::Finished {
            successes,
            failures,
        } => {
            let summary = format!("└─ Completado: {successes} correctos, {failures} con error");
            if *failures == 0 {
                println!("{}\n", style(summary).green().bold());
            } else {
                println!("{}\n", style(summary).yellow().bold());
            }
        }
    }
}
