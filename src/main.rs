mod formatting;
mod ui;

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use sheetscrub::batch::{collect_candidate_files, run_batch_with_sender, worst_exit_code};
use sheetscrub::{SanitizationReport, SanitizeError, SanitizeOptions, sanitize_file};
use tracing_subscriber::EnvFilter;

/// Elimina macros y hojas ocultas de libros XLSX y ODS.
#[derive(Parser)]
#[command(
    name = "sheetscrub",
    version,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Libro de entrada.
    #[arg(required = true)]
    input: Option<PathBuf>,

    /// Ruta del libro saneado.
    #[arg(required = true)]
    output: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Sanea todas las hojas de cálculo de un directorio.
    Batch {
        /// Directorio de entrada.
        dir: PathBuf,

        /// Directorio donde se replican los archivos saneados.
        out_dir: PathBuf,

        /// Recorre también los subdirectorios.
        #[arg(long)]
        recursive: bool,

        /// Hilos de trabajo (por defecto, los núcleos disponibles).
        #[arg(long)]
        jobs: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Conserva las macros.
    #[arg(long)]
    keep_macros: bool,

    /// Conserva las hojas ocultas.
    #[arg(long)]
    keep_hidden_sheets: bool,

    /// Permite reemplazar un destino existente.
    #[arg(long)]
    overwrite: bool,

    /// Archivo JSON con opciones; los flags tienen prioridad.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Imprime el informe en JSON.
    #[arg(long)]
    json: bool,

    /// Aumenta el detalle del registro (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CommonArgs {
    fn options(&self) -> Result<SanitizeOptions, SanitizeError> {
        let mut options = match &self.config {
            Some(path) => SanitizeOptions::from_json_file(path)?,
            None => SanitizeOptions::default(),
        };
        if self.keep_macros {
            options.remove_macros = false;
        }
        if self.keep_hidden_sheets {
            options.remove_hidden_sheets = false;
        }
        if self.overwrite {
            options.overwrite = true;
        }
        Ok(options)
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sheetscrub={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match (cli.command, cli.input, cli.output) {
        (
            Some(Command::Batch {
                dir,
                out_dir,
                recursive,
                jobs,
                common,
            }),
            _,
            _,
        ) => {
            init_tracing(common.verbose);
            run_batch(&dir, &out_dir, recursive, jobs, &common)
        }
        (None, Some(input), Some(output)) => {
            init_tracing(cli.common.verbose);
            run_single(&input, &output, &cli.common)
        }
        _ => {
            eprintln!("Indica un archivo de entrada y uno de salida, o usa `batch`.");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            ui::render_error(&error);
            ExitCode::from(error.category().exit_code() as u8)
        }
    }
}

fn run_single(input: &Path, output: &Path, common: &CommonArgs) -> Result<ExitCode, SanitizeError> {
    let options = common.options()?;
    let report = sanitize_file(input, output, &options)?;

    if common.json {
        print_json(&report);
        return Ok(ExitCode::SUCCESS);
    }

    let sizes = fs::metadata(input)
        .and_then(|before| Ok((before.len(), fs::metadata(output)?.len())))
        .ok();
    ui::render_report(&report, output, sizes);
    if report.macros_removed > 0 && keeps_macro_extension(output) {
        ui::render_warning(
            "El libro ya no contiene macros pero conserva una extensión de macros; renómbralo a .xlsx/.xltx para que Excel lo abra sin avisos.",
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Con algún fallo, el código de salida es el de la categoría más grave vista.
fn run_batch(
    dir: &Path,
    out_dir: &Path,
    recursive: bool,
    jobs: Option<usize>,
    common: &CommonArgs,
) -> Result<ExitCode, SanitizeError> {
    let options = common.options()?;
    let files = collect_candidate_files(dir, recursive)?;
    let jobs = jobs.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let (sender, receiver) = mpsc::channel();
    let mut events = Vec::new();
    thread::scope(|scope| {
        scope.spawn(|| run_batch_with_sender(files, dir, out_dir, &options, jobs, sender));
        for event in receiver {
            if !common.json {
                ui::render_batch_event(&event);
            }
            events.push(event);
        }
    });

    if common.json {
        match serde_json::to_string_pretty(&events) {
            Ok(json) => println!("{json}"),
            Err(error) => eprintln!("No se pudo serializar el resultado: {error}"),
        }
    }
    Ok(match worst_exit_code(&events) {
        Some(code) => ExitCode::from(code as u8),
        None => ExitCode::SUCCESS,
    })
}

fn print_json(report: &SanitizationReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(error) => eprintln!("No se pudo serializar el informe: {error}"),
    }
}

fn keeps_macro_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsm") || ext.eq_ignore_ascii_case("xltm"))
}
