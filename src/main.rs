// completion-cert: Sign, stamp and export work completion certificates

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use completion_cert::compositor::Tool;
use completion_cert::draft::{format_localized, DraftKey, DraftStore, FileStore};
use completion_cert::export::{CaptureExporter, ExportFormat, ExportOutcome, HostCapabilities};
use completion_cert::stamp::{self, StampProcessor};
use completion_cert::{CertError, DocumentForm, EditorConfig, ViewportSession};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Signature pad size in css pixels; stroke files use these coordinates.
const PAD_WIDTH: u32 = 480;
const PAD_HEIGHT: u32 = 240;

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Cert(#[from] CertError),
    #[error("Export failed: {0}")]
    ExportError(String),
    #[error("Failed to read stroke file: {0}")]
    StrokeError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Sign, stamp and export work completion certificates")]
struct Args {
    /// Editor configuration (JSON); defaults apply to missing fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a photographed stamp or signature into a transparent black mask
    Stamp {
        /// Image file path or URL
        input: String,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sign the certificate and export it
    Export {
        /// Form data (JSON)
        #[arg(long)]
        form: PathBuf,

        /// Pen strokes on the signature pad (JSON)
        #[arg(long)]
        strokes: Option<PathBuf>,

        /// Stamp image (file path or URL) placed on the signature pad
        #[arg(long)]
        stamp: Option<String>,

        #[arg(long, value_enum, default_value = "pdf")]
        format: OutputFormat,

        /// Hand the JPEG to the platform share sheet instead of saving
        #[arg(long)]
        share: bool,

        /// Directory to save into
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Date (YYYY-MM-DD format, defaults to today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Inspect or migrate stored drafts
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
}

#[derive(Subcommand, Debug)]
enum DraftAction {
    /// Print the draft a session would restore
    Show {
        #[command(flatten)]
        target: DraftTarget,
    },
    /// Upgrade a stored draft to the current version
    Migrate {
        #[command(flatten)]
        target: DraftTarget,
    },
}

#[derive(clap::Args, Debug)]
struct DraftTarget {
    /// Draft store file
    #[arg(long)]
    store: PathBuf,

    /// Site id; omit together with --work-log for the most recent draft
    #[arg(long, requires = "work_log")]
    site: Option<String>,

    #[arg(long, requires = "site")]
    work_log: Option<String>,
}

impl DraftTarget {
    fn key(&self) -> Option<DraftKey> {
        match (&self.site, &self.work_log) {
            (Some(site), Some(log)) => Some(DraftKey::new(site, log)),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pdf,
    Jpeg,
}

/// One recorded stroke on the signature pad
#[derive(Debug, Deserialize)]
struct StrokeInput {
    #[serde(default)]
    eraser: bool,
    /// `[x, y, pressure]` samples in pad css pixels
    points: Vec<[f32; 3]>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("completion_cert=info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    match args.command {
        Command::Stamp { input, output } => run_stamp(&config, &input, &output),
        Command::Export {
            form,
            strokes,
            stamp,
            format,
            share,
            out_dir,
            date,
        } => {
            let date = parse_date(&date)?;
            let format = match (share, format) {
                (true, _) => ExportFormat::Share,
                (false, OutputFormat::Pdf) => ExportFormat::Pdf,
                (false, OutputFormat::Jpeg) => ExportFormat::Jpeg,
            };
            let mut config = config;
            if let Some(dir) = out_dir {
                config.download_dir = dir;
            }
            run_export(config, &form, strokes.as_deref(), stamp.as_deref(), format, date)
        }
        Command::Draft { action } => run_draft(&config, action),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_stamp(config: &EditorConfig, input: &str, output: &Path) -> Result<(), AppError> {
    let image = stamp::load_image(input)?;
    let processor = StampProcessor::new(config.stamp_max_edge, config.stamp_threshold);
    let mask = processor.process(&image);
    mask.save(output).map_err(CertError::from)?;

    println!("✓ Generated: {}", output.display());
    println!("  Size: {}x{}", mask.width(), mask.height());
    Ok(())
}

fn run_export(
    config: EditorConfig,
    form_path: &Path,
    strokes_path: Option<&Path>,
    stamp_source: Option<&str>,
    format: ExportFormat,
    date: NaiveDate,
) -> Result<(), AppError> {
    let content = std::fs::read_to_string(form_path)?;
    let mut form: DocumentForm = serde_json::from_str(&content).map_err(CertError::from)?;
    if form.confirm_date_text.is_empty() {
        form.confirm_date_text = format_localized(date);
    }

    let strokes = load_strokes(strokes_path)?;
    let mut exporter = CaptureExporter::new(&config, HostCapabilities::default());
    let mut session = ViewportSession::new(config, None);
    session.document_mut().load_form(form);

    if stamp_source.is_some() || !strokes.is_empty() {
        session.open_signature_pad(PAD_WIDTH, PAD_HEIGHT);
        if let Some(source) = stamp_source {
            let image = stamp::load_image(source)?;
            session.import_stamp(&image)?;
            session.commit_placement();
        }
        if let Some(pad) = session.pad_mut() {
            for stroke in &strokes {
                draw_stroke(pad, stroke);
            }
        }
        if let Err(notice) = session.apply_signature() {
            warn!(message = %notice, "Signature not applied");
        }
    }

    match session.export(&mut exporter, format, date) {
        Ok(ExportOutcome::Saved(path)) => {
            println!("✓ Generated: {}", path.display());
        }
        Ok(ExportOutcome::Shared(name)) => {
            println!("✓ Shared: {}", name);
        }
        Ok(ExportOutcome::Cancelled) => {
            println!("Save cancelled");
        }
        Err(notice) => return Err(AppError::ExportError(notice.message)),
    }
    println!("  Date: {}", format_localized(date));
    Ok(())
}

fn run_draft(config: &EditorConfig, action: DraftAction) -> Result<(), AppError> {
    match action {
        DraftAction::Show { target } => {
            let mut drafts = DraftStore::from_config(FileStore::new(&target.store), config);
            match drafts.restore(target.key().as_ref())? {
                Some(record) => {
                    let json = serde_json::to_string_pretty(&record).map_err(CertError::from)?;
                    println!("{}", json);
                }
                None => println!("No draft found"),
            }
        }
        DraftAction::Migrate { target } => {
            let Some(key) = target.key() else {
                return Err(CertError::DraftError("--site and --work-log are required".into()).into());
            };
            let mut drafts = DraftStore::from_config(FileStore::new(&target.store), config);
            match drafts.load(&key)? {
                Some(record) => {
                    info!(key = %key.storage_key(), "Draft checked");
                    println!("✓ Draft {} is version {}", key.storage_key(), record.version);
                    println!("  Confirm date: {}", record.form.confirm_date_text);
                }
                None => println!("No draft found"),
            }
        }
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_date(date_str: &Option<String>) -> Result<NaiveDate, AppError> {
    match date_str {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| CertError::DateError(s.clone()).into()),
        None => Ok(Local::now().date_naive()),
    }
}

fn load_strokes(path: Option<&Path>) -> Result<Vec<StrokeInput>, AppError> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .map_err(|e| AppError::StrokeError(format!("{}: {}", p.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| AppError::StrokeError(format!("Invalid JSON: {}", e)))
        }
        None => Ok(Vec::new()),
    }
}

fn draw_stroke(pad: &mut completion_cert::SignatureCompositor, stroke: &StrokeInput) {
    let Some(([x, y, p], rest)) = stroke.points.split_first().map(|(f, r)| (*f, r)) else {
        return;
    };
    pad.set_tool(if stroke.eraser { Tool::Eraser } else { Tool::Pen });
    pad.pen_down(x, y, p);
    for [x, y, p] in rest {
        pad.pen_move(*x, *y, *p);
    }
    pad.pen_up();
}
