use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use pdfview_convert::{
    detect_format, ChannelNotifier, ConversionJob, ConversionPipeline, ConversionQueue, Converter,
    DocumentContent, Format, JobStatus, ProcessLauncher,
};
use pdfview_core::DocumentProvider;
use pdfview_pdfium::PdfiumProvider;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

mod settings;
mod shell;

use settings::Settings;
use shell::{Shell, ShellCommand};

#[derive(Debug, Parser)]
#[command(
    name = "pdfview",
    version,
    about = "PDF viewer with office document conversion"
)]
struct Args {
    /// Configuration file (defaults to config.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the interactive viewer shell
    View {
        /// Document to open on start
        file: Option<PathBuf>,
    },
    /// Convert one document and exit
    Convert {
        source: PathBuf,
        output: PathBuf,
        /// Target format (word, excel, powerpoint, pdf); taken from the output extension otherwise
        #[arg(long)]
        to: Option<String>,
    },
    /// List supported conversions and whether their hosts are configured
    Formats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "pdfview", "pdfview")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Settings::default_path(&project_dirs));
    let settings = Settings::load(&config_path)?;
    info!(config = %config_path.display(), "settings loaded");

    match args.command {
        Commands::View { file } => view(settings, file).await,
        Commands::Convert { source, output, to } => convert(settings, source, output, to).await,
        Commands::Formats => formats(&settings),
    }
}

async fn view(settings: Settings, file: Option<PathBuf>) -> Result<()> {
    let provider: Arc<dyn DocumentProvider> = Arc::new(PdfiumProvider::new(&settings.viewer)?);
    let launcher = ProcessLauncher::from_config(&settings.conversion);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let queue = ConversionQueue::new(
        ConversionPipeline::new(Arc::new(launcher), settings.conversion),
        Arc::new(ChannelNotifier::new(notice_tx)),
        Handle::current(),
    );

    let mut shell = Shell::new(settings.viewer, provider, queue, io::stdout());
    if let Some(path) = file {
        shell
            .execute(ShellCommand::Open { path, output: None })
            .await?;
    }
    shell.run(spawn_line_reader(), notice_rx).await?;
    info!(title = %shell.viewer().window_title(), "viewer closed");
    Ok(())
}

/// Forward stdin lines to the shell from a plain thread; stdin reads block.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(?err, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

async fn convert(
    settings: Settings,
    source: PathBuf,
    output: PathBuf,
    to: Option<String>,
) -> Result<()> {
    let target_format = match to {
        Some(name) => {
            Format::from_name(&name).ok_or_else(|| anyhow!("unknown target format {:?}", name))?
        }
        None => detect_format(&output),
    };
    let mut job = ConversionJob::new(&source, output, target_format);
    let converter = Converter::select(job.source_format, target_format)?;
    let launcher = ProcessLauncher::from_config(&settings.conversion);

    if converter.needs_content() && launcher.is_configured(converter.host_kind()) {
        let provider = PdfiumProvider::new(&settings.viewer)?;
        let backend = provider.open(&source).await?;
        let content = DocumentContent::from_backend(backend.as_ref())
            .with_context(|| format!("failed to read {:?}", source))?;
        job = job.with_content(content);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = ConversionQueue::new(
        ConversionPipeline::new(Arc::new(launcher), settings.conversion),
        Arc::new(ChannelNotifier::new(tx)),
        Handle::current(),
    );
    let finished = queue.submit(job)?.wait().await?;
    if let Some(notification) = rx.recv().await {
        println!("{notification}");
    }
    match finished.status {
        JobStatus::Failed(err) => Err(err.into()),
        _ => Ok(()),
    }
}

fn formats(settings: &Settings) -> Result<()> {
    let launcher = ProcessLauncher::from_config(&settings.conversion);
    let mut stdout = io::stdout().lock();
    for converter in Converter::ALL {
        let (from, to) = converter.formats();
        let kind = converter.host_kind();
        let status = if launcher.is_configured(kind) {
            "configured"
        } else {
            "not configured"
        };
        writeln!(stdout, "{from} -> {to}\t{kind} ({status})")?;
    }
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pdfview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
