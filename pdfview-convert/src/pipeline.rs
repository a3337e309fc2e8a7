use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::format::Format;
use crate::host::{
    AutomationHost, ExcelHost, HostKind, HostLauncher, Interrupt, PowerPointHost, SaveFormat,
    WordHost,
};
use crate::job::{ConversionJob, JobStatus};

/// Cancellation hook for a running job. The pipeline checks it between host
/// steps and interrupts the host when a step is blocked; whatever was
/// acquired so far is closed and released on the way out.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<CancelState>);

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    hooks: Mutex<Vec<Interrupt>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if self.0.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks = std::mem::take(&mut *self.0.hooks.lock());
        for hook in hooks {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Run `hook` on cancellation, or right away if already cancelled.
    pub fn on_cancel(&self, hook: Interrupt) {
        {
            let mut hooks = self.0.hooks.lock();
            if !self.is_cancelled() {
                hooks.push(hook);
                return;
            }
        }
        hook();
    }

    fn check(&self) -> Result<(), ConvertError> {
        if self.is_cancelled() {
            Err(ConvertError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Conversion strategy for one (source, target) format pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    PdfToWord,
    PdfToExcel,
    PdfToPowerPoint,
    PowerPointToPdf,
}

impl Converter {
    pub const ALL: [Converter; 4] = [
        Converter::PdfToWord,
        Converter::PdfToExcel,
        Converter::PdfToPowerPoint,
        Converter::PowerPointToPdf,
    ];

    /// Source and target format handled by this converter.
    pub fn formats(self) -> (Format, Format) {
        match self {
            Converter::PdfToWord => (Format::Pdf, Format::Word),
            Converter::PdfToExcel => (Format::Pdf, Format::Excel),
            Converter::PdfToPowerPoint => (Format::Pdf, Format::PowerPoint),
            Converter::PowerPointToPdf => (Format::PowerPoint, Format::Pdf),
        }
    }

    /// Whether the target is filled from the extracted text of the source.
    pub fn needs_content(self) -> bool {
        matches!(self, Converter::PdfToExcel | Converter::PdfToPowerPoint)
    }

    /// Word and Excel to PDF are recognised but not implemented; they are
    /// reported as unsupported like any other pair.
    pub fn select(from: Format, to: Format) -> Result<Self, ConvertError> {
        match (from, to) {
            (Format::Pdf, Format::Word) => Ok(Converter::PdfToWord),
            (Format::Pdf, Format::Excel) => Ok(Converter::PdfToExcel),
            (Format::Pdf, Format::PowerPoint) => Ok(Converter::PdfToPowerPoint),
            (Format::PowerPoint, Format::Pdf) => Ok(Converter::PowerPointToPdf),
            _ => Err(ConvertError::Unsupported { from, to }),
        }
    }

    pub fn host_kind(self) -> HostKind {
        match self {
            Converter::PdfToWord => HostKind::Word,
            Converter::PdfToExcel => HostKind::Excel,
            Converter::PdfToPowerPoint | Converter::PowerPointToPdf => HostKind::PowerPoint,
        }
    }
}

pub struct ConversionPipeline {
    launcher: Arc<dyn HostLauncher>,
    config: ConversionConfig,
    /// Disconnects once a launch that outlived its acquisition timeout has
    /// released its host. Awaited before the next launch so two hosts never
    /// run at once.
    late_launch: Mutex<Option<Receiver<()>>>,
}

impl ConversionPipeline {
    pub fn new(launcher: Arc<dyn HostLauncher>, config: ConversionConfig) -> Self {
        Self {
            launcher,
            config,
            late_launch: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Drive `job` to a terminal state and return its target path on success.
    /// Blocks for as long as the automation host takes.
    #[instrument(skip_all, fields(job = %job.id, from = %job.source_format, to = %job.target_format))]
    pub fn run(&self, job: &mut ConversionJob, cancel: &CancelToken) -> Result<PathBuf, ConvertError> {
        job.status = JobStatus::Running;
        let result = Converter::select(job.source_format, job.target_format).and_then(|converter| {
            self.execute(converter, &*job, cancel).map_err(|err| {
                // an interrupted host reports whatever step it was in
                if cancel.is_cancelled() && err != ConvertError::Cancelled {
                    debug!(%err, "host step failed after cancellation");
                    ConvertError::Cancelled
                } else {
                    err
                }
            })
        });
        match &result {
            Ok(target) => {
                info!(target = %target.display(), "conversion succeeded");
                job.status = JobStatus::Succeeded;
            }
            Err(err) => {
                warn!(%err, "conversion failed");
                job.status = JobStatus::Failed(err.clone());
            }
        }
        result
    }

    fn execute(
        &self,
        converter: Converter,
        job: &ConversionJob,
        cancel: &CancelToken,
    ) -> Result<PathBuf, ConvertError> {
        cancel.check()?;
        match converter {
            Converter::PdfToWord => {
                let mut word: WordHost = self.acquire(cancel)?;
                {
                    let mut doc = word.open(&job.source)?;
                    cancel.check()?;
                    doc.save_as(&job.target, SaveFormat::Native)?;
                    doc.close();
                }
                word.release();
            }
            Converter::PdfToExcel => {
                let mut excel: ExcelHost = self.acquire(cancel)?;
                {
                    let mut book = excel.create()?;
                    if let Some(content) = &job.content {
                        ExcelHost::write_pages(&mut book, content)?;
                    }
                    cancel.check()?;
                    book.save_as(&job.target, SaveFormat::Native)?;
                    book.close();
                }
                excel.release();
            }
            Converter::PdfToPowerPoint => {
                let mut powerpoint: PowerPointHost = self.acquire(cancel)?;
                {
                    let mut deck = powerpoint.create()?;
                    if let Some(content) = &job.content {
                        PowerPointHost::add_slides(&mut deck, content)?;
                    }
                    cancel.check()?;
                    deck.save_as(&job.target, SaveFormat::Native)?;
                    deck.close();
                }
                powerpoint.release();
            }
            Converter::PowerPointToPdf => {
                let mut powerpoint: PowerPointHost = self.acquire(cancel)?;
                {
                    let mut deck = powerpoint.open(&job.source)?;
                    cancel.check()?;
                    deck.save_as(&job.target, SaveFormat::Pdf)?;
                    deck.close();
                }
                powerpoint.release();
            }
        }
        Ok(job.target.clone())
    }

    /// Acquire a host, giving up after the configured timeout. A host that
    /// comes up after the deadline is released as soon as it does.
    fn acquire<H: AutomationHost>(&self, cancel: &CancelToken) -> Result<H, ConvertError> {
        let kind = H::KIND;
        let codes = self.config.format_codes(kind);
        let timeout = self.config.acquire_timeout;
        let launcher = Arc::clone(&self.launcher);
        let (tx, rx) = crossbeam_channel::bounded(1);

        let mut late_launch = self.late_launch.lock();
        if let Some(pending) = late_launch.take() {
            debug!(?kind, "waiting for a late host to be released");
            // the launch thread drops its sender when it exits
            if let Err(RecvTimeoutError::Timeout) = pending.recv_timeout(timeout) {
                *late_launch = Some(pending);
                return Err(ConvertError::HostUnavailable {
                    kind,
                    reason: "a previous launch is still starting".into(),
                    missing: false,
                });
            }
        }

        let (exited_tx, exited) = crossbeam_channel::bounded::<()>(0);
        thread::Builder::new()
            .name(format!("acquire-{kind:?}").to_lowercase())
            .spawn(move || {
                let _exited = exited_tx;
                // a send error means nobody waits any more; dropping the
                // host here releases it
                let _ = tx.send(H::acquire(launcher.as_ref(), codes));
            })
            .map_err(|err| ConvertError::HostUnavailable {
                kind,
                reason: err.to_string(),
                missing: false,
            })?;

        let mut host = match rx.recv_timeout(timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                *late_launch = Some(exited);
                return Err(ConvertError::HostUnavailable {
                    kind,
                    reason: format!("did not start within {:?}", timeout),
                    missing: false,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ConvertError::HostUnavailable {
                    kind,
                    reason: "launcher stopped unexpectedly".into(),
                    missing: false,
                })
            }
        };
        drop(late_launch);
        if let Some(interrupt) = host.session().interrupter() {
            cancel.on_cancel(interrupt);
        }
        if let Err(err) = cancel.check() {
            host.release();
            return Err(err);
        }
        Ok(host)
    }
}
