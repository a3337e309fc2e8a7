use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::error::ConvertError;
use crate::job::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { target: PathBuf },
    Failed(ConvertError),
}

/// Terminal state of one conversion, delivered once per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub job: JobId,
    pub source: PathBuf,
    pub outcome: Outcome,
}

impl Notification {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    pub fn target(&self) -> Option<&PathBuf> {
        match &self.outcome {
            Outcome::Succeeded { target } => Some(target),
            Outcome::Failed(_) => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Succeeded { target } => write!(
                f,
                "Conversion completed successfully. Document saved at: {}",
                target.display()
            ),
            Outcome::Failed(ConvertError::HostUnavailable {
                kind,
                missing: true,
                ..
            }) => write!(f, "{kind} is not installed."),
            Outcome::Failed(err) => write!(f, "Conversion failed: {err}"),
        }
    }
}

/// Receives the terminal state of every conversion job.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes outcomes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification.outcome {
            Outcome::Succeeded { target } => {
                info!(job = %notification.job, target = %target.display(), "conversion finished")
            }
            Outcome::Failed(err) => {
                warn!(job = %notification.job, %err, "conversion finished with an error")
            }
        }
    }
}

/// Forwards outcomes to an async consumer, such as the viewer loop.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        LogNotifier.notify(notification.clone());
        if self.tx.send(notification).is_err() {
            warn!("conversion outcome dropped, receiver is gone");
        }
    }
}
