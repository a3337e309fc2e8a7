//! Conversion of PDF and Office documents by driving external office
//! automation hosts.
//!
//! A [`ConversionJob`] names a source, a target and their formats. The
//! [`ConversionPipeline`] picks a [`Converter`] for the format pair and runs
//! it against a typed [`host::AutomationHost`]; the [`ConversionQueue`] runs
//! at most one job at a time on a blocking worker and reports each terminal
//! state exactly once through a [`Notifier`].

pub mod config;
pub mod error;
pub mod format;
pub mod host;
pub mod job;
pub mod notify;
pub mod pipeline;
pub mod queue;

pub use config::{ConversionConfig, HostConfig};
pub use error::{ConvertError, HostError};
pub use format::{default_output_path, detect_format, route_open, Format, OpenRoute};
pub use host::{HostKind, HostLauncher, ProcessLauncher};
pub use job::{ConversionJob, DocumentContent, JobId, JobStatus};
pub use notify::{ChannelNotifier, LogNotifier, Notification, Notifier, Outcome};
pub use pipeline::{CancelToken, ConversionPipeline, Converter};
pub use queue::{ConversionQueue, JobTicket};

#[cfg(test)]
pub(crate) mod testing;
