//! Typed access to office automation hosts.
//!
//! [`HostSession`] and [`HostDocument`] are scoped handles: a session quits
//! its host and a document closes itself when dropped, so every exit path of
//! a converter, including `?` returns, releases what it acquired. Explicit
//! `close`/`release` calls are idempotent and make the drop a no-op.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ConvertError, HostError};

mod excel;
mod powerpoint;
mod process;
mod protocol;
mod word;

pub use excel::ExcelHost;
pub use powerpoint::PowerPointHost;
pub use process::ProcessLauncher;
pub use protocol::{HostLauncher, Interrupt, RemoteCall, RemoteSession, Target};
pub use word::WordHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Word,
    Excel,
    PowerPoint,
}

impl HostKind {
    /// Programmatic identifier of the application object.
    pub fn prog_id(self) -> &'static str {
        match self {
            HostKind::Word => "Word.Application",
            HostKind::Excel => "Excel.Application",
            HostKind::PowerPoint => "PowerPoint.Application",
        }
    }

    pub fn default_codes(self) -> FormatCodes {
        match self {
            HostKind::Word => WordHost::DEFAULT_CODES,
            HostKind::Excel => ExcelHost::DEFAULT_CODES,
            HostKind::PowerPoint => PowerPointHost::DEFAULT_CODES,
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostKind::Word => "Microsoft Word",
            HostKind::Excel => "Microsoft Excel",
            HostKind::PowerPoint => "Microsoft PowerPoint",
        };
        f.write_str(name)
    }
}

/// Host-specific `SaveAs` format codes. They differ between hosts and are
/// not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCodes {
    pub native: i32,
    pub pdf: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Native,
    Pdf,
}

/// A running automation host.
pub struct HostSession {
    kind: HostKind,
    codes: FormatCodes,
    remote: Option<Box<dyn RemoteSession>>,
}

impl HostSession {
    /// Launch `kind` and put it in unattended mode. Any failure to get a
    /// usable host is [`ConvertError::HostUnavailable`].
    pub fn acquire(
        launcher: &dyn HostLauncher,
        kind: HostKind,
        codes: FormatCodes,
    ) -> Result<Self, ConvertError> {
        let remote = launcher
            .launch(kind)
            .map_err(|err| ConvertError::HostUnavailable {
                kind,
                missing: err.is_missing_host(),
                reason: err.to_string(),
            })?;
        debug!(?kind, "automation host acquired");
        let mut session = Self {
            kind,
            codes,
            remote: Some(remote),
        };
        for name in ["Visible", "DisplayAlerts"] {
            session
                .call(Target::Application, RemoteCall::set_property(name, false))
                .map_err(|err| ConvertError::HostUnavailable {
                    kind,
                    reason: err.to_string(),
                    missing: false,
                })?;
        }
        Ok(session)
    }

    pub fn kind(&self) -> HostKind {
        self.kind
    }

    pub fn codes(&self) -> FormatCodes {
        self.codes
    }

    pub fn is_released(&self) -> bool {
        self.remote.is_none()
    }

    /// See [`RemoteSession::interrupter`].
    pub fn interrupter(&self) -> Option<Interrupt> {
        self.remote.as_ref().and_then(|remote| remote.interrupter())
    }

    fn call(&mut self, target: Target, call: RemoteCall) -> Result<Value, HostError> {
        let remote = self.remote.as_mut().ok_or(HostError::Disconnected)?;
        remote.call(target, call)
    }

    /// Open an existing file in the host.
    pub fn open(&mut self, path: &Path) -> Result<HostDocument<'_>, ConvertError> {
        let open_failed = |reason: String| ConvertError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };
        if !path.is_file() {
            return Err(open_failed("file does not exist".into()));
        }
        let value = self
            .call(Target::Application, RemoteCall::Open { path: path.into() })
            .map_err(|err| open_failed(err.to_string()))?;
        let handle = document_handle(&value).ok_or_else(|| open_failed(unexpected(&value)))?;
        debug!(kind = ?self.kind, handle, path = %path.display(), "document opened");
        Ok(HostDocument::new(self, handle))
    }

    /// Create a new, empty document in the host.
    pub fn create(&mut self) -> Result<HostDocument<'_>, ConvertError> {
        let value = self
            .call(Target::Application, RemoteCall::Add)
            .map_err(|err| ConvertError::HostFailure(err.to_string()))?;
        let handle = document_handle(&value)
            .ok_or_else(|| ConvertError::HostFailure(unexpected(&value)))?;
        debug!(kind = ?self.kind, handle, "document created");
        Ok(HostDocument::new(self, handle))
    }

    /// Quit the host. Calling it again, or dropping the session afterwards,
    /// does nothing.
    pub fn release(&mut self) {
        let Some(mut remote) = self.remote.take() else {
            return;
        };
        if let Err(err) = remote.call(Target::Application, RemoteCall::Quit) {
            warn!(?err, kind = ?self.kind, "automation host did not quit cleanly");
        }
        debug!(kind = ?self.kind, "automation host released");
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// A document open inside a [`HostSession`]. Borrows the session, so the
/// document is always closed before its host can be released.
pub struct HostDocument<'h> {
    host: &'h mut HostSession,
    handle: Option<u64>,
}

impl<'h> HostDocument<'h> {
    fn new(host: &'h mut HostSession, handle: u64) -> Self {
        Self {
            host,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> Option<u64> {
        self.handle
    }

    fn target(&self) -> Result<Target, ConvertError> {
        self.handle
            .map(Target::Document)
            .ok_or_else(|| ConvertError::HostFailure("document is already closed".into()))
    }

    /// Host-specific population call on this document.
    pub fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, ConvertError> {
        let target = self.target()?;
        self.host
            .call(
                target,
                RemoteCall::Invoke {
                    method: method.to_owned(),
                    args,
                },
            )
            .map_err(|err| ConvertError::HostFailure(format!("{method}: {err}")))
    }

    pub fn save_as(&mut self, path: &Path, format: SaveFormat) -> Result<(), ConvertError> {
        let save_failed = |reason: String| ConvertError::SaveFailed {
            path: path.to_path_buf(),
            reason,
        };
        let target = self.target().map_err(|err| save_failed(err.to_string()))?;
        let codes = self.host.codes;
        let code = match format {
            SaveFormat::Native => codes.native,
            SaveFormat::Pdf => codes.pdf,
        };
        self.host
            .call(
                target,
                RemoteCall::SaveAs {
                    path: path.into(),
                    format: code,
                },
            )
            .map_err(|err| save_failed(err.to_string()))?;
        debug!(path = %path.display(), code, "document saved");
        Ok(())
    }

    /// Close the document. Idempotent.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = self.host.call(Target::Document(handle), RemoteCall::Close) {
            warn!(?err, handle, "failed to close host document");
        }
    }
}

impl Drop for HostDocument<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

fn document_handle(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.get("handle").and_then(Value::as_u64))
}

fn unexpected(value: &Value) -> String {
    format!("host returned no document handle ({value})")
}

/// One office application variant with its fixed capability set. The
/// default methods delegate to the wrapped [`HostSession`].
pub trait AutomationHost: Sized + Send + 'static {
    const KIND: HostKind;
    const DEFAULT_CODES: FormatCodes;

    fn from_session(session: HostSession) -> Self;
    fn session(&mut self) -> &mut HostSession;

    fn acquire(launcher: &dyn HostLauncher, codes: FormatCodes) -> Result<Self, ConvertError> {
        HostSession::acquire(launcher, Self::KIND, codes).map(Self::from_session)
    }

    fn open(&mut self, path: &Path) -> Result<HostDocument<'_>, ConvertError> {
        self.session().open(path)
    }

    fn create(&mut self) -> Result<HostDocument<'_>, ConvertError> {
        self.session().create()
    }

    fn release(&mut self) {
        self.session().release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeLauncher;

    use tempfile::tempdir;

    #[test]
    fn acquire_puts_host_in_unattended_mode() {
        let launcher = FakeLauncher::new();
        let session =
            HostSession::acquire(&launcher, HostKind::Word, WordHost::DEFAULT_CODES).unwrap();
        drop(session);

        assert_eq!(launcher.ops(), vec!["set_property", "set_property", "quit"]);
    }

    #[test]
    fn unavailable_host_maps_to_host_unavailable() {
        let launcher = FakeLauncher::unavailable();
        let err = HostSession::acquire(&launcher, HostKind::Excel, ExcelHost::DEFAULT_CODES)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConvertError::HostUnavailable {
                kind: HostKind::Excel,
                missing: true,
                ..
            }
        ));
        assert!(launcher.ops().is_empty());
    }

    #[test]
    fn close_and_release_are_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let launcher = FakeLauncher::new();

        let mut session =
            HostSession::acquire(&launcher, HostKind::Word, WordHost::DEFAULT_CODES).unwrap();
        {
            let mut doc = session.open(&path).unwrap();
            doc.close();
            doc.close();
        }
        session.release();
        session.release();
        drop(session);

        assert_eq!(launcher.count("close"), 1);
        assert_eq!(launcher.count("quit"), 1);
    }

    #[test]
    fn missing_file_fails_without_remote_open() {
        let launcher = FakeLauncher::new();
        let mut session =
            HostSession::acquire(&launcher, HostKind::Word, WordHost::DEFAULT_CODES).unwrap();
        let err = session.open(Path::new("/nonexistent/in.pdf")).err().unwrap();

        assert!(matches!(err, ConvertError::OpenFailed { .. }));
        assert_eq!(launcher.count("open"), 0);
        assert_eq!(launcher.count("close"), 0);
    }

    #[test]
    fn save_uses_host_specific_codes() {
        let launcher = FakeLauncher::new();
        let mut session = HostSession::acquire(
            &launcher,
            HostKind::PowerPoint,
            PowerPointHost::DEFAULT_CODES,
        )
        .unwrap();
        {
            let mut doc = session.create().unwrap();
            doc.save_as(Path::new("/tmp/out.pdf"), SaveFormat::Pdf).unwrap();
        }

        let saves = launcher.calls_with_op("save_as");
        assert_eq!(
            saves,
            vec![RemoteCall::SaveAs {
                path: "/tmp/out.pdf".into(),
                format: 32
            }]
        );
        assert_eq!(launcher.count("close"), 1);
    }

    #[test]
    fn display_names_products() {
        assert_eq!(HostKind::Word.to_string(), "Microsoft Word");
        assert_eq!(HostKind::PowerPoint.prog_id(), "PowerPoint.Application");
    }
}
