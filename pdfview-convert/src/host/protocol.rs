use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use super::HostKind;
use crate::error::HostError;

/// Object a remote call is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Application,
    Document(u64),
}

/// The generic remote-object operations every automation host understands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteCall {
    Open { path: PathBuf },
    Add,
    SetProperty { name: String, value: Value },
    Invoke { method: String, args: Vec<Value> },
    SaveAs { path: PathBuf, format: i32 },
    Close,
    Quit,
}

impl RemoteCall {
    pub fn set_property(name: &str, value: impl Into<Value>) -> Self {
        RemoteCall::SetProperty {
            name: name.to_owned(),
            value: value.into(),
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            RemoteCall::Open { .. } => "open",
            RemoteCall::Add => "add",
            RemoteCall::SetProperty { .. } => "set_property",
            RemoteCall::Invoke { .. } => "invoke",
            RemoteCall::SaveAs { .. } => "save_as",
            RemoteCall::Close => "close",
            RemoteCall::Quit => "quit",
        }
    }
}

/// A live connection to one host process.
pub trait RemoteSession: Send {
    fn call(&mut self, target: Target, call: RemoteCall) -> Result<Value, HostError>;

    /// Handle that makes a call blocked on this session fail with
    /// [`HostError::Interrupted`], and every later call fail straight away.
    /// Sessions that cannot block return `None`.
    fn interrupter(&self) -> Option<Interrupt> {
        None
    }
}

/// Callable from any thread while the session is in use.
pub type Interrupt = Box<dyn Fn() + Send + Sync>;

/// Starts host processes. Failing here means the application is missing or
/// cannot be started.
pub trait HostLauncher: Send + Sync {
    fn launch(&self, kind: HostKind) -> Result<Box<dyn RemoteSession>, HostError>;
}
