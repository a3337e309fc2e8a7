//! In-memory automation host for exercising converters without an office
//! installation.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::HostError;
use crate::host::{HostKind, HostLauncher, Interrupt, RemoteCall, RemoteSession, Target};
use crate::pipeline::CancelToken;

type CallLog = Arc<Mutex<Vec<(HostKind, Target, RemoteCall)>>>;

#[derive(Clone, Default)]
pub struct FakeLauncher {
    calls: CallLog,
    unavailable: bool,
    fail_on: Option<&'static str>,
    cancel_on: Option<(&'static str, CancelToken)>,
    hang_on: Option<&'static str>,
    launch_delay: Option<Duration>,
    first_launch_delay: Option<Duration>,
    attempts: Arc<AtomicUsize>,
    launches: Arc<AtomicUsize>,
    next_handle: Arc<AtomicU64>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose hosts never start.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn cancelling_on(mut self, op: &'static str, token: CancelToken) -> Self {
        self.cancel_on = Some((op, token));
        self
    }

    /// Hosts that never answer `op` until they are interrupted.
    pub fn hanging_on(mut self, op: &'static str) -> Self {
        self.hang_on = Some(op);
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = Some(delay);
        self
    }

    /// Only the first host is slow to start; later launches are immediate.
    pub fn with_slow_first_launch(mut self, delay: Duration) -> Self {
        self.first_launch_delay = Some(delay);
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn kinds(&self) -> Vec<HostKind> {
        let mut kinds: Vec<HostKind> = Vec::new();
        for (kind, _, _) in self.calls.lock().iter() {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|(_, _, call)| call.op()).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(_, _, call)| call.op() == op)
            .count()
    }

    pub fn calls_with_op(&self, op: &str) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, _, call)| call.op() == op)
            .map(|(_, _, call)| call.clone())
            .collect()
    }
}

impl HostLauncher for FakeLauncher {
    fn launch(&self, kind: HostKind) -> Result<Box<dyn RemoteSession>, HostError> {
        let first = self.attempts.fetch_add(1, Ordering::SeqCst) == 0;
        if let Some(delay) = self.first_launch_delay.filter(|_| first) {
            thread::sleep(delay);
        }
        if let Some(delay) = self.launch_delay {
            thread::sleep(delay);
        }
        if self.unavailable {
            return Err(HostError::NotConfigured(kind));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        let (wake, woken) = crossbeam_channel::bounded(1);
        Ok(Box::new(FakeSession {
            kind,
            launcher: self.clone(),
            interrupted: Arc::new(AtomicBool::new(false)),
            wake,
            woken,
        }))
    }
}

struct FakeSession {
    kind: HostKind,
    launcher: FakeLauncher,
    interrupted: Arc<AtomicBool>,
    wake: Sender<()>,
    woken: Receiver<()>,
}

impl RemoteSession for FakeSession {
    fn call(&mut self, target: Target, call: RemoteCall) -> Result<Value, HostError> {
        let op = call.op();
        self.launcher
            .calls
            .lock()
            .push((self.kind, target, call.clone()));

        if self.interrupted.load(Ordering::SeqCst) {
            return Err(HostError::Interrupted);
        }
        if let Some((cancel_op, token)) = &self.launcher.cancel_on {
            if *cancel_op == op {
                token.cancel();
            }
        }
        if self.launcher.hang_on == Some(op) {
            return match self.woken.recv_timeout(Duration::from_secs(30)) {
                Ok(()) => Err(HostError::Interrupted),
                Err(_) => Err(HostError::Remote(format!("{op} never returned"))),
            };
        }
        if self.launcher.fail_on == Some(op) {
            return Err(HostError::Remote(format!("{op} rejected")));
        }
        match call {
            RemoteCall::Open { .. } | RemoteCall::Add => {
                let handle = self.launcher.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!(handle))
            }
            _ => Ok(Value::Null),
        }
    }

    fn interrupter(&self) -> Option<Interrupt> {
        let interrupted = Arc::clone(&self.interrupted);
        let wake = self.wake.clone();
        Some(Box::new(move || {
            interrupted.store(true, Ordering::SeqCst);
            let _ = wake.try_send(());
        }))
    }
}
