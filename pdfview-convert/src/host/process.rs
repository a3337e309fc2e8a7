use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::protocol::{HostLauncher, Interrupt, RemoteCall, RemoteSession, Target};
use super::HostKind;
use crate::config::ConversionConfig;
use crate::error::HostError;

/// Launches automation bridges as child processes and talks to them in
/// JSON lines over stdin/stdout.
///
/// The configured command gets the host's programmatic id appended as its
/// last argument and must answer with `{"ready": true}` before any call.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    commands: HashMap<HostKind, Vec<String>>,
}

impl ProcessLauncher {
    pub fn from_config(config: &ConversionConfig) -> Self {
        let mut commands = HashMap::new();
        for kind in [HostKind::Word, HostKind::Excel, HostKind::PowerPoint] {
            let command = &config.host(kind).command;
            if !command.is_empty() {
                commands.insert(kind, command.clone());
            }
        }
        Self { commands }
    }

    pub fn is_configured(&self, kind: HostKind) -> bool {
        self.commands.contains_key(&kind)
    }
}

impl HostLauncher for ProcessLauncher {
    fn launch(&self, kind: HostKind) -> Result<Box<dyn RemoteSession>, HostError> {
        let argv = self
            .commands
            .get(&kind)
            .filter(|argv| !argv.is_empty())
            .ok_or(HostError::NotConfigured(kind))?;

        debug!(?kind, program = %argv[0], "launching automation bridge");
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .arg(kind.prog_id())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(HostError::Launch)?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let child = Arc::new(Mutex::new(child));
        let lines = match stdout {
            Some(stdout) => spawn_reader(kind, stdout).map_err(|err| {
                kill(&child, kind);
                HostError::Launch(err)
            })?,
            None => crossbeam_channel::never(),
        };
        let (interrupt_tx, interrupt) = crossbeam_channel::bounded(1);
        let mut bridge = BridgeConnection {
            kind,
            child,
            stdin,
            lines,
            interrupt,
            interrupt_tx,
            interrupted: Arc::new(AtomicBool::new(false)),
        };
        bridge.handshake()?;
        Ok(Box::new(bridge))
    }
}

/// Reads reply lines on a thread of its own, so a caller waiting for a reply
/// can also wait for an interrupt. The channel disconnects at end of output.
fn spawn_reader(
    kind: HostKind,
    stdout: ChildStdout,
) -> io::Result<Receiver<io::Result<String>>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name(format!("bridge-{kind:?}").to_lowercase())
        .spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err));
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

fn kill(child: &Mutex<Child>, kind: HostKind) {
    let mut child = child.lock();
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(err) = child.kill() {
        warn!(?err, ?kind, "failed to kill automation bridge");
    }
    let _ = child.wait();
}

#[derive(Deserialize)]
struct Handshake {
    ready: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct Request<'a> {
    target: Target,
    call: &'a RemoteCall,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    ok: Value,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeConnection {
    kind: HostKind,
    child: Arc<Mutex<Child>>,
    stdin: Option<ChildStdin>,
    lines: Receiver<io::Result<String>>,
    interrupt: Receiver<()>,
    interrupt_tx: Sender<()>,
    interrupted: Arc<AtomicBool>,
}

impl BridgeConnection {
    fn read_line(&mut self) -> Result<String, HostError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(HostError::Interrupted);
        }
        crossbeam_channel::select! {
            recv(self.lines) -> line => match line {
                Ok(line) => Ok(line?),
                Err(_) => Err(HostError::Disconnected),
            },
            recv(self.interrupt) -> _ => Err(HostError::Interrupted),
        }
    }

    fn handshake(&mut self) -> Result<(), HostError> {
        let line = self.read_line().map_err(|err| match err {
            HostError::Disconnected => {
                HostError::Handshake("bridge exited before reporting ready".into())
            }
            other => other,
        })?;
        let handshake: Handshake = serde_json::from_str(line.trim())?;
        if handshake.ready {
            Ok(())
        } else {
            Err(HostError::Handshake(
                handshake
                    .error
                    .unwrap_or_else(|| format!("{} refused to start", self.kind)),
            ))
        }
    }
}

impl RemoteSession for BridgeConnection {
    fn call(&mut self, target: Target, call: RemoteCall) -> Result<Value, HostError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(HostError::Interrupted);
        }
        let mut payload = serde_json::to_string(&Request {
            target,
            call: &call,
        })?;
        payload.push('\n');
        let stdin = self.stdin.as_mut().ok_or(HostError::Disconnected)?;
        stdin.write_all(payload.as_bytes())?;
        stdin.flush()?;

        let line = self.read_line()?;
        let reply: Reply = serde_json::from_str(line.trim())?;
        match reply.error {
            Some(message) => Err(HostError::Remote(message)),
            None => Ok(reply.ok),
        }
    }

    /// Kills the bridge and wakes the caller waiting for its reply. Output
    /// still held open by the bridge's own children is left to the reader.
    fn interrupter(&self) -> Option<Interrupt> {
        let kind = self.kind;
        let child = Arc::clone(&self.child);
        let interrupted = Arc::clone(&self.interrupted);
        let wake = self.interrupt_tx.clone();
        Some(Box::new(move || {
            if interrupted.swap(true, Ordering::SeqCst) {
                return;
            }
            debug!(?kind, "interrupting automation bridge");
            let _ = wake.try_send(());
            kill(&child, kind);
        }))
    }
}

impl Drop for BridgeConnection {
    fn drop(&mut self) {
        // closing stdin tells a well-behaved bridge to exit
        drop(self.stdin.take());
        kill(&self.child, self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher_with(kind: HostKind, argv: &[&str]) -> ProcessLauncher {
        let mut config = ConversionConfig::default();
        config.host_mut(kind).command = argv.iter().map(|s| s.to_string()).collect();
        ProcessLauncher::from_config(&config)
    }

    #[test]
    fn unconfigured_host_is_not_launched() {
        let launcher = ProcessLauncher::from_config(&ConversionConfig::default());
        assert!(!launcher.is_configured(HostKind::Word));
        assert!(matches!(
            launcher.launch(HostKind::Word).err(),
            Some(HostError::NotConfigured(HostKind::Word))
        ));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let launcher = launcher_with(HostKind::Excel, &["/nonexistent/office-bridge"]);
        let err = launcher.launch(HostKind::Excel).err().unwrap();
        assert!(matches!(err, HostError::Launch(_)));
        assert!(err.is_missing_host());
    }

    #[cfg(unix)]
    #[test]
    fn bridge_round_trip() {
        let script = r#"echo '{"ready":true}'; while read line; do echo '{"ok":7}'; done"#;
        let launcher = launcher_with(HostKind::Word, &["sh", "-c", script]);
        let mut session = launcher.launch(HostKind::Word).unwrap();

        let value = session
            .call(
                Target::Application,
                RemoteCall::Open {
                    path: "/tmp/in.pdf".into(),
                },
            )
            .unwrap();
        assert_eq!(value.as_u64(), Some(7));
    }

    #[cfg(unix)]
    #[test]
    fn remote_errors_are_reported() {
        let script = r#"echo '{"ready":true}'; while read line; do echo '{"error":"no such file"}'; done"#;
        let launcher = launcher_with(HostKind::Word, &["sh", "-c", script]);
        let mut session = launcher.launch(HostKind::Word).unwrap();

        let err = session
            .call(Target::Document(1), RemoteCall::Close)
            .unwrap_err();
        assert_eq!(err.to_string(), "no such file");
    }

    #[cfg(unix)]
    #[test]
    fn refused_handshake_is_reported() {
        let script = r#"echo '{"ready":false,"error":"Word is not installed"}'"#;
        let launcher = launcher_with(HostKind::Word, &["sh", "-c", script]);
        match launcher.launch(HostKind::Word).err() {
            Some(err @ HostError::Handshake(_)) => {
                assert!(!err.is_missing_host());
                assert_eq!(
                    err.to_string(),
                    "automation bridge did not become ready: Word is not installed"
                );
            }
            other => panic!("unexpected result: {:?}", other.map(|e| e.to_string())),
        }
    }

    #[cfg(unix)]
    #[test]
    fn interrupt_wakes_a_call_the_bridge_never_answers() {
        let script = r#"echo '{"ready":true}'; while read line; do case "$line" in *save_as*) sleep 30 ;; *) echo '{"ok":1}' ;; esac; done"#;
        let launcher = launcher_with(HostKind::PowerPoint, &["sh", "-c", script]);
        let mut session = launcher.launch(HostKind::PowerPoint).unwrap();
        let interrupt = session.interrupter().unwrap();
        session.call(Target::Application, RemoteCall::Add).unwrap();

        let started = std::time::Instant::now();
        let waker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(200));
            interrupt();
            interrupt();
        });
        let err = session
            .call(
                Target::Document(1),
                RemoteCall::SaveAs {
                    path: "/tmp/out.pdf".into(),
                    format: 32,
                },
            )
            .unwrap_err();
        waker.join().unwrap();

        assert!(matches!(err, HostError::Interrupted));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert!(matches!(
            session.call(Target::Document(1), RemoteCall::Close),
            Err(HostError::Interrupted)
        ));
    }
}
