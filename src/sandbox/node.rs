use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{EntryPoint, Execution, ExecutionFailure, Isolation, IsolationBackend, Program};

const HARNESS: &str = include_str!("harness.js");

#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub node: PathBuf,
    pub heap_limit_mb: u32,
    pub max_output_bytes: usize,
    /// Node's permission-model flag: `--permission`, or
    /// `--experimental-permission` on Node 20 to 23.4. When set, the child
    /// may read only its own temp directory and may not write anywhere or
    /// spawn processes. Off by default since older `node` binaries reject it.
    pub permission_flag: Option<String>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        NodeOptions {
            node: PathBuf::from("node"),
            heap_limit_mb: 64,
            max_output_bytes: 64 * 1024,
            permission_flag: None,
        }
    }
}

/// Runs each program in its own `node` child process and temp directory.
///
/// The child is spawned with `kill_on_drop`, so a caller that stops awaiting
/// [`IsolationBackend::run`] (the executor's timeout) kills it.
#[derive(Debug, Clone, Default)]
pub struct NodeBackend {
    options: NodeOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarnessRequest<'a> {
    code: &'a str,
    input: &'a str,
    entry: Option<&'a str>,
    budget_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum HarnessReply {
    Ok {
        #[serde(default)]
        value: Value,
        display: String,
    },
    SyntaxError {
        message: String,
    },
    RuntimeError {
        message: String,
    },
    Timeout,
    NoCallable {
        message: String,
    },
}

impl NodeBackend {
    pub fn new(options: NodeOptions) -> Self {
        NodeBackend { options }
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    fn command(&self, workdir: &Path, harness: &Path) -> Command {
        let mut cmd = Command::new(&self.options.node);
        cmd.arg(format!("--max-old-space-size={}", self.options.heap_limit_mb));
        if let Some(flag) = &self.options.permission_flag {
            let mut allow = std::ffi::OsString::from("--allow-fs-read=");
            allow.push(workdir);
            cmd.arg(flag).arg(allow);
        }
        cmd.arg(harness)
            .current_dir(workdir)
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        cmd
    }

    async fn spawn_and_wait(&self, program: &Program) -> Result<RawOutput, ExecutionFailure> {
        let workdir = TempDir::new().map_err(unavailable("create temp dir"))?;
        let harness_path = workdir.path().join("harness.js");
        std::fs::write(&harness_path, HARNESS).map_err(unavailable("write harness"))?;

        let entry = match &program.entry {
            EntryPoint::Function(name) => Some(name.as_str()),
            EntryPoint::Expression => None,
        };
        let request = serde_json::to_vec(&HarnessRequest {
            code: &program.code,
            input: &program.input,
            entry,
            budget_ms: program.budget.as_millis() as u64,
        })
        .map_err(unavailable("encode request"))?;

        let mut child = self
            .command(workdir.path(), &harness_path)
            .spawn().map_err(|e| {
            ExecutionFailure::Unavailable(format!(
                "could not start `{}`: {e}",
                self.options.node.display()
            ))
        })?;
        debug!(pid = ?child.id(), "spawned node");

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionFailure::Unavailable("stdin was not piped".into()))?;
        stdin.write_all(&request).await.map_err(unavailable("write request"))?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionFailure::Unavailable("stdout was not piped".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionFailure::Unavailable("stderr was not piped".into()))?;

        let limit = self.options.max_output_bytes;
        let (stdout, stderr, status) = tokio::join!(
            read_limited(stdout, limit),
            read_limited(stderr, limit),
            child.wait()
        );
        let status = status.map_err(unavailable("wait for node"))?;

        // `workdir` is removed here, after the child has exited.
        Ok(RawOutput {
            success: status.success(),
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

struct RawOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Drains `reader` to EOF so the child never blocks on a full pipe, keeping at most `limit` bytes.
async fn read_limited<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                warn!(err = %e, "failed to read child output");
                break;
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

fn unavailable<E: std::fmt::Display>(what: &'static str) -> impl Fn(E) -> ExecutionFailure {
    move |e| ExecutionFailure::Unavailable(format!("{what}: {e}"))
}

#[async_trait]
impl IsolationBackend for NodeBackend {
    fn name(&self) -> &'static str {
        "node"
    }

    fn isolation(&self) -> Isolation {
        Isolation::Process
    }

    async fn run(&self, program: &Program) -> Result<Execution, ExecutionFailure> {
        let output = self.spawn_and_wait(program).await?;
        interpret(output, program)
    }
}

fn interpret(output: RawOutput, program: &Program) -> Result<Execution, ExecutionFailure> {
    let reply = output
        .stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| serde_json::from_str::<HarnessReply>(line).ok());

    match reply {
        Some(HarnessReply::Ok { value, display }) => Ok(Execution { value, display }),
        Some(HarnessReply::SyntaxError { message }) => Err(ExecutionFailure::SyntaxError(message)),
        Some(HarnessReply::RuntimeError { message }) => {
            Err(ExecutionFailure::RuntimeError(message))
        }
        Some(HarnessReply::Timeout) => Err(ExecutionFailure::Timeout(program.budget)),
        Some(HarnessReply::NoCallable { message }) => {
            Err(ExecutionFailure::NoCallableFound(message))
        }
        None if !output.success => {
            warn!(exit_code = ?output.code, "node exited without a reply");
            Err(ExecutionFailure::RuntimeError(clean_error_output(&output.stderr)))
        }
        None => Err(ExecutionFailure::Unavailable(
            "harness produced no reply".to_string(),
        )),
    }
}

/// One short stderr line for display: the first that mentions an error,
/// else the first meaningful one, with the temp path stripped.
fn clean_error_output(stderr: &str) -> String {
    let meaningful = || {
        stderr.lines().map(str::trim).filter(|line| {
            !line.is_empty()
                && !line.starts_with("at ")
                && !line.starts_with("Node.js")
                && !line.starts_with('^')
        })
    };
    meaningful()
        .find(|line| line.to_ascii_lowercase().contains("error"))
        .or_else(|| meaningful().next())
        .map(|line| match line.rfind("harness.js") {
            Some(idx) => line[idx..].to_string(),
            None => line.to_string(),
        })
        .unwrap_or_else(|| "process exited abnormally".to_string())
}
