//! Isolated execution of untrusted JavaScript fragments.
//!
//! The [`Executor`] discovers the fragment's entry point, hands a [`Program`]
//! to an [`IsolationBackend`] and enforces the wall-clock budget by dropping
//! the backend future when it runs long. Backends own whatever context they
//! create for a run and must release it when the future completes or is
//! dropped.

mod entry;
mod executor;
mod node;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use entry::{discover_entry_point, EntryPoint};
pub use executor::Executor;
pub use node::{NodeBackend, NodeOptions};

/// What a backend is asked to run: one candidate and one argument list.
#[derive(Debug, Clone)]
pub struct Program {
    pub code: String,
    /// Argument list literal, evaluated in the same context as `code`.
    pub input: String,
    pub entry: EntryPoint,
    pub budget: Duration,
}

/// Value returned by a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    /// JSON form of the returned value; `null` when it has none.
    pub value: Value,
    /// `String(result)` as JavaScript renders it.
    pub display: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionFailure {
    #[error("Syntax error: {0}")]
    SyntaxError(String),
    #[error("Runtime error: {0}")]
    RuntimeError(String),
    #[error("Timed out after {} ms", .0.as_millis())]
    Timeout(#[serde(serialize_with = "serialize_millis")] Duration),
    #[error("No callable found: {0}")]
    NoCallableFound(String),
    #[error("Sandbox unavailable: {0}")]
    Unavailable(String),
}

fn serialize_millis<S: serde::Serializer>(budget: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(budget.as_millis() as u64)
}

/// How strongly a backend separates user code from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Separate OS process per run, killed on timeout.
    Process,
    /// Runs inside the host process. Weaker: no memory isolation and
    /// cancellation only at await points.
    InProcess,
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::Process => f.write_str("process"),
            Isolation::InProcess => f.write_str("in-process (weak)"),
        }
    }
}

#[async_trait]
pub trait IsolationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn isolation(&self) -> Isolation;

    async fn run(&self, program: &Program) -> Result<Execution, ExecutionFailure>;
}
