use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::{
    discover_entry_point, Execution, ExecutionFailure, IsolationBackend, NodeBackend, Program,
};

pub const DEFAULT_BUDGET: Duration = Duration::from_millis(1000);
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(2000);

/// Runs one fragment against one input through an isolation backend.
///
/// The backend sees `budget` and is expected to stop user code itself; the
/// executor also drops the backend future at `budget + startup_grace`, which
/// is what guarantees a bounded wait when the backend cannot interrupt.
///
/// The grace covers process start-up, so it has to absorb a cold `node` on
/// a busy machine: too small and a correct, fast answer comes back as
/// [`ExecutionFailure::Timeout`]. It only lengthens the wait for code that
/// escapes the backend's own budget.
#[derive(Clone)]
pub struct Executor {
    backend: Arc<dyn IsolationBackend>,
    budget: Duration,
    startup_grace: Duration,
}

impl Executor {
    pub fn new(backend: Arc<dyn IsolationBackend>) -> Self {
        Executor {
            backend,
            budget: DEFAULT_BUDGET,
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn backend(&self) -> &dyn IsolationBackend {
        self.backend.as_ref()
    }

    #[instrument(skip_all, fields(backend = self.backend.name(), budget_ms = self.budget.as_millis() as u64))]
    pub async fn execute(&self, code: &str, input: &str) -> Result<Execution, ExecutionFailure> {
        let entry = discover_entry_point(code);
        debug!(?entry, "entry point");

        let program = Program {
            code: code.to_string(),
            input: input.to_string(),
            entry,
            budget: self.budget,
        };

        let deadline = self.budget + self.startup_grace;
        match tokio::time::timeout(deadline, self.backend.run(&program)).await {
            Ok(Ok(execution)) => {
                debug!(display = %execution.display, "execution finished");
                Ok(execution)
            }
            Ok(Err(failure)) => {
                if matches!(failure, ExecutionFailure::Timeout(_)) {
                    warn!("user code hit the time budget");
                } else {
                    debug!(%failure, "execution failed");
                }
                Err(failure)
            }
            Err(_) => {
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "backend overran its deadline, dropped"
                );
                Err(ExecutionFailure::Timeout(self.budget))
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::new(Arc::new(NodeBackend::default()))
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("backend", &self.backend.name())
            .field("isolation", &self.backend.isolation())
            .field("budget", &self.budget)
            .field("startup_grace", &self.startup_grace)
            .finish()
    }
}
