use async_trait::async_trait;
use tracing::{error, info};

use crate::error::AgentError;

/// One reversible unit of saga work. `run` produces a result from `Ctx`;
/// `undo` is given that same result and must be total and idempotent.
#[async_trait]
pub trait Step<Ctx: Send + Sync>: Send + Sync {
    type Output: Send + Sync + Clone;

    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &Ctx) -> Result<Self::Output, AgentError>;

    /// Default: nothing to undo (read-only steps like `LoadPreviousState`).
    async fn undo(&self, _ctx: &Ctx, _output: &Self::Output) {}
}

/// Type-erased record of a completed step, kept only so the engine can
/// invoke `undo` without knowing the step's concrete `Output` type.
#[async_trait]
trait ErasedUndo<Ctx: Send + Sync>: Send + Sync {
    async fn undo(&self, ctx: &Ctx);
    fn name(&self) -> &'static str;
}

struct CompletedStep<'a, Ctx: Send + Sync, S: Step<Ctx>> {
    step: &'a S,
    output: S::Output,
}

#[async_trait]
impl<'a, Ctx, S> ErasedUndo<Ctx> for CompletedStep<'a, Ctx, S>
where
    Ctx: Send + Sync,
    S: Step<Ctx>,
{
    async fn undo(&self, ctx: &Ctx) {
        self.step.undo(ctx, &self.output).await;
    }

    fn name(&self) -> &'static str {
        self.step.name()
    }
}

/// Executes steps in declared order, recording each success, and on the
/// first failure unwinds every recorded step's `undo` in reverse
/// completion order. `undo` failures (panics aside) are logged and never
/// abort the unwind.
pub struct SagaEngine<'a, Ctx: Send + Sync> {
    ctx: &'a Ctx,
    completed: Vec<Box<dyn ErasedUndo<Ctx> + 'a>>,
}

impl<'a, Ctx: Send + Sync> SagaEngine<'a, Ctx> {
    pub fn new(ctx: &'a Ctx) -> Self {
        Self {
            ctx,
            completed: Vec::new(),
        }
    }

    /// Run one step. On success, records it for later compensation and
    /// returns its output. On failure, immediately unwinds everything
    /// recorded so far (in reverse order) and returns the original error.
    pub async fn run<S>(&mut self, step: &'a S) -> Result<S::Output, AgentError>
    where
        S: Step<Ctx>,
    {
        info!(step = step.name(), "saga step starting");
        match step.run(self.ctx).await {
            Ok(output) => {
                info!(step = step.name(), "saga step completed");
                self.completed.push(Box::new(CompletedStep {
                    step,
                    output: output.clone(),
                }));
                Ok(output)
            }
            Err(err) => {
                error!(step = step.name(), error = %err, "saga step failed, unwinding");
                self.unwind().await;
                Err(err)
            }
        }
    }

    /// Invoke `undo` on every recorded step, in reverse completion order.
    pub async fn unwind(&mut self) {
        while let Some(completed) = self.completed.pop() {
            info!(step = completed.name(), "compensating");
            completed.undo(self.ctx).await;
        }
    }
}
