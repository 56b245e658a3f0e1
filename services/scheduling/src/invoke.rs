//! Inter-stage invocation.
//!
//! Stages talk to each other through [`StageInvoker`], which separates
//! awaiting a result ([`StageInvoker::call`]) from handing work off
//! ([`StageInvoker::trigger`]). [`LocalStage`] runs a handler in-process
//! on the tokio runtime; an out-of-process transport would implement the
//! same trait over the serde-encoded stage inputs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::deadline::deadline;
use crate::error::SchedulingResult;

/// The body of a stage.
#[async_trait]
pub trait StageHandler<I, O>: Send + Sync + 'static {
    async fn handle(&self, input: I) -> SchedulingResult<O>;
}

/// Invokes a stage.
#[async_trait]
pub trait StageInvoker<I, O>: Send + Sync {
    /// Run the stage and wait for its output.
    async fn call(&self, input: I) -> SchedulingResult<O>;

    /// Hand the input to the stage and return once it is accepted. The
    /// stage's outcome is not reported back.
    async fn trigger(&self, input: I) -> SchedulingResult<()>;
}

/// Runs a [`StageHandler`] in the current process.
pub struct LocalStage<H> {
    name: &'static str,
    handler: Arc<H>,
    timeout: Duration,
    triggered: Mutex<JoinSet<()>>,
}

impl<H> LocalStage<H> {
    pub fn new(name: &'static str, handler: H, timeout: Duration) -> Self {
        Self {
            name,
            handler: Arc::new(handler),
            timeout,
            triggered: Mutex::new(JoinSet::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for every triggered invocation that is still running.
    pub async fn wait_idle(&self) {
        let mut triggered = std::mem::take(&mut *self.triggered.lock().await);
        while let Some(joined) = triggered.join_next().await {
            if let Err(e) = joined {
                warn!(stage = self.name, error = %e, "Triggered stage task aborted");
            }
        }
    }
}

#[async_trait]
impl<I, O, H> StageInvoker<I, O> for LocalStage<H>
where
    I: Send + 'static,
    O: Send + 'static,
    H: StageHandler<I, O>,
{
    async fn call(&self, input: I) -> SchedulingResult<O> {
        deadline(self.name, self.timeout, self.handler.handle(input)).await?
    }

    async fn trigger(&self, input: I) -> SchedulingResult<()> {
        let name = self.name;
        let timeout = self.timeout;
        let handler = Arc::clone(&self.handler);

        let mut triggered = self.triggered.lock().await;
        // Reap finished invocations so the set only holds running ones.
        while triggered.try_join_next().is_some() {}

        triggered.spawn(async move {
            match deadline(name, timeout, handler.handle(input)).await {
                Ok(Ok(_)) => debug!(stage = name, "Triggered stage completed"),
                Ok(Err(e)) => error!(stage = name, error = %e, "Triggered stage failed"),
                Err(e) => error!(stage = name, error = %e, "Triggered stage timed out"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::SchedulingError;

    struct Doubler {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl StageHandler<u32, u32> for Doubler {
        async fn handle(&self, input: u32) -> SchedulingResult<u32> {
            tokio::time::sleep(self.delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input == 0 {
                return Err(SchedulingError::Invoke("zero".to_string()));
            }
            Ok(input * 2)
        }
    }

    fn stage(delay: Duration) -> LocalStage<Doubler> {
        LocalStage::new(
            "doubler",
            Doubler {
                calls: AtomicUsize::new(0),
                delay,
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_call_returns_output() {
        let stage = stage(Duration::ZERO);
        assert_eq!(stage.name(), "doubler");
        assert_eq!(stage.call(21u32).await.unwrap(), 42);
        assert!(matches!(stage.call(0u32).await, Err(SchedulingError::Invoke(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out() {
        let stage = stage(Duration::from_secs(60));

        let err = stage.call(1u32).await.unwrap_err();

        assert!(matches!(err, SchedulingError::Timeout(d) if d.operation == "doubler"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_returns_before_completion() {
        let stage = stage(Duration::from_secs(1));

        stage.trigger(1u32).await.unwrap();
        stage.trigger(0u32).await.unwrap();
        assert_eq!(stage.handler.calls.load(Ordering::SeqCst), 0);

        stage.wait_idle().await;
        assert_eq!(stage.handler.calls.load(Ordering::SeqCst), 2);
    }
}
