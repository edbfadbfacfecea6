//! Job dispatcher
//!
//! The worker's main loop. For each job it:
//! 1. Waits until the worker is not paused
//! 2. Pops the next message from the shared queue (blocking)
//! 3. Parses it; malformed messages are logged and dropped
//! 4. Starts the heartbeat and checks admission; rejected jobs go back to
//!    the tail of the queue followed by a backoff
//! 5. Runs the handler for the job type and applies the retry policy on error
//! 6. Stops the heartbeat and deletes the record, on every path
//!
//! Jobs are processed strictly one at a time. Nothing that happens while
//! processing a job escapes the per-job scope.

use anyhow::{Context, Result};
use cluster_core::domain::job::{Job, JobOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::handlers::{HandlerRegistry, Resolution};
use crate::repository::{HeartbeatStore, JobQueue};
use crate::scheduler::heartbeat::HeartbeatPublisher;
use crate::scheduler::ready::ReadyGate;
use crate::service::{CapabilityMatcher, RetryDecision, RetryPolicy};

/// Pause after a failed queue pop before trying again
const POP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What happened to one popped message
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Not a valid job; dropped without re-queue
    Discarded,

    /// Failed admission; pushed back to the tail of the queue
    Requeued,

    /// Ran through a handler (or had none)
    Completed(JobOutcome),

    /// An unexpected error or handler panic; dropped for this iteration
    Failed,
}

/// Pulls jobs from the queue and sees each one through to completion
pub struct JobDispatcher {
    config: Arc<Config>,
    queue: Arc<dyn JobQueue>,
    heartbeats: Arc<dyn HeartbeatStore>,
    publisher: HeartbeatPublisher,
    matcher: Arc<dyn CapabilityMatcher>,
    registry: Arc<HandlerRegistry>,
    retry: RetryPolicy,
    ready: ReadyGate,
}

impl JobDispatcher {
    /// Creates a new dispatcher
    ///
    /// Heartbeat interval, retry limit and reject backoff are taken from
    /// `config`.
    pub fn new(
        config: Arc<Config>,
        queue: Arc<dyn JobQueue>,
        heartbeats: Arc<dyn HeartbeatStore>,
        matcher: Arc<dyn CapabilityMatcher>,
        registry: Arc<HandlerRegistry>,
        ready: ReadyGate,
    ) -> Self {
        let publisher = HeartbeatPublisher::new(
            Arc::clone(&heartbeats),
            config.worker_name.clone(),
            config.heartbeat_interval(),
            config.timezone,
        );
        let retry = RetryPolicy::new(config.max_retries);

        Self {
            config,
            queue,
            heartbeats,
            publisher,
            matcher,
            registry,
            retry,
            ready,
        }
    }

    /// Runs the dispatch loop until shutdown
    ///
    /// Shutdown is only observed between jobs; a job already popped is
    /// always processed to the end, cleanup included.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("Worker started. Waiting for jobs...");

        let mut gate = self.ready.clone();

        loop {
            if !gate.is_ready() {
                info!("Worker paused; waiting for resume");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = gate.wait_ready() => {}
            }

            let popped = tokio::select! {
                _ = shutdown.cancelled() => break,
                popped = self.queue.pop() => popped,
            };

            match popped {
                Ok(message) => {
                    let disposition = self.process(&message).await;
                    debug!("Message disposition: {:?}", disposition);
                }
                Err(e) => {
                    error!("Failed to pop next job: {:#}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POP_RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    /// Processes one raw queue message end to end
    pub async fn process(&self, message: &[u8]) -> Disposition {
        let job = match Job::from_message(message) {
            Ok(job) => job,
            Err(e) => {
                error!("Received malformed job: {}", e);
                return Disposition::Discarded;
            }
        };

        let job_id = job.id();
        let heartbeat = self.publisher.start(job_id.clone());

        info!(
            "[{}] Received job of type '{}'",
            job_id,
            job.job_type().unwrap_or("<none>")
        );

        let disposition = match self.handle(&job, message).await {
            Ok(disposition) => disposition,
            Err(e) => {
                error!("[{}] Unexpected error while handling job: {:#}", job_id, e);
                Disposition::Failed
            }
        };

        let beats = heartbeat.beats();
        heartbeat.stop().await;
        if let Err(e) = self.heartbeats.clear(&self.config.worker_name).await {
            warn!("[{}] Failed to clear heartbeat: {:#}", job_id, e);
        }
        debug!("[{}] Heartbeat cleared after {} beat(s)", job_id, beats);

        if disposition == Disposition::Requeued {
            tokio::time::sleep(self.config.reject_backoff()).await;
        }

        disposition
    }

    /// Admission, dispatch and retry for a parsed job
    async fn handle(&self, job: &Job, message: &[u8]) -> Result<Disposition> {
        let job_id = job.id();

        let admission = self.matcher.evaluate(job.job_type()).await;
        if !admission.is_accepted() {
            info!("[{}] {}", job_id, admission);
            info!("[{}] Re-queuing due to insufficient resources.", job_id);
            self.queue
                .push(message)
                .await
                .context("Failed to re-queue rejected job")?;
            return Ok(Disposition::Requeued);
        }

        let outcome = self.dispatch(job).await?;

        match &outcome {
            JobOutcome::Success => info!("[{}] Job completed successfully", job_id),
            JobOutcome::Unsupported => {}
            JobOutcome::Error { detail } => {
                warn!("[{}] Handler reported an error: {}", job_id, detail);
                self.apply_retry(job).await?;
            }
        }

        Ok(Disposition::Completed(outcome))
    }

    /// Runs the handler for the job's type in its own task
    ///
    /// A handler panic surfaces as an error here rather than unwinding
    /// through the dispatcher.
    async fn dispatch(&self, job: &Job) -> Result<JobOutcome> {
        let job_id = job.id();
        let job_type = job.job_type().unwrap_or_default().to_string();

        let handler = match self.registry.resolve(&job_type) {
            Resolution::Handler(handler) => handler,
            Resolution::Unsupported => {
                warn!("[{}] Unsupported job type: {}", job_id, job_type);
                return Ok(JobOutcome::Unsupported);
            }
        };

        let task_job = job.clone();
        let config = Arc::clone(&self.config);
        let task = tokio::spawn(async move { handler.handle(&task_job, &config).await });

        match task.await {
            Ok(outcome) => Ok(outcome.into()),
            Err(e) if e.is_panic() => {
                anyhow::bail!("handler for '{}' panicked", job_type)
            }
            Err(e) => Err(e).context("handler task did not complete"),
        }
    }

    async fn apply_retry(&self, job: &Job) -> Result<()> {
        let job_id = job.id();

        match self.retry.decide(job) {
            RetryDecision::Requeue(next) => {
                info!(
                    "[{}] Re-queuing job (attempt {}/{})",
                    job_id,
                    next.retries(),
                    self.retry.max_retries()
                );
                let message = next.to_message()?;
                self.queue
                    .push(message.as_bytes())
                    .await
                    .context("Failed to re-queue failed job")?;
            }
            RetryDecision::GiveUp { retries } => {
                error!(
                    "[{}] Job failed after {} retries. Giving up.",
                    job_id, retries
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerOutcome, JobHandler};
    use crate::scheduler::ready::{ReadySwitch, ready_flag};
    use crate::service::StandardCapabilityMatcher;
    use crate::testing::{FixedResourceMonitor, MemoryHeartbeatStore, MemoryQueue};
    use async_trait::async_trait;
    use cluster_core::domain::capability::Capability;
    use serde_json::Value;
    use tokio::time::Instant;

    struct FailingHandler;

    #[async_trait]
    impl JobHandler for FailingHandler {
        async fn handle(&self, _job: &Job, _config: &Config) -> HandlerOutcome {
            HandlerOutcome::error("encoder crashed")
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn handle(&self, _job: &Job, _config: &Config) -> HandlerOutcome {
            panic!("handler bug")
        }
    }

    /// Handler that takes a while, so heartbeats tick during the job
    struct SlowHandler;

    #[async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, _job: &Job, _config: &Config) -> HandlerOutcome {
            tokio::time::sleep(Duration::from_secs(12)).await;
            HandlerOutcome::Success
        }
    }

    struct Harness {
        dispatcher: Arc<JobDispatcher>,
        queue: Arc<MemoryQueue>,
        heartbeats: Arc<MemoryHeartbeatStore>,
        monitor: Arc<FixedResourceMonitor>,
        switch: ReadySwitch,
    }

    fn harness() -> Harness {
        let config = Config::new("node-a", "/srv/shared", "localhost")
            .with_capability(Capability::new("job-test"))
            .with_capability(Capability::new("compress-video"))
            .with_capability(Capability::new("always-fails"))
            .with_capability(Capability::new("panics"))
            .with_capability(Capability::new("slow"))
            .with_capability(Capability::new("render"));

        let queue = Arc::new(MemoryQueue::new());
        let heartbeats = Arc::new(MemoryHeartbeatStore::new());
        let monitor = Arc::new(FixedResourceMonitor::new(5.0, 8192.0));
        let matcher = Arc::new(StandardCapabilityMatcher::new(
            config.capabilities.clone(),
            monitor.clone(),
        ));

        let mut registry = HandlerRegistry::with_builtins();
        registry.register("always-fails", FailingHandler);
        registry.register("panics", PanickingHandler);
        registry.register("slow", SlowHandler);

        let (switch, gate) = ready_flag(true);

        let dispatcher = JobDispatcher::new(
            Arc::new(config),
            queue.clone(),
            heartbeats.clone(),
            matcher,
            Arc::new(registry),
            gate,
        );

        Harness {
            dispatcher: Arc::new(dispatcher),
            queue,
            heartbeats,
            monitor,
            switch,
        }
    }

    fn as_json(message: &str) -> Value {
        serde_json::from_str(message).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_job_completes_and_clears_heartbeat() {
        let h = harness();
        h.queue.seed(r#"{"id":"1","job_type":"job-test"}"#);

        let message = h.queue.pop().await.unwrap();
        let disposition = h.dispatcher.process(&message).await;

        assert_eq!(disposition, Disposition::Completed(JobOutcome::Success));
        assert!(h.heartbeats.writes().iter().any(|r| r.job_id == "1"));
        assert!(h.heartbeats.current("node-a").is_none());
        assert_eq!(h.heartbeats.clears(), 1);
        assert!(h.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_exists_only_while_processing() {
        let h = harness();
        assert!(h.heartbeats.current("node-a").is_none());

        let dispatcher = h.dispatcher.clone();
        let task = tokio::spawn(async move {
            dispatcher
                .process(r#"{"id":"s1","job_type":"slow"}"#.as_bytes())
                .await
        });

        tokio::time::sleep(Duration::from_secs(6)).await;
        let record = h.heartbeats.current("node-a").expect("heartbeat while running");
        assert_eq!(record.job_id, "s1");

        let disposition = task.await.unwrap();
        assert_eq!(disposition, Disposition::Completed(JobOutcome::Success));
        assert!(h.heartbeats.writes().len() >= 3);
        assert!(h.heartbeats.current("node-a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_is_retried_with_incremented_counter() {
        let h = harness();
        let message = r#"{"id":"3","job_type":"always-fails","input":"a.mov","retries":1}"#;

        let disposition = h.dispatcher.process(message.as_bytes()).await;
        assert!(matches!(
            disposition,
            Disposition::Completed(JobOutcome::Error { .. })
        ));

        let requeued = h.queue.drain();
        assert_eq!(requeued.len(), 1);

        let mut expected = as_json(message);
        expected["retries"] = Value::from(2);
        assert_eq!(as_json(&requeued[0]), expected);
        assert!(h.heartbeats.current("node-a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_adds_retry_counter() {
        let h = harness();
        h.dispatcher
            .process(r#"{"id":"4","job_type":"always-fails"}"#.as_bytes())
            .await;

        let requeued = h.queue.drain();
        assert_eq!(as_json(&requeued[0])["retries"], Value::from(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_drop_the_job() {
        let h = harness();
        h.queue.seed(r#"{"id":"5","job_type":"always-fails","retries":3}"#);

        let message = h.queue.pop().await.unwrap();
        h.dispatcher.process(&message).await;

        assert!(h.queue.is_empty());
        assert_eq!(h.queue.pushes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_retried_three_times_then_dropped() {
        let h = harness();
        h.queue.seed(r#"{"id":"6","job_type":"always-fails"}"#);

        let mut executions = 0;
        while !h.queue.is_empty() {
            let message = h.queue.pop().await.unwrap();
            h.dispatcher.process(&message).await;
            executions += 1;
        }

        assert_eq!(executions, 4);
        assert_eq!(h.queue.pushes(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_cpu_requeues_verbatim_with_backoff() {
        let h = harness();
        h.monitor.set(80.0, 8192.0);
        let message = r#"{"id":"2","job_type":"compress-video","input":"a.mov","output":"a.mp4"}"#;

        let started = Instant::now();
        let disposition = h.dispatcher.process(message.as_bytes()).await;

        assert_eq!(disposition, Disposition::Requeued);
        assert_eq!(h.queue.drain(), vec![message.to_string()]);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(h.heartbeats.current("node-a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_capability_requeues() {
        let h = harness();
        let message = r#"{"id":"7","job_type":"transcribe-audio"}"#;

        assert_eq!(h.dispatcher.process(message.as_bytes()).await, Disposition::Requeued);
        assert_eq!(h.queue.drain(), vec![message.to_string()]);
        assert_eq!(h.monitor.samples(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_handler_is_unsupported_and_not_retried() {
        let h = harness();

        let disposition = h
            .dispatcher
            .process(r#"{"id":"8","job_type":"render"}"#.as_bytes())
            .await;

        assert_eq!(disposition, Disposition::Completed(JobOutcome::Unsupported));
        assert_eq!(h.queue.pushes(), 0);
        assert!(h.heartbeats.current("node-a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_message_is_discarded() {
        let h = harness();
        h.queue.seed("{not json");

        let message = h.queue.pop().await.unwrap();
        assert_eq!(h.dispatcher.process(&message).await, Disposition::Discarded);

        assert!(h.heartbeats.writes().is_empty());
        assert_eq!(h.queue.pushes(), 0);
        assert!(h.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_is_contained() {
        let h = harness();

        let disposition = h
            .dispatcher
            .process(r#"{"id":"9","job_type":"panics"}"#.as_bytes())
            .await;

        assert_eq!(disposition, Disposition::Failed);
        assert_eq!(h.queue.pushes(), 0);
        assert!(h.heartbeats.current("node-a").is_none());
        assert_eq!(h.heartbeats.clears(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_requeue_push_is_contained() {
        let h = harness();
        h.queue.fail_pushes(true);

        let disposition = h
            .dispatcher
            .process(r#"{"id":"10","job_type":"always-fails"}"#.as_bytes())
            .await;

        assert_eq!(disposition, Disposition::Failed);
        assert!(h.heartbeats.current("node-a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pop_while_paused() {
        let h = harness();
        h.switch.pause();
        h.queue.seed(r#"{"id":"11","job_type":"job-test"}"#);

        let shutdown = CancellationToken::new();
        let dispatcher = h.dispatcher.clone();
        let token = shutdown.clone();
        let run = tokio::spawn(async move { dispatcher.run(token).await });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.queue.pops(), 0);
        assert_eq!(h.queue.len(), 1);

        h.switch.resume();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.queue.pops(), 1);
        assert!(h.queue.is_empty());

        shutdown.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_processes_queue_in_order() {
        let h = harness();
        h.queue.seed(r#"{"id":"a","job_type":"job-test"}"#);
        h.queue.seed("{not json");
        h.queue.seed(r#"{"id":"b","job_type":"job-test"}"#);

        let shutdown = CancellationToken::new();
        let dispatcher = h.dispatcher.clone();
        let token = shutdown.clone();
        let run = tokio::spawn(async move { dispatcher.run(token).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.queue.pops(), 3);
        assert!(h.queue.is_empty());

        let jobs: Vec<String> = h.heartbeats.writes().into_iter().map(|r| r.job_id).collect();
        assert_eq!(jobs, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(h.heartbeats.clears(), 2);

        shutdown.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_waiting_for_jobs() {
        let h = harness();
        let shutdown = CancellationToken::new();
        let dispatcher = h.dispatcher.clone();
        let token = shutdown.clone();
        let run = tokio::spawn(async move { dispatcher.run(token).await });

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.cancel();

        assert!(run.await.unwrap().is_ok());
        assert_eq!(h.queue.pops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_pop_retry_delay() {
        let h = harness();
        h.queue.fail_pops(true);

        let shutdown = CancellationToken::new();
        let dispatcher = h.dispatcher.clone();
        let token = shutdown.clone();
        let run = tokio::spawn(async move { dispatcher.run(token).await });

        while h.queue.pops() == 0 {
            tokio::task::yield_now().await;
        }

        let started = Instant::now();
        shutdown.cancel();
        run.await.unwrap().unwrap();

        assert!(started.elapsed() < POP_RETRY_DELAY);
        assert_eq!(h.queue.pops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_utf8_message_is_discarded_like_malformed() {
        let h = harness();
        h.queue
            .seed_bytes(b"{\"id\":\"12\",\"job_type\":\"job-test\",\"note\":\"\xff\"}");
        h.queue.seed(r#"{"id":"13","job_type":"job-test"}"#);

        let shutdown = CancellationToken::new();
        let dispatcher = h.dispatcher.clone();
        let token = shutdown.clone();
        let run = tokio::spawn(async move { dispatcher.run(token).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.queue.pops(), 2);
        assert_eq!(h.queue.pushes(), 0);

        let jobs: Vec<String> = h.heartbeats.writes().into_iter().map(|r| r.job_id).collect();
        assert_eq!(jobs, vec!["13".to_string()]);

        shutdown.cancel();
        run.await.unwrap().unwrap();
    }
}
