//! Transmission controller: single and repeated writes.
//!
//! At most one repeat job exists. Starting a job, stopping one and every
//! state change a running job makes happen under the job-slot lock, and a
//! job only touches state after confirming under that lock that it still
//! owns the slot. A write that is in flight when the job is cancelled is
//! not aborted; its result is disregarded.
//!
//! The first write of a job happens one interval after it starts, and
//! completion is reported on the tick after the last write.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use nrfgate_types::{Message, RepeatPolicy};

use crate::error::{Error, Result};
use crate::events::{JobOutcome, SessionEvent, StopReason};
use crate::reporter::Reporter;
use crate::traits::MessageLink;

#[derive(Debug)]
struct ActiveJob {
    id: u64,
    token: CancellationToken,
    sent: Arc<AtomicU32>,
}

type JobSlot = Arc<Mutex<Option<ActiveJob>>>;

/// Owns the job slot.
#[derive(Debug)]
pub struct TransmissionController {
    reporter: Arc<Reporter>,
    slot: JobSlot,
    next_id: AtomicU64,
}

impl TransmissionController {
    /// Create an idle controller.
    pub fn new(reporter: Arc<Reporter>) -> Self {
        Self {
            reporter,
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Whether a repeat job is running.
    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Id of the running job, if any.
    pub async fn active_job(&self) -> Option<u64> {
        self.slot.lock().await.as_ref().map(|job| job.id)
    }

    /// Cancel the running job.
    ///
    /// Returns `false`, without logging anything, when no job is running.
    pub async fn stop(&self, reason: StopReason) -> bool {
        let mut slot = self.slot.lock().await;
        self.cancel_locked(&mut slot, reason).await
    }

    async fn cancel_locked(&self, slot: &mut Option<ActiveJob>, reason: StopReason) -> bool {
        let Some(job) = slot.take() else {
            return false;
        };
        job.token.cancel();
        let sent = job.sent.load(Ordering::SeqCst);
        debug!(job_id = job.id, ?reason, sent, "Job cancelled");

        self.reporter.info("Repeat transmission stopped.").await;
        self.reporter.emit(SessionEvent::JobFinished {
            job_id: job.id,
            outcome: JobOutcome::Stopped { sent, reason },
        });
        self.reporter.set_job_active(false).await;
        true
    }

    /// Replace any running job with a new one writing `message`
    /// `policy.repeat_count` times, `policy.interval_ms` apart.
    ///
    /// `still_connected` is awaited under the job-slot lock. A teardown
    /// clears the handle before it stops the job, so a `false` here means
    /// the link is gone and no job is installed. Returns the new job's id.
    pub async fn start<F>(
        &self,
        link: Arc<dyn MessageLink>,
        message: Message,
        policy: RepeatPolicy,
        still_connected: F,
    ) -> Result<u64>
    where
        F: Future<Output = bool>,
    {
        let mut slot = self.slot.lock().await;
        if !still_connected.await {
            debug!("Link released before the job could start");
            return Err(Error::NotConnected);
        }
        self.cancel_locked(&mut slot, StopReason::Superseded).await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let sent = Arc::new(AtomicU32::new(0));
        *slot = Some(ActiveJob {
            id,
            token: token.clone(),
            sent: Arc::clone(&sent),
        });

        self.reporter
            .success(format!(
                "Repeat transmission started: \"{}\" ({} times @ {}ms)",
                message, policy.repeat_count, policy.interval_ms
            ))
            .await;
        self.reporter.emit(SessionEvent::JobStarted {
            job_id: id,
            message: message.text().to_string(),
            total: policy.repeat_count,
            interval_ms: policy.interval_ms,
        });
        self.reporter.set_job_active(true).await;

        let job = JobRunner {
            id,
            link,
            message,
            total: policy.repeat_count,
            period: policy.period(),
            token,
            sent,
            slot: Arc::clone(&self.slot),
            reporter: Arc::clone(&self.reporter),
        };
        tokio::spawn(job.run());

        Ok(id)
    }

    /// Cancel any running job, then write `message` once, immediately.
    pub async fn write_once(&self, link: &dyn MessageLink, message: &Message) -> Result<()> {
        self.stop(StopReason::Superseded).await;

        match link.write(message.as_bytes()).await {
            Ok(()) => {
                self.reporter
                    .success(format!("Sent once: \"{}\"", message))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.reporter.error(format!("Send error: {}", e)).await;
                Err(e)
            }
        }
    }
}

struct JobRunner {
    id: u64,
    link: Arc<dyn MessageLink>,
    message: Message,
    total: u32,
    period: Duration,
    token: CancellationToken,
    sent: Arc<AtomicU32>,
    slot: JobSlot,
    reporter: Arc<Reporter>,
}

impl JobRunner {
    fn owns(&self, slot: &Option<ActiveJob>) -> bool {
        !self.token.is_cancelled() && slot.as_ref().is_some_and(|job| job.id == self.id)
    }

    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if sent >= self.total {
                let mut slot = self.slot.lock().await;
                if !self.owns(&slot) {
                    return;
                }
                slot.take();
                self.token.cancel();

                self.reporter
                    .info(format!("All sends complete ({} times).", self.total))
                    .await;
                self.reporter.emit(SessionEvent::JobFinished {
                    job_id: self.id,
                    outcome: JobOutcome::Completed { sent },
                });
                self.reporter.emit(SessionEvent::InputCleared);
                self.reporter.set_job_active(false).await;
                return;
            }

            let result = self.link.write(self.message.as_bytes()).await;

            let mut slot = self.slot.lock().await;
            if !self.owns(&slot) {
                debug!(job_id = self.id, "Disregarding write result of cancelled job");
                return;
            }

            match result {
                Ok(()) => {
                    sent += 1;
                    self.sent.store(sent, Ordering::SeqCst);
                    self.reporter
                        .info(format!("Send {}/{} succeeded", sent, self.total))
                        .await;
                    self.reporter.emit(SessionEvent::JobProgress {
                        job_id: self.id,
                        sent,
                        total: self.total,
                    });
                }
                Err(e) => {
                    slot.take();
                    self.token.cancel();

                    self.reporter.error(format!("Fatal send error: {}", e)).await;
                    self.reporter.emit(SessionEvent::JobFinished {
                        job_id: self.id,
                        outcome: JobOutcome::Failed {
                            sent,
                            error: e.to_string(),
                        },
                    });
                    self.reporter.set_job_active(false).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLink, MockLinkBuilder};
    use crate::status::LinkStatus;

    async fn connected_reporter() -> Arc<Reporter> {
        let reporter = Arc::new(Reporter::default());
        reporter.set_status(LinkStatus::Connected).await;
        reporter
    }

    async fn live() -> bool {
        true
    }

    async fn wait_finished(rx: &mut crate::events::EventReceiver, job_id: u64) -> JobOutcome {
        loop {
            if let SessionEvent::JobFinished { job_id: id, outcome } = rx.recv().await.unwrap()
                && id == job_id
            {
                return outcome;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_write_after_one_interval() {
        let reporter = connected_reporter().await;
        let controller = TransmissionController::new(Arc::clone(&reporter));
        let link = Arc::new(MockLink::new("gw"));

        let start = Instant::now();
        let policy = RepeatPolicy::new(1, Duration::from_millis(250));
        let mut rx = reporter.subscribe();
        let id = controller
            .start(link.clone(), Message::new("x").unwrap(), policy, live())
            .await
            .unwrap();

        let outcome = wait_finished(&mut rx, id).await;
        assert_eq!(outcome, JobOutcome::Completed { sent: 1 });

        let writes = link.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].at - start, Duration::from_millis(250));
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let reporter = connected_reporter().await;
        let controller = TransmissionController::new(Arc::clone(&reporter));
        let before = reporter.snapshot().await.len();

        assert!(!controller.stop(StopReason::Requested).await);
        assert_eq!(reporter.snapshot().await.len(), before);

        let link = Arc::new(MockLink::new("gw"));
        controller
            .start(link, Message::new("x").unwrap(), RepeatPolicy::default(), live())
            .await
            .unwrap();
        assert!(controller.stop(StopReason::Requested).await);
        assert!(!controller.stop(StopReason::Requested).await);
        assert!(!controller.is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_halts_job() {
        let reporter = connected_reporter().await;
        let controller = TransmissionController::new(Arc::clone(&reporter));
        let link = Arc::new(MockLinkBuilder::new().fail_on_write(1).build());
        let mut rx = reporter.subscribe();

        let id = controller
            .start(
                link.clone(),
                Message::new("x").unwrap(),
                RepeatPolicy::default(),
                live(),
            )
            .await
            .unwrap();
        let outcome = wait_finished(&mut rx, id).await;

        assert!(matches!(outcome, JobOutcome::Failed { sent: 0, .. }));
        assert_eq!(link.write_attempts(), 1);
        assert!(!controller.is_active().await);
        assert!(reporter.controls().await.send_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_write_result_is_disregarded() {
        let reporter = connected_reporter().await;
        let controller = TransmissionController::new(Arc::clone(&reporter));
        let link = Arc::new(
            MockLinkBuilder::new()
                .write_latency(Duration::from_millis(500))
                .build(),
        );
        let mut rx = reporter.subscribe();

        let policy = RepeatPolicy::new(3, Duration::from_millis(100));
        let id = controller
            .start(link.clone(), Message::new("x").unwrap(), policy, live())
            .await
            .unwrap();

        // First write is in flight between 100ms and 600ms.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(controller.stop(StopReason::Requested).await);

        let outcome = wait_finished(&mut rx, id).await;
        assert_eq!(
            outcome,
            JobOutcome::Stopped {
                sent: 0,
                reason: StopReason::Requested
            }
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(link.write_attempts(), 1);
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, SessionEvent::JobProgress { .. }));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_once_supersedes_job() {
        let reporter = connected_reporter().await;
        let controller = TransmissionController::new(Arc::clone(&reporter));
        let link = Arc::new(MockLink::new("gw"));
        let mut rx = reporter.subscribe();

        let id = controller
            .start(
                link.clone(),
                Message::new("loop").unwrap(),
                RepeatPolicy::default(),
                live(),
            )
            .await
            .unwrap();
        controller
            .write_once(link.as_ref(), &Message::new("now").unwrap())
            .await
            .unwrap();

        assert_eq!(
            wait_finished(&mut rx, id).await,
            JobOutcome::Stopped {
                sent: 0,
                reason: StopReason::Superseded
            }
        );
        assert_eq!(link.payloads(), vec![b"now".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refuses_released_link() {
        let reporter = connected_reporter().await;
        let controller = TransmissionController::new(Arc::clone(&reporter));
        let link = Arc::new(MockLink::new("gw"));
        let mut rx = reporter.subscribe();

        let result = controller
            .start(
                link.clone(),
                Message::new("x").unwrap(),
                RepeatPolicy::new(1, Duration::from_millis(10)),
                async { false },
            )
            .await;
        assert!(matches!(result, Err(Error::NotConnected)));
        assert!(!controller.is_active().await);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(link.write_attempts(), 0);
        while let Ok(event) = rx.try_recv() {
            assert!(!matches!(event, SessionEvent::JobStarted { .. }));
        }
    }
}
