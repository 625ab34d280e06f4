//! `PENDING -> PENDING | DONE_OK | DONE_EMPTY | TIMEOUT`

use crate::error::VeoResult;
use crate::operation::{GeneratedMedia, Operation, OperationState};
use crate::{logi, logok, logw};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait OperationSource: Send + Sync {
    async fn fetch_operation(&self, model_id: &str, operation_name: &str) -> VeoResult<Operation>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Succeeded {
        operation: Operation,
        media: GeneratedMedia,
    },
    Empty { operation: Operation },
    /// Still running remotely; resume with the same operation name.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub operation_name: String,
    pub outcome: PollOutcome,
    pub elapsed: Duration,
    pub poll_count: u32,
}

impl PollReport {
    pub fn is_done(&self) -> bool {
        !matches!(self.outcome, PollOutcome::TimedOut)
    }

    pub fn response(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            PollOutcome::Succeeded { operation, .. } | PollOutcome::Empty { operation } => {
                operation.response.as_ref()
            }
            PollOutcome::TimedOut => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    max_wait: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_WAIT)
    }
}

impl Poller {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// First check is immediate; a timed-out report has
    /// `max_wait <= elapsed < max_wait + interval`, even with slow status calls.
    pub async fn wait<S>(
        &self,
        source: &S,
        model_id: &str,
        operation_name: &str,
    ) -> VeoResult<PollReport>
    where
        S: OperationSource + ?Sized,
    {
        let started = Instant::now();
        let hard_stop = started + self.max_wait + self.interval / 2;
        let mut poll_count = 0u32;

        loop {
            poll_count += 1;
            let fetched = tokio::time::timeout_at(
                hard_stop,
                source.fetch_operation(model_id, operation_name),
            )
            .await;
            let elapsed = started.elapsed();
            let operation = match fetched {
                Ok(result) => result?,
                Err(_) => {
                    logw(format!(
                        "Status check for {} did not answer before the wait budget ran out",
                        operation_name
                    ));
                    return Ok(PollReport {
                        operation_name: operation_name.to_string(),
                        outcome: PollOutcome::TimedOut,
                        elapsed,
                        poll_count,
                    });
                }
            };

            match operation.state() {
                OperationState::Succeeded(media) => {
                    logok(format!(
                        "Operation {} finished after {} checks ({}s)",
                        operation_name,
                        poll_count,
                        elapsed.as_secs()
                    ));
                    return Ok(PollReport {
                        operation_name: operation_name.to_string(),
                        outcome: PollOutcome::Succeeded { operation, media },
                        elapsed,
                        poll_count,
                    });
                }
                OperationState::Empty => {
                    let reason = operation
                        .error
                        .as_ref()
                        .and_then(|e| e.message.clone())
                        .unwrap_or_else(|| "no media in response".to_string());
                    logw(format!(
                        "Operation {} finished without media: {}",
                        operation_name, reason
                    ));
                    return Ok(PollReport {
                        operation_name: operation_name.to_string(),
                        outcome: PollOutcome::Empty { operation },
                        elapsed,
                        poll_count,
                    });
                }
                OperationState::Pending => {}
            }

            if elapsed >= self.max_wait {
                logw(format!(
                    "Stopped waiting for {} after {}s; it is still running remotely",
                    operation_name,
                    elapsed.as_secs()
                ));
                return Ok(PollReport {
                    operation_name: operation_name.to_string(),
                    outcome: PollOutcome::TimedOut,
                    elapsed,
                    poll_count,
                });
            }

            tracing::debug!(
                operation = operation_name,
                poll_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "operation still running"
            );
            if poll_count == 1 || poll_count % 5 == 0 {
                logi(format!(
                    "Check {}: {} still processing ({}s elapsed)",
                    poll_count,
                    operation_name,
                    elapsed.as_secs()
                ));
            }

            let remaining = self.max_wait.saturating_sub(elapsed);
            tokio::time::sleep(self.interval.min(remaining)).await;
        }
    }
}
