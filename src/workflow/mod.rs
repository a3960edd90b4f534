use anyhow::{bail, Result};
use std::future::Future;
use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};
use tracing::info;

use crate::blockade::types::{GeneratorField, ImaginePoll, SkyboxStyleField};
use crate::blockade::BlockadeClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600); // 10 minutes

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation — cooperative only; there is no server-side abort, so
// cancelling just stops re-polling between checks.
// ---------------------------------------------------------------------------

pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle fires. A dropped handle can never cancel,
    /// so in that case this never resolves.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Generation workflows — submit, poll to completion, download
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub job_id: i32,
    pub prompt: String,
    pub file_url: String,
    pub bytes: Vec<u8>,
}

/// Generate a 360° skybox: submit the prompt fields for `style_id`, poll the
/// job until complete, then download the panorama.
pub async fn run_skybox_generation(
    client: &BlockadeClient,
    fields: &[SkyboxStyleField],
    style_id: i32,
    config: &WorkflowConfig,
    cancel: CancelToken,
) -> Result<GeneratedImage> {
    let job_id = client.create_skybox(fields, style_id).await?;
    info!(job_id, style_id, "skybox job submitted");
    finish_job(client, job_id, config, cancel).await
}

/// Generate an image through a named generator backend.
pub async fn run_imagine_generation(
    client: &BlockadeClient,
    fields: &[GeneratorField],
    generator: &str,
    config: &WorkflowConfig,
    cancel: CancelToken,
) -> Result<GeneratedImage> {
    let job_id = client.create_imagine(fields, generator).await?;
    info!(job_id, generator, "imagine job submitted");
    finish_job(client, job_id, config, cancel).await
}

async fn finish_job(
    client: &BlockadeClient,
    job_id: i32,
    config: &WorkflowConfig,
    cancel: CancelToken,
) -> Result<GeneratedImage> {
    let (file_url, prompt) =
        poll_until_complete(move || client.get_imagine(job_id), config, cancel).await?;

    let bytes = client.download_image(&file_url).await?;
    info!(job_id, size = bytes.len(), "generated image downloaded");

    Ok(GeneratedImage {
        job_id,
        prompt,
        file_url,
        bytes,
    })
}

/// Drive single-shot status checks until the job reports complete, the
/// overall timeout elapses, or the token fires. Cancellation is observed
/// between checks, never mid-request.
async fn poll_until_complete<F, Fut>(
    mut check: F,
    config: &WorkflowConfig,
    mut cancel: CancelToken,
) -> Result<(String, String)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ImaginePoll>>,
{
    let start = Instant::now();
    loop {
        if start.elapsed() > config.poll_timeout {
            bail!(
                "generation timed out after {}s",
                config.poll_timeout.as_secs()
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => bail!("generation cancelled"),
            _ = sleep(config.poll_interval) => {}
        }

        match check().await? {
            ImaginePoll::Complete { file_url, prompt } => return Ok((file_url, prompt)),
            ImaginePoll::Pending { status } => {
                info!(status = %status, "job still in progress");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests — loop behavior under paused time, checks injected as closures
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig {
            poll_interval: Duration::from_secs(3),
            poll_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_pending_polls() {
        let calls = Cell::new(0);
        let (_handle, token) = cancel_channel();

        let result = poll_until_complete(
            || {
                calls.set(calls.get() + 1);
                let done = calls.get() >= 3;
                async move {
                    if done {
                        Ok(ImaginePoll::Complete {
                            file_url: "http://x/y.png".to_string(),
                            prompt: "a forest".to_string(),
                        })
                    } else {
                        Ok(ImaginePoll::Pending {
                            status: "dispatched".to_string(),
                        })
                    }
                }
            },
            &fast_config(),
            token,
        )
        .await
        .unwrap();

        assert_eq!(calls.get(), 3);
        assert_eq!(result.0, "http://x/y.png");
        assert_eq!(result.1, "a forest");
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_stops_before_the_first_check() {
        let (handle, token) = cancel_channel();
        handle.cancel();

        let calls = Cell::new(0);
        let err = poll_until_complete(
            || {
                calls.set(calls.get() + 1);
                async {
                    Ok(ImaginePoll::Pending {
                        status: "dispatched".to_string(),
                    })
                }
            },
            &fast_config(),
            token,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn never_completing_job_hits_the_overall_timeout() {
        let (_handle, token) = cancel_channel();
        let err = poll_until_complete(
            || async {
                Ok(ImaginePoll::Pending {
                    status: "pending".to_string(),
                })
            },
            &fast_config(),
            token,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn check_errors_abort_the_loop() {
        let (_handle, token) = cancel_channel();
        let err = poll_until_complete(
            || async { anyhow::bail!("imagine status API error 500") },
            &fast_config(),
            token,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("500"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_never_cancels() {
        let (handle, token) = cancel_channel();
        drop(handle);

        let calls = Cell::new(0);
        let result = poll_until_complete(
            || {
                calls.set(calls.get() + 1);
                let done = calls.get() >= 2;
                async move {
                    if done {
                        Ok(ImaginePoll::Complete {
                            file_url: "http://x/z.png".to_string(),
                            prompt: String::new(),
                        })
                    } else {
                        Ok(ImaginePoll::Pending {
                            status: "dispatched".to_string(),
                        })
                    }
                }
            },
            &fast_config(),
            token,
        )
        .await
        .unwrap();

        assert_eq!(result.0, "http://x/z.png");
    }

    #[test]
    fn token_reports_cancelled_state() {
        let (handle, token) = cancel_channel();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
