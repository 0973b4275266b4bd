use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::JobError;

/// Run `job` every `every` until `cancel` fires.
///
/// A run that outlasts the period delays the next tick instead of queueing
/// extra ones, so runs of the same job never overlap. A failed run is logged
/// and the next tick tries again.
pub fn spawn_periodic<F, Fut, E>(
    name: &'static str,
    every: Duration,
    cancel: CancellationToken,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Debug + Send,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer.tick().await; // skip immediate first tick

        info!(job = name, every_secs = every.as_secs_f64(), "periodic job started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(job = name, "periodic job cancelled");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(e) = job().await {
                        warn!(job = name, error = ?e, "periodic job run failed");
                    }
                }
            }
        }
    })
}

/// GET `url` and require a success status.
pub async fn keep_alive(client: &reqwest::Client, url: &str) -> Result<(), Report<JobError>> {
    let context = || JobError::KeepAlive { url: url.into() };

    let response = client
        .get(url)
        .send()
        .await
        .change_context_lazy(context)?;

    let status = response.status();
    if !status.is_success() {
        return Err(Report::new(context()).attach(format!("HTTP status: {status}")));
    }

    debug!(url, %status, "keep-alive ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn failing_runs_do_not_stop_the_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let counter = Arc::clone(&runs);
        let handle = spawn_periodic("test", Duration::from_millis(10), cancel.clone(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            }
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn cancelled_job_stops_running() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let counter = Arc::clone(&runs);
        let handle = spawn_periodic("test", Duration::from_secs(3600), cancel, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ()>(())
            }
        });

        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keep_alive_checks_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        keep_alive(&client, &format!("{}/api/", server.uri()))
            .await
            .unwrap();

        let err = keep_alive(&client, &format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), JobError::KeepAlive { .. }));
    }
}
