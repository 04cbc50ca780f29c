//! Turns watch requests and the refresh tick into bridge triggers.

use std::future::Future;

use simplicity_bridge::Trigger;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Interval;

/// Tick on `ticker` if periodic refresh is enabled, otherwise never.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Feed `on_trigger` until `shutdown` resolves.
///
/// Every line read from `requests` and every tick of `ticker` becomes a
/// [`Trigger::AppMessage`]. End of input only stops the line source.
pub async fn pump<R, S, F>(
    requests: R,
    mut ticker: Option<Interval>,
    shutdown: S,
    mut on_trigger: F,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
    F: FnMut(Trigger),
{
    let mut lines = requests.lines();
    let mut requests_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = next_tick(&mut ticker) => {
                tracing::debug!("Refresh interval elapsed");
                on_trigger(Trigger::AppMessage);
            }
            line = lines.next_line(), if requests_open => match line? {
                Some(_) => {
                    tracing::info!("Got a message - Starting weather request...");
                    on_trigger(Trigger::AppMessage);
                }
                None => {
                    tracing::debug!("Request stream closed, relying on periodic refresh");
                    requests_open = false;
                }
            },
            _ = &mut shutdown => return Ok(()),
        }
    }
}
