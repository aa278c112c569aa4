use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tracing::{debug, error};

use common::Result;

/// One named side effect to run in isolation.
pub type Effect<'a> = (String, BoxFuture<'a, Result<()>>);

/// Aggregate outcome of [`dispatch_isolated`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: Vec<String>,
    /// `(effect name, reason)` for every effect that errored, timed out or panicked.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Run independent side effects concurrently, each under its own timeout.
///
/// A failing, slow or panicking effect never stops the others. Failures are
/// logged with `label` and the effect's name and collected into the report.
pub async fn dispatch_isolated(
    label: &str,
    effects: Vec<Effect<'_>>,
    timeout: Duration,
) -> DispatchReport {
    let runs = effects.into_iter().map(|(name, fut)| async move {
        let outcome = tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await;
        let result = match outcome {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(_)) => Err("panicked".to_string()),
            Err(_) => Err(format!("timed out after {}s", timeout.as_secs_f32())),
        };
        (name, result)
    });

    let mut report = DispatchReport::default();
    for (name, result) in join_all(runs).await {
        match result {
            Ok(()) => {
                debug!(label, effect = %name, "Side effect completed");
                report.succeeded.push(name);
            }
            Err(reason) => {
                error!(label, effect = %name, error = %reason, "Side effect failed");
                report.failed.push((name, reason));
            }
        }
    }
    report
}
