use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    operation::Operation,
    types::{OperationStatus, TimestampMs},
};

/// Default trailing window for [`compute_stats`].
pub const DEFAULT_STATS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Rolling statistics over the operation store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    /// Operations currently stored.
    pub total: usize,
    /// Operations created inside the window.
    pub window_total: usize,
    /// Successful operations inside the window.
    pub window_success: usize,
    /// Failed operations inside the window.
    pub window_error: usize,
    /// Still-pending operations inside the window.
    pub window_pending: usize,
    /// Mean execution time inside the window, over settled operations only.
    pub average_execution_ms: Option<f64>,
}

impl OperationStats {
    /// Share of settled operations in the window that succeeded.
    pub fn success_rate(&self) -> Option<f64> {
        let settled = self.window_success + self.window_error;
        (settled > 0).then(|| self.window_success as f64 / settled as f64)
    }
}

/// Derives [`OperationStats`] for operations created within `window` of `now_ms`.
pub fn compute_stats<'a>(
    operations: impl IntoIterator<Item = &'a Operation>,
    now_ms: TimestampMs,
    window: Duration,
) -> OperationStats {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    let cutoff = now_ms.saturating_sub(window_ms);

    let mut stats = OperationStats::default();
    let mut timed = 0usize;
    let mut time_sum = 0.0f64;

    for op in operations {
        stats.total += 1;
        if op.timestamp < cutoff {
            continue;
        }

        stats.window_total += 1;
        match op.status() {
            OperationStatus::Success => stats.window_success += 1,
            OperationStatus::Error => stats.window_error += 1,
            OperationStatus::Pending => stats.window_pending += 1,
        }
        if let Some(ms) = op.execution_time() {
            timed += 1;
            time_sum += ms;
        }
    }

    stats.average_execution_ms = (timed > 0).then(|| time_sum / timed as f64);
    stats
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        operation::{Completion, GraphQlRequest, OperationDraft, OperationOutcome},
        types::{Headers, OperationId, OperationType},
    };

    fn op(ts: TimestampMs, outcome: Option<(OperationOutcome, f64)>) -> Operation {
        let draft = OperationDraft {
            operation_type: OperationType::Query,
            operation_name: None,
            query: "{ a }".to_string(),
            variables: None,
            request: GraphQlRequest {
                url: "/graphql".to_string(),
                method: "POST".to_string(),
                headers: Headers::new(),
                body: None,
                timestamp: ts,
            },
        };
        let mut op = Operation::pending(OperationId::generate(ts), draft, ts);
        if let Some((outcome, ms)) = outcome {
            op.settle(Completion {
                outcome,
                execution_time_ms: ms,
                raw_response: None,
                response_size: 0,
            })
            .unwrap();
        }
        op
    }

    #[test]
    fn window_counts_and_mean_skip_pending() {
        let now = 10_000_000;
        let ops = vec![
            op(now - 10, Some((OperationOutcome::Response(json!({})), 20.0))),
            op(now - 20, Some((OperationOutcome::Error("x".into()), 40.0))),
            op(now - 30, None),
            op(now - 5_000_000, Some((OperationOutcome::Response(json!({})), 1000.0))),
        ];

        let stats = compute_stats(&ops, now, Duration::from_secs(3600));
        assert_eq!(stats.total, 4);
        assert_eq!(stats.window_total, 3);
        assert_eq!(stats.window_success, 1);
        assert_eq!(stats.window_error, 1);
        assert_eq!(stats.window_pending, 1);
        assert_eq!(stats.average_execution_ms, Some(30.0));
        assert_eq!(stats.success_rate(), Some(0.5));
    }

    #[test]
    fn empty_store_has_no_mean() {
        let stats = compute_stats(std::iter::empty(), 0, DEFAULT_STATS_WINDOW);
        assert_eq!(stats, OperationStats::default());
        assert_eq!(stats.success_rate(), None);
    }
}
