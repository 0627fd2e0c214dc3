//! Call instrumentation.
//!
//! [`CallObserver`] is the hook interface the client and scan cursors invoke
//! around every remote call. Hooks are fire-and-forget and never change
//! control flow. [`NoopObserver`] is the default; [`RpcMetrics`] records the
//! calls in a Prometheus registry.

use std::future::Future;
use std::time::Instant;

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::error::RemoteResult;

/// Observer of remote calls.
///
/// All methods default to no-ops so implementors override only what they
/// record.
pub trait CallObserver: Send + Sync {
    /// A call returned successfully.
    fn on_call_success(&self) {}

    /// A call that began at `start` returned successfully.
    fn on_call_finish(&self, _start: Instant) {}

    /// A call failed.
    fn on_call_error(&self) {}
}

/// Observer that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CallObserver for NoopObserver {}

/// Runs `call`, reporting its outcome to `observer`.
pub(crate) async fn observe<T, F>(observer: &dyn CallObserver, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>>,
{
    let start = Instant::now();
    let result = call.await;
    match &result {
        Ok(_) => {
            observer.on_call_finish(start);
            observer.on_call_success();
        }
        Err(_) => observer.on_call_error(),
    }
    result
}

/// Prometheus metrics for remote calls.
pub struct RpcMetrics {
    registry: Registry,

    /// Counter of all calls, successful or failed.
    pub rpc_calls_total: Counter,

    /// Counter of failed calls.
    pub rpc_errors_total: Counter,

    /// Counter of successful calls.
    pub rpc_success_total: Counter,

    /// Latency of completed calls in seconds.
    pub rpc_duration_seconds: Histogram,
}

impl Default for RpcMetrics {
    fn default() -> Self {
        Self::new("hbase")
    }
}

impl RpcMetrics {
    /// Create a new registry with all metrics registered under `prefix`.
    pub fn new(prefix: &str) -> Self {
        let mut registry = Registry::with_prefix(prefix);

        let rpc_calls_total = Counter::default();
        registry.register(
            "rpc_calls",
            "Total number of remote calls, successful or failed",
            rpc_calls_total.clone(),
        );

        let rpc_errors_total = Counter::default();
        registry.register(
            "rpc_errors",
            "Total number of failed remote calls",
            rpc_errors_total.clone(),
        );

        let rpc_success_total = Counter::default();
        registry.register(
            "rpc_success",
            "Total number of successful remote calls",
            rpc_success_total.clone(),
        );

        // 0.5ms .. ~16s
        let rpc_duration_seconds = Histogram::new(exponential_buckets(0.0005, 2.0, 16));
        registry.register(
            "rpc_duration_seconds",
            "Latency of completed remote calls",
            rpc_duration_seconds.clone(),
        );

        Self {
            registry,
            rpc_calls_total,
            rpc_errors_total,
            rpc_success_total,
            rpc_duration_seconds,
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .expect("encoding metrics should not fail");
        buffer
    }
}

impl CallObserver for RpcMetrics {
    fn on_call_success(&self) {
        self.rpc_success_total.inc();
    }

    fn on_call_finish(&self, start: Instant) {
        self.rpc_calls_total.inc();
        self.rpc_duration_seconds
            .observe(start.elapsed().as_secs_f64());
    }

    fn on_call_error(&self) {
        self.rpc_calls_total.inc();
        self.rpc_errors_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;

    #[test]
    fn should_register_metrics_under_prefix() {
        // given/when
        let metrics = RpcMetrics::new("users");

        // then
        let encoded = metrics.encode();
        assert!(encoded.contains("# HELP users_rpc_calls"));
        assert!(encoded.contains("# HELP users_rpc_errors"));
        assert!(encoded.contains("# HELP users_rpc_success"));
        assert!(encoded.contains("# HELP users_rpc_duration_seconds"));
    }

    #[tokio::test]
    async fn should_record_success_and_latency() {
        // given
        let metrics = RpcMetrics::default();

        // when
        let result = observe(&metrics, async { Ok::<_, RemoteError>(7) }).await;

        // then
        assert_eq!(result, Ok(7));
        assert_eq!(metrics.rpc_calls_total.get(), 1);
        assert_eq!(metrics.rpc_success_total.get(), 1);
        assert_eq!(metrics.rpc_errors_total.get(), 0);
        assert!(metrics.encode().contains("hbase_rpc_duration_seconds_count 1"));
    }

    #[tokio::test]
    async fn should_count_failed_call_without_latency() {
        // given
        let metrics = RpcMetrics::default();

        // when
        let result = observe(&metrics, async {
            Err::<(), _>(RemoteError::Transport("down".to_string()))
        })
        .await;

        // then
        assert!(result.is_err());
        assert_eq!(metrics.rpc_errors_total.get(), 1);
        assert_eq!(metrics.rpc_calls_total.get(), 1);
        assert_eq!(metrics.rpc_success_total.get(), 0);
        assert!(metrics.encode().contains("hbase_rpc_duration_seconds_count 0"));
    }

    #[tokio::test]
    async fn should_count_every_call_once() {
        // given
        let metrics = RpcMetrics::default();

        // when
        observe(&metrics, async { Ok::<_, RemoteError>(()) }).await.unwrap();
        observe(&metrics, async {
            Err::<(), _>(RemoteError::Server("rejected".to_string()))
        })
        .await
        .unwrap_err();

        // then
        assert_eq!(metrics.rpc_calls_total.get(), 2);
        assert_eq!(
            metrics.rpc_calls_total.get(),
            metrics.rpc_success_total.get() + metrics.rpc_errors_total.get()
        );
    }

    #[tokio::test]
    async fn should_pass_results_through_noop_observer() {
        let result = observe(&NoopObserver, async { Ok::<_, RemoteError>("row") }).await;

        assert_eq!(result, Ok("row"));
    }
}
