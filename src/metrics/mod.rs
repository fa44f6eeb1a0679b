use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Counters and timings for:
// - Sale creation, cancellation and payment-method changes
// - Webhook processing (outcomes and latency)
// - Shipment dispatches and tracking syncs
// - API errors by kind
//
// All metrics are registered with Prometheus and scraped via /metrics on the
// API server.
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Sale lifecycle
    pub sales_created_total: IntCounterVec,
    pub sales_cancelled_total: IntCounter,
    pub method_changes_total: IntCounter,

    // Webhook processing
    pub webhook_events_total: IntCounterVec,
    pub webhook_processing_duration: Histogram,

    // Shipments
    pub shipments_dispatched_total: IntCounter,
    pub shipment_syncs_total: IntCounterVec,

    // API errors
    pub api_errors_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let sales_created_total = IntCounterVec::new(
            Opts::new("sales_created_total", "Sales created"),
            &["payment_method", "delivery_type"],
        )?;
        registry.register(Box::new(sales_created_total.clone()))?;

        let sales_cancelled_total =
            IntCounter::new("sales_cancelled_total", "Sales cancelled")?;
        registry.register(Box::new(sales_cancelled_total.clone()))?;

        let method_changes_total =
            IntCounter::new("method_changes_total", "Payment method changes applied")?;
        registry.register(Box::new(method_changes_total.clone()))?;

        let webhook_events_total = IntCounterVec::new(
            Opts::new("webhook_events_total", "Gateway webhook events by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(webhook_events_total.clone()))?;

        let webhook_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_processing_duration_seconds",
                "Webhook processing duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(webhook_processing_duration.clone()))?;

        let shipments_dispatched_total = IntCounter::new(
            "shipments_dispatched_total",
            "Shipments registered with the carrier",
        )?;
        registry.register(Box::new(shipments_dispatched_total.clone()))?;

        let shipment_syncs_total = IntCounterVec::new(
            Opts::new("shipment_syncs_total", "Tracking syncs by resulting state"),
            &["shipment_status"],
        )?;
        registry.register(Box::new(shipment_syncs_total.clone()))?;

        let api_errors_total = IntCounterVec::new(
            Opts::new("api_errors_total", "API errors by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(api_errors_total.clone()))?;

        Ok(Self {
            registry,
            sales_created_total,
            sales_cancelled_total,
            method_changes_total,
            webhook_events_total,
            webhook_processing_duration,
            shipments_dispatched_total,
            shipment_syncs_total,
            api_errors_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_sale_created(&self, payment_method: &str, delivery_type: &str) {
        self.sales_created_total
            .with_label_values(&[payment_method, delivery_type])
            .inc();
    }

    pub fn record_webhook(&self, outcome: &str, duration_secs: f64) {
        self.webhook_events_total.with_label_values(&[outcome]).inc();
        self.webhook_processing_duration.observe(duration_secs);
    }

    pub fn record_shipment_sync(&self, shipment_status: &str) {
        self.shipment_syncs_total
            .with_label_values(&[shipment_status])
            .inc();
    }

    pub fn record_api_error(&self, kind: &str) {
        self.api_errors_total.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_sale_created() {
        let metrics = Metrics::new().unwrap();
        metrics.record_sale_created("CASH", "PICKUP");
        metrics.record_sale_created("CASH", "PICKUP");

        let gathered = metrics.registry.gather();
        let created = gathered
            .iter()
            .find(|m| m.name() == "sales_created_total")
            .unwrap();
        assert_eq!(created.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_record_webhook_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_webhook("ok", 0.02);
        metrics.record_webhook("unauthorized", 0.001);

        let gathered = metrics.registry.gather();
        let events = gathered
            .iter()
            .find(|m| m.name() == "webhook_events_total")
            .unwrap();
        assert_eq!(events.metric.len(), 2); // Two different outcome labels
    }

    #[test]
    fn test_record_api_error() {
        let metrics = Metrics::new().unwrap();
        metrics.record_api_error("conflict");
        metrics.record_api_error("conflict");
        metrics.record_api_error("not_found");

        let gathered = metrics.registry.gather();
        let errors = gathered
            .iter()
            .find(|m| m.name() == "api_errors_total")
            .unwrap();
        assert_eq!(errors.metric.len(), 2);
    }
}
