use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    // Business metrics
    pub static ref ACCOUNTS_REGISTERED: IntCounter = IntCounter::new(
        "accounts_registered_total",
        "Total accounts created"
    ).expect("metric can be created");

    pub static ref LOGINS: IntCounter = IntCounter::new(
        "logins_total",
        "Total successful logins"
    ).expect("metric can be created");

    pub static ref ACCOUNTS_DELETED: IntCounter = IntCounter::new(
        "accounts_deleted_total",
        "Total accounts deleted"
    ).expect("metric can be created");

    pub static ref TRANSFERS_COMMITTED: IntCounter = IntCounter::new(
        "transfers_committed_total",
        "Total committed transfers"
    ).expect("metric can be created");

    pub static ref TRANSFERS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("transfers_rejected_total", "Total rejected transfers"),
        &["reason"]
    ).expect("metric can be created");

    pub static ref TRANSFER_AMOUNT: Histogram = Histogram::with_opts(
        HistogramOpts::new("transfer_amount_distribution", "Distribution of transfer amounts")
            .buckets(vec![1.0, 10.0, 100.0, 1000.0, 10000.0, 100000.0])
    ).expect("metric can be created");

    pub static ref MINING_CREDITS: IntCounter = IntCounter::new(
        "mining_credits_total",
        "Total mining credits applied"
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    registry.register(Box::new(ACCOUNTS_REGISTERED.clone()))?;
    registry.register(Box::new(LOGINS.clone()))?;
    registry.register(Box::new(ACCOUNTS_DELETED.clone()))?;
    registry.register(Box::new(TRANSFERS_COMMITTED.clone()))?;
    registry.register(Box::new(TRANSFERS_REJECTED.clone()))?;
    registry.register(Box::new(TRANSFER_AMOUNT.clone()))?;
    registry.register(Box::new(MINING_CREDITS.clone()))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let registry = Registry::new();
        let result = register_metrics(&registry);
        assert!(result.is_ok());
    }

    #[test]
    fn test_metrics_handler() {
        let result = metrics_handler();
        assert!(result.is_ok());
    }
}
