use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder,
};

lazy_static! {
    // Business metrics
    pub static ref USERS_REGISTERED: IntCounter = IntCounter::new(
        "users_registered_total",
        "Total users registered"
    ).expect("metric can be created");

    pub static ref REFERRALS_RECORDED: IntCounter = IntCounter::new(
        "referrals_recorded_total",
        "Total referrals recorded"
    ).expect("metric can be created");

    pub static ref MINE_OPERATIONS: IntCounter = IntCounter::new(
        "mine_operations_total",
        "Total successful mine operations"
    ).expect("metric can be created");

    pub static ref MINE_REJECTED: IntCounter = IntCounter::new(
        "mine_rejected_total",
        "Total mine attempts rejected by the cooldown"
    ).expect("metric can be created");

    pub static ref TASKS_COMPLETED: IntCounter = IntCounter::new(
        "tasks_completed_total",
        "Total task completions rewarded"
    ).expect("metric can be created");

    pub static ref MINED_AMOUNT: Histogram = Histogram::with_opts(
        HistogramOpts::new("mined_amount_distribution", "Distribution of mined amounts")
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    registry.register(Box::new(USERS_REGISTERED.clone()))?;
    registry.register(Box::new(REFERRALS_RECORDED.clone()))?;
    registry.register(Box::new(MINE_OPERATIONS.clone()))?;
    registry.register(Box::new(MINE_REJECTED.clone()))?;
    registry.register(Box::new(TASKS_COMPLETED.clone()))?;
    registry.register(Box::new(MINED_AMOUNT.clone()))?;

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
