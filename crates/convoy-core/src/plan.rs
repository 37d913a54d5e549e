//! PlanSource trait -- where a run's delivery plan comes from.

use convoy_types::error::ConfigError;
use convoy_types::plan::DeliveryPlan;

/// Loads the delivery plan at the start of each run.
///
/// Implementations live in convoy-infra (e.g., `FilePlanSource`). `load` is
/// called on every `start`, so edits to the underlying files take effect on
/// the next run.
pub trait PlanSource: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<DeliveryPlan, ConfigError>> + Send;
}
