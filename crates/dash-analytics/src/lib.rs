//! Engagement, delivery, and funnel analytics for customer conversations.
//!
//! Turns an already-fetched array of message records into the dashboard's
//! metrics record: volume, active rate, first-response times, delivery
//! status rates, funnel stages, deltas against a previous period, and a
//! trailing activity sparkline. Also renders CSV exports and a plain-text
//! summary.

pub mod aggregations;
pub mod cache;
pub mod funnel;
pub mod reports;
pub mod response_time;

pub use aggregations::{Aggregator, DashboardMetrics, MetricsInput, OutcomeCounts, PeriodInput};
pub use cache::MetricsCache;
pub use funnel::{FunnelStage, FunnelStageKind};
pub use reports::ReportGenerator;
pub use response_time::ResponseTimeMetrics;
