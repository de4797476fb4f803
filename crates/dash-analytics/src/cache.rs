//! Memoized metrics: recompute only when the inputs actually change.
//!
//! The dashboard refreshes on a timer, and most refreshes return the same
//! records. The cache keeps an owned copy of the last inputs and compares
//! each new request against it field by field, so an unchanged fetch reuses
//! the previous result and any difference forces a recompute.

use crate::aggregations::{Aggregator, DashboardMetrics, MetricsInput, OutcomeCounts, PeriodInput};
use chrono::NaiveDate;
use dash_core::config::AnalyticsConfig;
use dash_core::types::Message;

/// Everything [`Aggregator::compute`] reads. Only the calendar date and
/// offset of `now` matter to the result.
#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    config: AnalyticsConfig,
    current: (Vec<Message>, Vec<Message>),
    previous: Option<(Vec<Message>, Vec<Message>)>,
    all_messages: Option<Vec<Message>>,
    outcomes: Option<OutcomeCounts>,
    compare: bool,
    date: NaiveDate,
    offset_secs: i32,
}

impl CacheKey {
    fn capture(aggregator: &Aggregator, input: &MetricsInput<'_>) -> Self {
        let owned = |p: &PeriodInput<'_>| (p.messages.to_vec(), p.unique.to_vec());
        Self {
            config: aggregator.config().clone(),
            current: owned(&input.current),
            previous: input.previous.as_ref().map(owned),
            all_messages: input.all_messages.map(<[Message]>::to_vec),
            outcomes: input.outcomes,
            compare: input.compare,
            date: input.now.date_naive(),
            offset_secs: input.now.offset().local_minus_utc(),
        }
    }

    /// Compare against borrowed input without cloning it.
    fn matches(&self, aggregator: &Aggregator, input: &MetricsInput<'_>) -> bool {
        let same_period = |owned: &(Vec<Message>, Vec<Message>), p: &PeriodInput<'_>| {
            owned.0.as_slice() == p.messages && owned.1.as_slice() == p.unique
        };
        self.config == *aggregator.config()
            && self.compare == input.compare
            && self.outcomes == input.outcomes
            && self.date == input.now.date_naive()
            && self.offset_secs == input.now.offset().local_minus_utc()
            && same_period(&self.current, &input.current)
            && match (&self.previous, &input.previous) {
                (Some(owned), Some(p)) => same_period(owned, p),
                (None, None) => true,
                _ => false,
            }
            && self.all_messages.as_deref() == input.all_messages
    }
}

#[derive(Debug, Default)]
pub struct MetricsCache {
    entry: Option<(CacheKey, DashboardMetrics)>,
    hits: u64,
    misses: u64,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return cached metrics when the inputs match the last call, else recompute.
    pub fn get_or_compute(
        &mut self,
        aggregator: &Aggregator,
        input: &MetricsInput<'_>,
    ) -> &DashboardMetrics {
        let entry = match self.entry.take() {
            Some(entry) if entry.0.matches(aggregator, input) => {
                self.hits += 1;
                tracing::trace!("Metrics cache hit");
                entry
            }
            _ => {
                self.misses += 1;
                tracing::debug!(
                    "Metrics cache miss, recomputing over {} message(s)",
                    input.current.messages.len()
                );
                (CacheKey::capture(aggregator, input), aggregator.compute(input))
            }
        };
        let (_, metrics) = self.entry.insert(entry);
        metrics
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
