//! Dashboard metrics over a window of conversation messages.
//!
//! The [`Aggregator`] is a pure function of its inputs: the messages and
//! unique-conversation list of the current window, an optional previous
//! window for deltas, optional outcome counts, and an injected "now" whose
//! offset doubles as the local zone for naive timestamps.

use crate::funnel::{build_funnel, FunnelStage};
use crate::response_time::{first_response_latencies, ResponseTimeMetrics};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use dash_core::config::AnalyticsConfig;
use dash_core::error::DashError;
use dash_core::time::resolve_time_ms;
use dash_core::types::{Message, MessageStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Conversation outcomes tracked outside the message store (CRM stages).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub qualified: usize,
    pub converted: usize,
}

/// Messages and unique-conversation list of one window.
#[derive(Debug, Clone, Copy)]
pub struct PeriodInput<'a> {
    pub messages: &'a [Message],
    pub unique: &'a [Message],
}

/// Everything the engine reads.
#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    pub current: PeriodInput<'a>,
    pub previous: Option<PeriodInput<'a>>,
    /// Unfiltered messages for the sparkline. Defaults to the current window.
    pub all_messages: Option<&'a [Message]>,
    pub outcomes: Option<OutcomeCounts>,
    pub compare: bool,
    pub now: DateTime<FixedOffset>,
}

impl<'a> MetricsInput<'a> {
    pub fn new(messages: &'a [Message], unique: &'a [Message], now: DateTime<FixedOffset>) -> Self {
        Self {
            current: PeriodInput { messages, unique },
            previous: None,
            all_messages: None,
            outcomes: None,
            compare: false,
            now,
        }
    }

    /// Enable comparison against a previous window.
    pub fn compare_with(mut self, messages: &'a [Message], unique: &'a [Message]) -> Self {
        self.previous = Some(PeriodInput { messages, unique });
        self.compare = true;
        self
    }

    pub fn with_all_messages(mut self, all: &'a [Message]) -> Self {
        self.all_messages = Some(all);
        self
    }

    pub fn with_outcomes(mut self, outcomes: OutcomeCounts) -> Self {
        self.outcomes = Some(outcomes);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetrics {
    pub total_messages: usize,
    pub total_conversations: usize,
    pub avg_messages_per_conversation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Conversations with at least two messages in the window.
    pub active_conversations: usize,
    /// Percent of conversations that are active.
    pub active_rate: f64,
}

/// Delivery status tallies over tracked outbound messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMetrics {
    pub total: usize,
    pub sent: usize,
    pub delivered: usize,
    pub read: usize,
    pub failed: usize,
    /// `(delivered + read) / total`, percent.
    pub delivery_success_rate: f64,
    pub read_rate: f64,
    pub failure_rate: f64,
    pub failed_incorrect_number: usize,
    pub failed_other_reason: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    pub qualified: usize,
    pub converted: usize,
    pub qualified_rate: f64,
    pub converted_rate: f64,
}

/// Change against the previous window. `None` when not comparable.
///
/// Counts and durations are percent change; rates already in percent are
/// point differences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDeltas {
    pub total_conversations: Option<f64>,
    pub total_messages: Option<f64>,
    pub active_rate: Option<f64>,
    pub median_response_mins: Option<f64>,
    pub delivery_success_rate: Option<f64>,
    pub read_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparklinePoint {
    pub date: NaiveDate,
    /// Distinct conversations with a message that day.
    pub conversations: usize,
}

/// The full metrics record rendered by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub volume: VolumeMetrics,
    pub engagement: EngagementMetrics,
    pub response: ResponseTimeMetrics,
    pub delivery: DeliveryMetrics,
    pub funnel: Vec<FunnelStage>,
    pub outcomes: OutcomeMetrics,
    pub deltas: MetricDeltas,
    pub sparkline: Vec<SparklinePoint>,
}

/// Why a tracked outbound message failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    IncorrectNumber,
    OtherReason,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::IncorrectNumber => "incorrect_number",
            FailureReason::OtherReason => "other_reason",
        }
    }
}

/// Metrics engine configured with the analytics policy.
#[derive(Debug, Clone)]
pub struct Aggregator {
    config: AnalyticsConfig,
    valid_number: Regex,
}

impl Aggregator {
    pub fn new(config: AnalyticsConfig) -> Result<Self, DashError> {
        let valid_number = Regex::new(&config.valid_number_pattern).map_err(|e| {
            DashError::Config(format!(
                "Invalid valid_number_pattern '{}': {}",
                config.valid_number_pattern, e
            ))
        })?;
        if config.sparkline_days > MAX_SPARKLINE_DAYS {
            return Err(DashError::Config(format!(
                "sparkline_days must be at most {}, got {}",
                MAX_SPARKLINE_DAYS, config.sparkline_days
            )));
        }
        Ok(Self {
            config,
            valid_number,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Compute the metrics record. Never panics; empty input yields zeros.
    pub fn compute(&self, input: &MetricsInput<'_>) -> DashboardMetrics {
        let zone = *input.now.offset();
        let mut metrics = self.compute_period(&input.current, input.outcomes, &zone);

        if input.compare {
            if let Some(previous) = &input.previous {
                let prev = self.compute_period(previous, None, &zone);
                metrics.deltas = deltas(&metrics, &prev);
            }
        }

        let sparkline_source = input.all_messages.unwrap_or(input.current.messages);
        metrics.sparkline = sparkline(sparkline_source, input.now, self.config.sparkline_days);

        tracing::debug!(
            "Computed metrics: {} messages, {} conversations, {} latencies",
            metrics.volume.total_messages,
            metrics.volume.total_conversations,
            metrics.response.samples
        );
        metrics
    }

    fn compute_period(
        &self,
        period: &PeriodInput<'_>,
        outcomes: Option<OutcomeCounts>,
        zone: &FixedOffset,
    ) -> DashboardMetrics {
        let counts = message_counts(period.messages);

        let mut started: HashSet<&str> = counts.keys().copied().collect();
        started.extend(period.unique.iter().map(|m| m.conversation_id.as_str()));
        let total_conversations = started.len();

        let active: HashSet<&str> = counts
            .iter()
            .filter(|(_, count)| **count >= 2)
            .map(|(id, _)| *id)
            .collect();

        let volume = VolumeMetrics {
            total_messages: period.messages.len(),
            total_conversations,
            avg_messages_per_conversation: ratio(period.messages.len(), total_conversations),
        };

        let engagement = EngagementMetrics {
            active_conversations: active.len(),
            active_rate: percent(active.len(), total_conversations),
        };

        let latencies =
            first_response_latencies(period.messages, zone, self.config.max_response_mins);
        let response = ResponseTimeMetrics::from_latencies(
            latencies,
            self.config.sla_fast_mins,
            self.config.sla_slow_mins,
        );

        let tracked = self.tracked_statuses(period.messages, zone);
        let delivery = self.delivery(&tracked);

        let stage_set = |pred: fn(MessageStatus) -> bool| -> usize {
            tracked
                .iter()
                .filter(|(_, status)| pred(*status))
                .map(|(m, _)| m.conversation_id.as_str())
                .collect::<HashSet<_>>()
                .len()
        };
        let outcome = outcomes.unwrap_or_default();
        let funnel = build_funnel([
            total_conversations,
            stage_set(|s| s.reached_sent()),
            stage_set(|s| s.reached_delivered()),
            stage_set(|s| s == MessageStatus::Read),
            active.len(),
            outcome.converted,
        ]);

        let outcomes = OutcomeMetrics {
            qualified: outcome.qualified,
            converted: outcome.converted,
            qualified_rate: percent(outcome.qualified, total_conversations),
            converted_rate: percent(outcome.converted, total_conversations),
        };

        DashboardMetrics {
            volume,
            engagement,
            response,
            delivery,
            funnel,
            outcomes,
            deltas: MetricDeltas::default(),
            sparkline: Vec::new(),
        }
    }

    /// Outbound messages with a status recorded at or after the status epoch.
    pub fn tracked_statuses<'m, Tz: TimeZone>(
        &self,
        messages: &'m [Message],
        zone: &Tz,
    ) -> Vec<(&'m Message, MessageStatus)> {
        let epoch_ms = self.config.status_epoch.timestamp_millis();
        messages
            .iter()
            .filter(|m| m.is_outbound())
            .filter_map(|m| m.latest_status.map(|s| (m, s)))
            .filter(|(m, _)| resolve_time_ms(m, zone) >= epoch_ms)
            .collect()
    }

    /// Attribute a failure: ids that are not well-formed numbers point at
    /// an incorrect number.
    pub fn failure_reason(&self, message: &Message) -> Option<FailureReason> {
        if message.latest_status != Some(MessageStatus::Failed) {
            return None;
        }
        if self.valid_number.is_match(&message.conversation_id) {
            Some(FailureReason::OtherReason)
        } else {
            Some(FailureReason::IncorrectNumber)
        }
    }

    fn delivery(&self, tracked: &[(&Message, MessageStatus)]) -> DeliveryMetrics {
        let mut d = DeliveryMetrics::default();
        for (message, status) in tracked {
            match status {
                MessageStatus::Sent => d.sent += 1,
                MessageStatus::Delivered => d.delivered += 1,
                MessageStatus::Read => d.read += 1,
                MessageStatus::Failed => {
                    d.failed += 1;
                    match self.failure_reason(message) {
                        Some(FailureReason::IncorrectNumber) => d.failed_incorrect_number += 1,
                        _ => d.failed_other_reason += 1,
                    }
                }
                MessageStatus::Unknown => {}
            }
        }
        d.total = d.sent + d.delivered + d.read + d.failed;
        d.delivery_success_rate = percent(d.delivered + d.read, d.total);
        d.read_rate = percent(d.read, d.total);
        d.failure_rate = percent(d.failed, d.total);
        d
    }
}

/// Messages per conversation id.
pub fn message_counts(messages: &[Message]) -> HashMap<&str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for message in messages {
        *counts.entry(message.conversation_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Longest sparkline window accepted from config.
pub const MAX_SPARKLINE_DAYS: u32 = 366;

/// Distinct conversations active on each of the trailing `days` days
/// (today inclusive, oldest first), in the zone of `now`. `days` is capped
/// at [`MAX_SPARKLINE_DAYS`].
pub fn sparkline(messages: &[Message], now: DateTime<FixedOffset>, days: u32) -> Vec<SparklinePoint> {
    let days = days.min(MAX_SPARKLINE_DAYS);
    if days == 0 {
        return Vec::new();
    }
    let zone = *now.offset();
    let today = now.date_naive();
    let Some(first) = today.checked_sub_signed(Duration::days(days as i64 - 1)) else {
        return Vec::new();
    };

    let mut per_day: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for message in messages {
        let t = resolve_time_ms(message, &zone);
        if t <= 0 {
            continue;
        }
        let Some(local) = zone.timestamp_millis_opt(t).single() else {
            continue;
        };
        let date = local.date_naive();
        if date >= first && date <= today {
            per_day
                .entry(date)
                .or_default()
                .insert(message.conversation_id.as_str());
        }
    }

    (0..days as i64)
        .map(|offset| {
            let date = first + Duration::days(offset);
            SparklinePoint {
                date,
                conversations: per_day.get(&date).map_or(0, |s| s.len()),
            }
        })
        .collect()
}

fn deltas(current: &DashboardMetrics, previous: &DashboardMetrics) -> MetricDeltas {
    MetricDeltas {
        total_conversations: pct_change(
            current.volume.total_conversations as f64,
            previous.volume.total_conversations as f64,
        ),
        total_messages: pct_change(
            current.volume.total_messages as f64,
            previous.volume.total_messages as f64,
        ),
        active_rate: point_change(
            current.engagement.active_rate,
            previous.engagement.active_rate,
        ),
        median_response_mins: pct_change(
            current.response.median_mins,
            previous.response.median_mins,
        ),
        delivery_success_rate: point_change(
            current.delivery.delivery_success_rate,
            previous.delivery.delivery_success_rate,
        ),
        read_rate: point_change(current.delivery.read_rate, previous.delivery.read_rate),
    }
}

fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

fn point_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some(current - previous)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    ratio(part, whole) * 100.0
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::FunnelStageKind;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-01-10T12:00:00+03:00").unwrap()
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(AnalyticsConfig::default()).unwrap()
    }

    fn tracked(id: &str, status: MessageStatus) -> Message {
        Message::outbound(id, "offer", "2026-01-05 10:00").with_status(status)
    }

    #[test]
    fn test_basic_example() {
        let messages = vec![
            Message::inbound("c1", "hi", "2025-01-01 10:00"),
            Message::outbound("c1", "hello", "2025-01-01 10:05"),
        ];
        let metrics = aggregator().compute(&MetricsInput::new(&messages, &[], now()));

        assert_eq!(metrics.volume.total_messages, 2);
        assert_eq!(metrics.volume.total_conversations, 1);
        assert_eq!(metrics.response.samples, 1);
        assert_eq!(metrics.response.median_mins, 5.0);
        assert_eq!(metrics.response.within_fast_sla, 100.0);
        assert_eq!(metrics.engagement.active_rate, 100.0);
    }

    #[test]
    fn test_empty_input_is_zeroed() {
        let metrics = aggregator().compute(&MetricsInput::new(&[], &[], now()).compare_with(&[], &[]));

        assert_eq!(metrics.volume, VolumeMetrics::default());
        assert_eq!(metrics.engagement, EngagementMetrics::default());
        assert_eq!(metrics.response, ResponseTimeMetrics::default());
        assert_eq!(metrics.delivery, DeliveryMetrics::default());
        assert_eq!(metrics.deltas, MetricDeltas::default());
        assert_eq!(metrics.funnel.len(), 6);
        assert!(metrics.funnel.iter().all(|s| s.count == 0));
        assert_eq!(metrics.sparkline.len(), 7);
        assert!(metrics.sparkline.iter().all(|p| p.conversations == 0));
    }

    #[test]
    fn test_message_counts_sum_to_total() {
        let messages = vec![
            Message::inbound("a", "1", "2025-01-01 10:00"),
            Message::inbound("b", "1", "2025-01-01 10:00"),
            Message::outbound("a", "2", "2025-01-01 10:01"),
            Message::inbound("c", "1", ""),
            Message::inbound("a", "3", "2025-01-01 10:02"),
        ];
        let counts = message_counts(&messages);
        assert_eq!(counts.values().sum::<usize>(), messages.len());
        assert_eq!(counts["a"], 3);
    }

    #[test]
    fn test_active_rate_and_unique_union() {
        let messages = vec![
            Message::inbound("a", "1", "2025-01-01 10:00"),
            Message::outbound("a", "2", "2025-01-01 10:01"),
            Message::inbound("b", "1", "2025-01-01 10:00"),
        ];
        // The unique list can name conversations with no message in the window.
        let unique = vec![
            Message::outbound("a", "2", "2025-01-01 10:01"),
            Message::inbound("b", "1", "2025-01-01 10:00"),
            Message::inbound("c", "x", "2024-12-01 10:00"),
            Message::inbound("d", "x", "2024-12-01 10:00"),
        ];
        let metrics = aggregator().compute(&MetricsInput::new(&messages, &unique, now()));
        assert_eq!(metrics.volume.total_conversations, 4);
        assert_eq!(metrics.engagement.active_conversations, 1);
        assert_eq!(metrics.engagement.active_rate, 25.0);
        assert_eq!(metrics.volume.avg_messages_per_conversation, 0.75);
    }

    #[test]
    fn test_delivery_metrics() {
        let messages = vec![
            tracked("966500000001", MessageStatus::Sent),
            tracked("966500000002", MessageStatus::Delivered),
            tracked("966500000003", MessageStatus::Read),
            tracked("966500000004", MessageStatus::Read),
            tracked("966500000005", MessageStatus::Failed),
            tracked("12345", MessageStatus::Failed),
            tracked("966500000007", MessageStatus::Unknown),
            // Inbound records never count toward delivery.
            Message::inbound("966500000008", "hi", "2026-01-05 10:00")
                .with_status(MessageStatus::Read),
        ];
        let metrics = aggregator().compute(&MetricsInput::new(&messages, &[], now()));
        let d = &metrics.delivery;
        assert_eq!(d.total, 6);
        assert_eq!((d.sent, d.delivered, d.read, d.failed), (1, 1, 2, 2));
        assert!((d.delivery_success_rate - 50.0).abs() < 1e-9);
        assert!((d.read_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!((d.failure_rate - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(d.failed_incorrect_number, 1);
        assert_eq!(d.failed_other_reason, 1);
    }

    #[test]
    fn test_statuses_before_epoch_ignored() {
        let messages = vec![
            Message::outbound("966500000001", "offer", "2025-06-01 10:00")
                .with_status(MessageStatus::Read),
            // latestTimestamp after the epoch wins over an old naive timestamp.
            Message::outbound("966500000002", "offer", "2025-06-01 10:00")
                .with_status(MessageStatus::Delivered)
                .with_latest_timestamp(1_767_225_600.0),
        ];
        let metrics = aggregator().compute(&MetricsInput::new(&messages, &[], now()));
        assert_eq!(metrics.delivery.total, 1);
        assert_eq!(metrics.delivery.delivered, 1);
        assert_eq!(metrics.delivery.read, 0);
    }

    #[test]
    fn test_failure_reason_attribution() {
        let agg = aggregator();
        let bad = tracked("12345", MessageStatus::Failed);
        let good = tracked("966512345678", MessageStatus::Failed);
        assert_eq!(agg.failure_reason(&bad), Some(FailureReason::IncorrectNumber));
        assert_eq!(agg.failure_reason(&good), Some(FailureReason::OtherReason));
        assert_eq!(agg.failure_reason(&tracked("12345", MessageStatus::Read)), None);
    }

    #[test]
    fn test_configurable_number_pattern() {
        let config = AnalyticsConfig {
            valid_number_pattern: r"^\d+$".into(),
            ..Default::default()
        };
        let agg = Aggregator::new(config).unwrap();
        let failed = tracked("12345", MessageStatus::Failed);
        assert_eq!(agg.failure_reason(&failed), Some(FailureReason::OtherReason));

        let broken = AnalyticsConfig {
            valid_number_pattern: "(".into(),
            ..Default::default()
        };
        assert!(matches!(Aggregator::new(broken), Err(DashError::Config(_))));
    }

    #[test]
    fn test_funnel_counts_unique_conversations() {
        let messages = vec![
            Message::inbound("a", "hi", "2026-01-05 09:59"),
            tracked("a", MessageStatus::Read),
            tracked("a", MessageStatus::Read),
            tracked("b", MessageStatus::Delivered),
            tracked("c", MessageStatus::Sent),
            tracked("d", MessageStatus::Failed),
            Message::inbound("e", "hi", "2026-01-05 10:00"),
        ];
        let input = MetricsInput::new(&messages, &[], now()).with_outcomes(OutcomeCounts {
            qualified: 2,
            converted: 1,
        });
        let metrics = aggregator().compute(&input);
        let counts: Vec<usize> = metrics.funnel.iter().map(|s| s.count).collect();
        // Started, Sent, Delivered, Read, Responded(active), Converted.
        assert_eq!(counts, vec![5, 3, 2, 1, 1, 1]);
        assert_eq!(metrics.funnel[0].conversion_rate, 100.0);
        assert!((metrics.funnel[1].conversion_rate - 60.0).abs() < 1e-9);
        assert!((metrics.funnel[2].conversion_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.funnel[5].stage, FunnelStageKind::Converted);
        assert_eq!(metrics.outcomes.qualified_rate, 40.0);
        assert_eq!(metrics.outcomes.converted_rate, 20.0);
    }

    #[test]
    fn test_funnel_chain_non_increasing() {
        let statuses = [
            MessageStatus::Sent,
            MessageStatus::Delivered,
            MessageStatus::Read,
            MessageStatus::Failed,
            MessageStatus::Read,
            MessageStatus::Sent,
        ];
        let messages: Vec<Message> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| tracked(&format!("c{}", i % 4), *s))
            .collect();
        let metrics = aggregator().compute(&MetricsInput::new(&messages, &[], now()));
        let chain: Vec<usize> = metrics.funnel[..4].iter().map(|s| s.count).collect();
        assert!(chain.windows(2).all(|w| w[0] >= w[1]), "{:?}", chain);
    }

    #[test]
    fn test_deltas_against_previous_period() {
        let current = vec![
            Message::inbound("a", "hi", "2026-01-05 10:00"),
            Message::outbound("a", "hello", "2026-01-05 10:10"),
            Message::inbound("b", "hi", "2026-01-05 11:00"),
            Message::outbound("b", "hello", "2026-01-05 11:10"),
        ];
        let previous = vec![
            Message::inbound("x", "hi", "2025-12-29 10:00"),
            Message::outbound("x", "hello", "2025-12-29 10:20"),
            Message::inbound("y", "hi", "2025-12-29 10:00"),
        ];
        let input = MetricsInput::new(&current, &[], now()).compare_with(&previous, &[]);
        let metrics = aggregator().compute(&input);
        let d = &metrics.deltas;
        assert_eq!(d.total_conversations, Some(0.0));
        assert!((d.total_messages.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        // 100% active now vs 50% before: +50 points.
        assert_eq!(d.active_rate, Some(50.0));
        // Median 10m now vs 20m before.
        assert_eq!(d.median_response_mins, Some(-50.0));
        // No tracked statuses before: not comparable.
        assert_eq!(d.delivery_success_rate, None);
    }

    #[test]
    fn test_deltas_disabled_without_compare() {
        let current = vec![Message::inbound("a", "hi", "2026-01-05 10:00")];
        let previous = vec![Message::inbound("x", "hi", "2025-12-29 10:00")];
        let mut input = MetricsInput::new(&current, &[], now()).compare_with(&previous, &[]);
        input.compare = false;
        let metrics = aggregator().compute(&input);
        assert_eq!(metrics.deltas, MetricDeltas::default());
    }

    #[test]
    fn test_sparkline_trailing_days() {
        let all = vec![
            Message::inbound("a", "hi", "2026-01-10 08:00"),
            Message::outbound("a", "yo", "2026-01-10 08:05"),
            Message::inbound("b", "hi", "2026-01-10 09:00"),
            Message::inbound("a", "hi", "2026-01-04 23:59"),
            // Outside the window.
            Message::inbound("c", "hi", "2026-01-03 23:59"),
            Message::inbound("d", "hi", "2026-01-11 00:00"),
            Message::inbound("e", "hi", ""),
        ];
        // The sparkline ignores the date filter applied to the current window.
        let input = MetricsInput::new(&[], &[], now()).with_all_messages(&all);
        let metrics = aggregator().compute(&input);
        let points = &metrics.sparkline;
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2026, 1, 4).unwrap());
        assert_eq!(points[0].conversations, 1);
        assert_eq!(points[6].date, NaiveDate::from_ymd_opt(2026, 1, 10).unwrap());
        assert_eq!(points[6].conversations, 2);
        assert_eq!(points.iter().map(|p| p.conversations).sum::<usize>(), 3);
    }

    #[test]
    fn test_sparkline_days_bounded() {
        let config = AnalyticsConfig {
            sparkline_days: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(Aggregator::new(config), Err(DashError::Config(_))));

        assert_eq!(sparkline(&[], now(), u32::MAX).len(), MAX_SPARKLINE_DAYS as usize);

        let earliest = FixedOffset::east_opt(0)
            .unwrap()
            .from_utc_datetime(&NaiveDate::MIN.and_hms_opt(0, 0, 0).unwrap());
        assert!(sparkline(&[], earliest, 7).is_empty());
    }

    #[test]
    fn test_metrics_serialize() {
        let messages = vec![Message::inbound("a", "hi", "2026-01-05 10:00")];
        let metrics = aggregator().compute(&MetricsInput::new(&messages, &[], now()));
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["volume"]["total_messages"], 1);
        assert!(json["deltas"]["total_messages"].is_null());
        assert_eq!(json["funnel"][4]["stage"], "responded");
    }
}
