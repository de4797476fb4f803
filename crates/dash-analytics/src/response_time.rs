//! First-response latency: how long a customer waited for the first reply.

use chrono::TimeZone;
use dash_core::time::resolve_time_ms;
use dash_core::types::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response-time distribution over conversations with a measurable reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeMetrics {
    /// Number of conversations contributing a latency.
    pub samples: usize,
    pub median_mins: f64,
    pub p90_mins: f64,
    pub mean_mins: f64,
    /// Share of latencies within the fast SLA (percent).
    pub within_fast_sla: f64,
    /// Share of latencies within the slow SLA (percent).
    pub within_slow_sla: f64,
}

impl ResponseTimeMetrics {
    /// Summarize latencies (minutes). Percentiles index the ascending list
    /// at `floor(n/2)` and `floor(n*0.9)` without interpolation.
    pub fn from_latencies(mut latencies: Vec<f64>, fast_mins: u32, slow_mins: u32) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }
        latencies.sort_by(|a, b| a.total_cmp(b));

        let n = latencies.len();
        let median = latencies[n / 2];
        let p90_index = ((n as f64 * 0.9).floor() as usize).min(n - 1);
        let p90 = latencies[p90_index];
        let mean = latencies.iter().sum::<f64>() / n as f64;

        let fast = latencies.iter().filter(|l| **l <= fast_mins as f64).count();
        let slow = latencies.iter().filter(|l| **l <= slow_mins as f64).count();

        Self {
            samples: n,
            median_mins: median,
            p90_mins: p90,
            mean_mins: mean,
            within_fast_sla: fast as f64 / n as f64 * 100.0,
            within_slow_sla: slow as f64 / n as f64 * 100.0,
        }
    }
}

/// One latency per conversation, in minutes.
///
/// Each conversation's messages are ordered by resolved time (ties keep
/// input order); the first adjacent inbound-then-outbound pair defines the
/// latency. Latencies `<= 0` or `>= max_mins` are outliers and the
/// conversation contributes nothing.
pub fn first_response_latencies<Tz: TimeZone>(
    messages: &[Message],
    zone: &Tz,
    max_mins: u32,
) -> Vec<f64> {
    let mut groups: HashMap<&str, Vec<(i64, &Message)>> = HashMap::new();
    for message in messages {
        groups
            .entry(message.conversation_id.as_str())
            .or_default()
            .push((resolve_time_ms(message, zone), message));
    }

    let mut latencies = Vec::new();
    for (_, mut timeline) in groups {
        timeline.sort_by_key(|(t, _)| *t);
        let first_pair = timeline
            .windows(2)
            .find(|pair| pair[0].1.is_inbound() && pair[1].1.is_outbound());
        if let Some(pair) = first_pair {
            let minutes = (pair[1].0 - pair[0].0) as f64 / 60_000.0;
            if minutes > 0.0 && minutes < max_mins as f64 {
                latencies.push(minutes);
            }
        }
    }
    latencies
}

/// Format minutes for display, e.g. `4.5m` or `2h 5m`.
pub fn format_minutes(minutes: f64) -> String {
    if minutes < 60.0 {
        format!("{:.1}m", minutes)
    } else {
        let total = minutes.round() as u64;
        format!("{}h {}m", total / 60, total % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_simple_reply_latency() {
        let messages = vec![
            Message::inbound("c1", "hi", "2025-01-01 10:00"),
            Message::outbound("c1", "hello", "2025-01-01 10:05"),
        ];
        let latencies = first_response_latencies(&messages, &utc(), 1440);
        assert_eq!(latencies, vec![5.0]);
    }

    #[test]
    fn test_order_independent() {
        let messages = vec![
            Message::outbound("c1", "hello", "2025-01-01 10:05"),
            Message::inbound("c1", "hi", "2025-01-01 10:00"),
        ];
        assert_eq!(first_response_latencies(&messages, &utc(), 1440), vec![5.0]);
    }

    #[test]
    fn test_only_first_pair_counts() {
        let messages = vec![
            Message::inbound("c1", "hi", "2025-01-01 10:00"),
            Message::outbound("c1", "hello", "2025-01-01 10:02"),
            Message::inbound("c1", "price?", "2025-01-01 11:00"),
            Message::outbound("c1", "100", "2025-01-01 11:30"),
        ];
        assert_eq!(first_response_latencies(&messages, &utc(), 1440), vec![2.0]);
    }

    #[test]
    fn test_outbound_first_is_skipped() {
        let messages = vec![
            Message::outbound("c1", "promo", "2025-01-01 09:00"),
            Message::inbound("c1", "interested", "2025-01-01 10:00"),
            Message::outbound("c1", "great", "2025-01-01 10:10"),
        ];
        assert_eq!(first_response_latencies(&messages, &utc(), 1440), vec![10.0]);
    }

    #[test]
    fn test_outliers_discarded() {
        let messages = vec![
            // Same minute: zero latency.
            Message::inbound("c1", "hi", "2025-01-01 10:00"),
            Message::outbound("c1", "hello", "2025-01-01 10:00"),
            // Exactly 24h.
            Message::inbound("c2", "hi", "2025-01-01 10:00"),
            Message::outbound("c2", "hello", "2025-01-02 10:00"),
        ];
        assert!(first_response_latencies(&messages, &utc(), 1440).is_empty());
    }

    #[test]
    fn test_outlier_does_not_fall_through_to_later_pair() {
        let messages = vec![
            Message::inbound("c1", "hi", "2025-01-01 10:00"),
            Message::outbound("c1", "hello", "2025-01-03 10:00"),
            Message::inbound("c1", "again", "2025-01-03 11:00"),
            Message::outbound("c1", "yes", "2025-01-03 11:01"),
        ];
        assert!(first_response_latencies(&messages, &utc(), 1440).is_empty());
    }

    #[test]
    fn test_percentiles_without_interpolation() {
        let latencies: Vec<f64> = (1..=10).map(|v| v as f64).rev().collect();
        let metrics = ResponseTimeMetrics::from_latencies(latencies, 5, 15);
        assert_eq!(metrics.samples, 10);
        assert_eq!(metrics.median_mins, 6.0);
        assert_eq!(metrics.p90_mins, 10.0);
        assert!((metrics.mean_mins - 5.5).abs() < 1e-9);
        assert_eq!(metrics.within_fast_sla, 50.0);
        assert_eq!(metrics.within_slow_sla, 100.0);
    }

    #[test]
    fn test_single_latency() {
        let metrics = ResponseTimeMetrics::from_latencies(vec![20.0], 5, 15);
        assert_eq!(metrics.median_mins, 20.0);
        assert_eq!(metrics.p90_mins, 20.0);
        assert_eq!(metrics.within_slow_sla, 0.0);
    }

    #[test]
    fn test_empty_latencies_zeroed() {
        let metrics = ResponseTimeMetrics::from_latencies(Vec::new(), 5, 15);
        assert_eq!(metrics, ResponseTimeMetrics::default());
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(4.5), "4.5m");
        assert_eq!(format_minutes(0.0), "0.0m");
        assert_eq!(format_minutes(125.0), "2h 5m");
    }
}
