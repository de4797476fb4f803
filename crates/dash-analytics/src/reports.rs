//! CSV exports and plain-text dashboard summaries.
//!
//! CSV output targets spreadsheets: a UTF-8 byte-order mark, every field
//! quoted, and commas or line breaks inside text flattened to spaces so a
//! row never spans lines.

use crate::aggregations::{message_counts, Aggregator, DashboardMetrics};
use crate::response_time::format_minutes;
use chrono::{FixedOffset, TimeZone};
use dash_core::time::resolve_time_ms;
use dash_core::types::Message;

/// Byte-order mark prepended to CSV exports.
pub const UTF8_BOM: &str = "\u{feff}";

/// Report generator for exports and summaries.
pub struct ReportGenerator;

impl ReportGenerator {
    /// One row per conversation from the latest-per-conversation list.
    pub fn conversations_csv(unique: &[Message], messages: &[Message], zone: &FixedOffset) -> String {
        let counts = message_counts(messages);
        let mut csv = CsvBuilder::new(&[
            "conversation_id",
            "messages",
            "last_message_at",
            "last_inbound",
            "last_outbound",
            "last_status",
        ]);
        for m in unique {
            let count = counts.get(m.conversation_id.as_str()).copied().unwrap_or(0);
            csv.row(&[
                m.conversation_id.as_str(),
                count.to_string().as_str(),
                format_time(resolve_time_ms(m, zone), zone).as_str(),
                m.inbound.as_str(),
                m.outbound.as_str(),
                m.latest_status.map(|s| s.as_str()).unwrap_or(""),
            ]);
        }
        csv.finish()
    }

    /// Raw message records.
    pub fn messages_csv(messages: &[Message]) -> String {
        let mut csv = CsvBuilder::new(&[
            "id",
            "conversation_id",
            "timestamp",
            "inbound",
            "outbound",
            "media",
            "status",
        ]);
        for m in messages {
            csv.row(&[
                m.id.as_str(),
                m.conversation_id.as_str(),
                m.timestamp.as_str(),
                m.inbound.as_str(),
                m.outbound.as_str(),
                m.media.as_deref().unwrap_or(""),
                m.latest_status.map(|s| s.as_str()).unwrap_or(""),
            ]);
        }
        csv.finish()
    }

    /// Tracked delivery statuses with failure attribution.
    pub fn status_csv(aggregator: &Aggregator, messages: &[Message], zone: &FixedOffset) -> String {
        let mut csv = CsvBuilder::new(&[
            "id",
            "conversation_id",
            "status",
            "status_at",
            "failure_reason",
        ]);
        for (m, status) in aggregator.tracked_statuses(messages, zone) {
            let reason = aggregator
                .failure_reason(m)
                .map(|r| r.as_str())
                .unwrap_or("");
            csv.row(&[
                m.id.as_str(),
                m.conversation_id.as_str(),
                status.as_str(),
                format_time(resolve_time_ms(m, zone), zone).as_str(),
                reason,
            ]);
        }
        csv.finish()
    }

    /// Compact summary for terminal display.
    pub fn text_summary(metrics: &DashboardMetrics) -> String {
        let mut output = String::new();

        let v = &metrics.volume;
        let e = &metrics.engagement;
        output.push_str(&format!(
            "  Conversations: {}{}  Messages: {}{}\n",
            v.total_conversations,
            delta_suffix(metrics.deltas.total_conversations, "%"),
            v.total_messages,
            delta_suffix(metrics.deltas.total_messages, "%"),
        ));
        output.push_str(&format!(
            "  Active: {} ({:.1}%{})  Avg messages/conversation: {:.1}\n",
            e.active_conversations,
            e.active_rate,
            delta_suffix(metrics.deltas.active_rate, "pp"),
            v.avg_messages_per_conversation,
        ));

        let r = &metrics.response;
        if r.samples > 0 {
            output.push_str(&format!(
                "  First response: median {}  p90 {}  ({} conversations)\n",
                format_minutes(r.median_mins),
                format_minutes(r.p90_mins),
                r.samples
            ));
            output.push_str(&format!(
                "    SLA: {:.1}% fast, {:.1}% slow\n",
                r.within_fast_sla, r.within_slow_sla
            ));
        } else {
            output.push_str("  First response: no replies in range\n");
        }

        let d = &metrics.delivery;
        if d.total > 0 {
            output.push_str(&format!(
                "  Delivery: {:.1}% delivered, {:.1}% read, {:.1}% failed ({} tracked)\n",
                d.delivery_success_rate, d.read_rate, d.failure_rate, d.total
            ));
            if d.failed > 0 {
                output.push_str(&format!(
                    "    Failures: {} incorrect number, {} other reason\n",
                    d.failed_incorrect_number, d.failed_other_reason
                ));
            }
        } else {
            output.push_str("  Delivery: no tracked statuses\n");
        }

        if !metrics.funnel.is_empty() {
            output.push_str("  Funnel:");
            for stage in &metrics.funnel {
                output.push_str(&format!(
                    " {} {} ({:.0}%)",
                    stage.label, stage.count, stage.conversion_rate
                ));
            }
            output.push('\n');
        }

        if !metrics.sparkline.is_empty() {
            let values: Vec<String> = metrics
                .sparkline
                .iter()
                .map(|p| p.conversations.to_string())
                .collect();
            output.push_str(&format!("  Last {} days: {}\n", values.len(), values.join(" ")));
        }

        output
    }
}

fn delta_suffix(delta: Option<f64>, unit: &str) -> String {
    match delta {
        Some(d) => format!(" ({:+.1}{})", d, unit),
        None => String::new(),
    }
}

fn format_time(ms: i64, zone: &FixedOffset) -> String {
    if ms <= 0 {
        return String::new();
    }
    zone.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Quote a field, flattening separators and line breaks to spaces.
pub fn csv_field(value: &str) -> String {
    let flattened: String = value
        .chars()
        .map(|c| match c {
            '\r' | '\n' | ',' => ' ',
            other => other,
        })
        .collect();
    format!("\"{}\"", flattened.replace('"', "\"\""))
}

struct CsvBuilder {
    out: String,
}

impl CsvBuilder {
    fn new(headers: &[&str]) -> Self {
        let mut builder = Self {
            out: String::from(UTF8_BOM),
        };
        builder.row(headers);
        builder
    }

    fn row(&mut self, fields: &[&str]) {
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        self.out.push_str(&line.join(","));
        self.out.push_str("\r\n");
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregations::MetricsInput;
    use chrono::DateTime;
    use dash_core::config::AnalyticsConfig;
    use dash_core::types::MessageStatus;

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    /// Minimal reader for the exporter's own dialect.
    fn parse_csv(text: &str) -> Vec<Vec<String>> {
        text.trim_start_matches(UTF8_BOM)
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.split(',')
                    .map(|f| {
                        f.strip_prefix('"')
                            .and_then(|f| f.strip_suffix('"'))
                            .unwrap_or(f)
                            .replace("\"\"", "\"")
                    })
                    .collect()
            })
            .collect()
    }

    fn sample() -> Vec<Message> {
        vec![
            Message::inbound("966500000001", "Hi, is it\navailable?", "2026-01-05 10:00")
                .with_id("m1"),
            Message::outbound("966500000001", "Yes, \"today\"", "2026-01-05 10:04")
                .with_id("m2")
                .with_status(MessageStatus::Read),
            Message::outbound("12345", "Offer", "2026-01-06 09:00")
                .with_id("m3")
                .with_status(MessageStatus::Failed),
        ]
    }

    #[test]
    fn test_csv_field_flattens_and_quotes() {
        assert_eq!(csv_field("a,b\r\nc"), "\"a b  c\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field(""), "\"\"");
    }

    #[test]
    fn test_messages_csv_roundtrip() {
        let messages = sample();
        let csv = ReportGenerator::messages_csv(&messages);
        assert!(csv.starts_with(UTF8_BOM));

        let rows = parse_csv(&csv);
        assert_eq!(rows.len(), messages.len() + 1);
        assert_eq!(rows[0][0], "id");
        for (row, m) in rows[1..].iter().zip(&messages) {
            assert_eq!(row.len(), 7);
            assert_eq!(row[0], m.id);
            assert_eq!(row[1], m.conversation_id);
            assert_eq!(row[3], m.inbound.replace(['\n', ','], " "));
            assert_eq!(row[4], m.outbound.replace(['\n', ','], " "));
        }
        assert_eq!(rows[2][6], "read");
    }

    #[test]
    fn test_conversations_csv() {
        let messages = sample();
        let unique = vec![messages[1].clone(), messages[2].clone()];
        let rows = parse_csv(&ReportGenerator::conversations_csv(&unique, &messages, &zone()));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "966500000001");
        assert_eq!(rows[1][1], "2");
        assert_eq!(rows[1][2], "2026-01-05 10:04:00");
        assert_eq!(rows[2][5], "failed");
    }

    #[test]
    fn test_status_csv_attributes_failures() {
        let agg = Aggregator::new(AnalyticsConfig::default()).unwrap();
        let rows = parse_csv(&ReportGenerator::status_csv(&agg, &sample(), &zone()));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][2], "read");
        assert_eq!(rows[1][4], "");
        assert_eq!(rows[2][1], "12345");
        assert_eq!(rows[2][4], "incorrect_number");
    }

    #[test]
    fn test_empty_exports_have_header_only() {
        let rows = parse_csv(&ReportGenerator::messages_csv(&[]));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_text_summary() {
        let agg = Aggregator::new(AnalyticsConfig::default()).unwrap();
        let now = DateTime::parse_from_rfc3339("2026-01-07T12:00:00+03:00").unwrap();
        let messages = sample();
        let metrics = agg.compute(&MetricsInput::new(&messages, &[], now));
        let summary = ReportGenerator::text_summary(&metrics);
        assert!(summary.contains("Conversations: 2"));
        assert!(summary.contains("median 4.0m"));
        assert!(summary.contains("1 incorrect number"));
        assert!(summary.contains("Funnel: Started 2 (100%)"));
        assert!(summary.contains("Last 7 days:"));
    }

    #[test]
    fn test_empty_text_summary() {
        let summary = ReportGenerator::text_summary(&DashboardMetrics::default());
        assert!(summary.contains("Conversations: 0"));
        assert!(summary.contains("no replies in range"));
        assert!(summary.contains("no tracked statuses"));
    }
}
