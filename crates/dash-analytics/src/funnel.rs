//! Conversation funnel: unique-conversation counts at each milestone.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStageKind {
    Started,
    Sent,
    Delivered,
    Read,
    Responded,
    Converted,
}

impl FunnelStageKind {
    pub const ALL: [FunnelStageKind; 6] = [
        FunnelStageKind::Started,
        FunnelStageKind::Sent,
        FunnelStageKind::Delivered,
        FunnelStageKind::Read,
        FunnelStageKind::Responded,
        FunnelStageKind::Converted,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FunnelStageKind::Started => "Started",
            FunnelStageKind::Sent => "Sent",
            FunnelStageKind::Delivered => "Delivered",
            FunnelStageKind::Read => "Read",
            FunnelStageKind::Responded => "Responded",
            FunnelStageKind::Converted => "Converted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: FunnelStageKind,
    pub label: String,
    /// Unique conversations that reached this stage.
    pub count: usize,
    /// Percent of the previous stage's count (the first stage is always 100).
    pub conversion_rate: f64,
}

/// Build the funnel from per-stage counts, in [`FunnelStageKind::ALL`] order.
pub fn build_funnel(counts: [usize; 6]) -> Vec<FunnelStage> {
    let mut stages = Vec::with_capacity(counts.len());
    let mut previous: Option<usize> = None;
    for (kind, count) in FunnelStageKind::ALL.iter().zip(counts) {
        let conversion_rate = match previous {
            None => 100.0,
            Some(0) => 0.0,
            Some(prev) => count as f64 / prev as f64 * 100.0,
        };
        stages.push(FunnelStage {
            stage: *kind,
            label: kind.label().to_string(),
            count,
            conversion_rate,
        });
        previous = Some(count);
    }
    stages
}
