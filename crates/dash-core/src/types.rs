use serde::{Deserialize, Serialize};

/// A single inbound/outbound exchange in a customer conversation.
///
/// One record is one exchange pair, not one chat bubble: `inbound` holds the
/// customer's text and `outbound` the reply, either of which may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, alias = "_id")]
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub inbound: String,
    #[serde(default)]
    pub outbound: String,
    #[serde(default)]
    pub media: Option<String>,
    /// Naive local `YYYY-MM-DD HH:mm` or any ISO-ish date string.
    #[serde(default)]
    pub timestamp: String,
    /// Epoch seconds of the latest delivery status update.
    #[serde(
        default,
        rename = "latestTimestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_timestamp: Option<f64>,
    #[serde(
        default,
        rename = "latestStatus",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_status: Option<MessageStatus>,
}

impl Message {
    pub fn new(
        conversation_id: impl Into<String>,
        inbound: impl Into<String>,
        outbound: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            conversation_id: conversation_id.into(),
            inbound: inbound.into(),
            outbound: outbound.into(),
            media: None,
            timestamp: timestamp.into(),
            latest_timestamp: None,
            latest_status: None,
        }
    }

    /// Customer message (inbound only).
    pub fn inbound(conversation_id: impl Into<String>, text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(conversation_id, text, "", timestamp)
    }

    /// Reply sent to the customer (outbound only).
    pub fn outbound(conversation_id: impl Into<String>, text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(conversation_id, "", text, timestamp)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.latest_status = Some(status);
        self
    }

    pub fn with_latest_timestamp(mut self, epoch_secs: f64) -> Self {
        self.latest_timestamp = Some(epoch_secs);
        self
    }

    /// Whether the record carries customer text.
    pub fn is_inbound(&self) -> bool {
        !self.inbound.trim().is_empty()
    }

    /// Whether the record carries a reply.
    pub fn is_outbound(&self) -> bool {
        !self.outbound.trim().is_empty()
    }
}

/// Delivery status reported for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
    #[serde(other)]
    Unknown,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
            MessageStatus::Unknown => "unknown",
        }
    }

    /// Whether the message left the outbox (sent, delivered or read).
    pub fn reached_sent(&self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Delivered | MessageStatus::Read
        )
    }

    /// Whether the message reached the handset (delivered or read).
    pub fn reached_delivered(&self) -> bool {
        matches!(self, MessageStatus::Delivered | MessageStatus::Read)
    }
}

/// Inclusive time window in epoch milliseconds. A missing bound means all time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl DateRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn all_time() -> Self {
        Self::default()
    }

    /// Both bounds, if the range is bounded.
    pub fn bounds(&self) -> Option<(i64, i64)> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }
}

/// Free-text analysis attached to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub conversation_id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub transition: Option<String>,
}

/// Partial update for a stored message. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(
        default,
        rename = "latestTimestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_timestamp: Option<f64>,
    #[serde(
        default,
        rename = "latestStatus",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_status: Option<MessageStatus>,
}

impl MessagePatch {
    pub fn apply(self, message: &mut Message) {
        if let Some(v) = self.conversation_id {
            message.conversation_id = v;
        }
        if let Some(v) = self.inbound {
            message.inbound = v;
        }
        if let Some(v) = self.outbound {
            message.outbound = v;
        }
        if let Some(v) = self.media {
            message.media = Some(v);
        }
        if let Some(v) = self.timestamp {
            message.timestamp = v;
        }
        if let Some(v) = self.latest_timestamp {
            message.latest_timestamp = Some(v);
        }
        if let Some(v) = self.latest_status {
            message.latest_status = Some(v);
        }
    }
}
