use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Warning => "warning",
            NotificationType::Error => "error",
            NotificationType::System => "system",
        }
    }
}

impl FromStr for NotificationType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationType::Info),
            "success" => Ok(NotificationType::Success),
            "warning" => Ok(NotificationType::Warning),
            "error" => Ok(NotificationType::Error),
            "system" => Ok(NotificationType::System),
            other => Err(UnknownVariant::new("notification type", other)),
        }
    }
}

impl TryFrom<String> for NotificationType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, UnknownVariant> {
        value.parse()
    }
}

/// Advisory only; dispatch order never depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(UnknownVariant::new("priority", other)),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, UnknownVariant> {
        value.parse()
    }
}

/// Aggregate delivery state: `scheduled -> dispatching -> delivered | partial | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Scheduled,
    Dispatching,
    Delivered,
    Partial,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Scheduled => "scheduled",
            DeliveryStatus::Dispatching => "dispatching",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Partial => "partial",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(DeliveryStatus::Scheduled),
            "dispatching" => Ok(DeliveryStatus::Dispatching),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "partial" => Ok(DeliveryStatus::Partial),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(UnknownVariant::new("delivery status", other)),
        }
    }
}

impl TryFrom<String> for DeliveryStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, UnknownVariant> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Email,
    Push,
    InApp,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Email, Channel::Push, Channel::InApp];

    /// Key of this channel inside the persisted `channels` document.
    pub fn key(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Push => "push",
            Channel::InApp => "inApp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelStatus {
    NotApplicable,
    Pending,
    Sent,
    Failed,
}

/// Which channels the sender asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelFlags {
    pub email: bool,
    pub push: bool,
    pub in_app: bool,
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            email: false,
            push: false,
            in_app: true,
        }
    }
}

impl ChannelFlags {
    pub fn any(&self) -> bool {
        self.email || self.push || self.in_app
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDelivery {
    pub enabled: bool,
    pub status: ChannelStatus,
    pub attempted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelDelivery {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            status: if enabled {
                ChannelStatus::Pending
            } else {
                ChannelStatus::NotApplicable
            },
            attempted_at: None,
            error: None,
        }
    }

    pub fn sent(at: DateTime<Utc>) -> Self {
        Self {
            enabled: true,
            status: ChannelStatus::Sent,
            attempted_at: Some(at),
            error: None,
        }
    }

    pub fn failed(at: DateTime<Utc>, error: String) -> Self {
        Self {
            enabled: true,
            status: ChannelStatus::Failed,
            attempted_at: Some(at),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDeliveries {
    pub email: ChannelDelivery,
    pub push: ChannelDelivery,
    pub in_app: ChannelDelivery,
}

impl ChannelDeliveries {
    pub fn from_flags(flags: ChannelFlags) -> Self {
        Self {
            email: ChannelDelivery::new(flags.email),
            push: ChannelDelivery::new(flags.push),
            in_app: ChannelDelivery::new(flags.in_app),
        }
    }

    pub fn get(&self, channel: Channel) -> &ChannelDelivery {
        match channel {
            Channel::Email => &self.email,
            Channel::Push => &self.push,
            Channel::InApp => &self.in_app,
        }
    }

    pub fn set(&mut self, channel: Channel, delivery: ChannelDelivery) {
        match channel {
            Channel::Email => self.email = delivery,
            Channel::Push => self.push = delivery,
            Channel::InApp => self.in_app = delivery,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL
            .into_iter()
            .filter(|channel| self.get(*channel).enabled)
    }

    /// Disabled channels are ignored; `Delivered` needs every enabled channel sent.
    pub fn aggregate_status(&self) -> DeliveryStatus {
        let (enabled, sent) = self.enabled().fold((0, 0), |(enabled, sent), channel| {
            let is_sent = self.get(channel).status == ChannelStatus::Sent;
            (enabled + 1, sent + usize::from(is_sent))
        });

        if enabled > 0 && sent == enabled {
            DeliveryStatus::Delivered
        } else if sent > 0 {
            DeliveryStatus::Partial
        } else {
            DeliveryStatus::Failed
        }
    }
}

/// Validated input for creating a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub channels: ChannelFlags,
    pub deliver_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub notification_type: NotificationType,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(json)]
    pub channels: ChannelDeliveries,
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub deliver_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds a fresh record. It starts `Scheduled` when `deliver_at` lies after `now`,
    /// otherwise `Dispatching`.
    pub fn new(user_id: Uuid, draft: NewNotification, now: DateTime<Utc>) -> Self {
        let status = if draft.deliver_at.is_some_and(|at| at > now) {
            DeliveryStatus::Scheduled
        } else {
            DeliveryStatus::Dispatching
        };

        Self {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title,
            message: draft.message,
            notification_type: draft.notification_type,
            priority: draft.priority,
            channels: ChannelDeliveries::from_flags(draft.channels),
            status,
            deliver_at: draft.deliver_at,
            read_at: None,
            created_at: now,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == DeliveryStatus::Scheduled
    }
}
