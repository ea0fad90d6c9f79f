use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub scheduled: NaiveTime,

    pub entry: DateTime<Utc>,

    pub modified: DateTime<Utc>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Item {
    pub fn new(title: String, description: String, scheduled: NaiveTime, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            scheduled,
            entry: now,
            modified: now,
            extra: BTreeMap::new(),
        }
    }

    /// True when the scheduled time falls in `[at, at + window)`, wrapping
    /// past midnight.
    pub fn is_due(&self, at: NaiveTime, window: TimeDelta) -> bool {
        let mut until = self.scheduled.signed_duration_since(at);
        if until < TimeDelta::zero() {
            until += TimeDelta::days(1);
        }
        until < window
    }
}

/// Field changes for an edit; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled: Option<NaiveTime>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.scheduled.is_none()
    }

    pub fn apply(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(scheduled) = self.scheduled {
            item.scheduled = scheduled;
        }
        item.modified = now;
    }
}
