use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Local, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::debug;

use crate::config::Config;

/// Where "now" is read for reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderZone {
    Local,
    Named(Tz),
}

impl ReminderZone {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let Some(raw) = cfg.get("reminder.timezone") else {
            return Ok(Self::Local);
        };
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        let tz = raw
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid reminder.timezone {raw}: {err}"))?;
        debug!(timezone = %tz, "using reminder timezone");
        Ok(Self::Named(tz))
    }

    pub fn time_of_day(&self, now: DateTime<Utc>) -> NaiveTime {
        match self {
            Self::Local => now.with_timezone(&Local).time(),
            Self::Named(tz) => now.with_timezone(tz).time(),
        }
    }
}

/// Parses `HH:MM`, `H:MMam` or `H:MM pm`.
pub fn parse_time_of_day(token: &str) -> anyhow::Result<NaiveTime> {
    parse_clock_time(token)
        .and_then(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
        .ok_or_else(|| anyhow!("unrecognized time of day: {token} (expected e.g. 09:30 or 3:23pm)"))
}

fn clock_regex() -> Option<&'static Regex> {
    static CLOCK_RE: OnceLock<Option<Regex>> = OnceLock::new();
    CLOCK_RE
        .get_or_init(|| Regex::new(r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$").ok())
        .as_ref()
}

fn parse_clock_time(token: &str) -> Option<(u32, u32)> {
    let captures = clock_regex()?.captures(token.trim())?;

    let raw_hour = captures.name("hour")?.as_str().parse::<u32>().ok()?;
    let minute = captures.name("minute")?.as_str().parse::<u32>().ok()?;
    if minute > 59 {
        return None;
    }

    let hour = match captures.name("ampm").map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if raw_hour == 0 || raw_hour > 12 {
                return None;
            }
            match (meridiem.as_str(), raw_hour) {
                ("am", 12) => 0,
                ("am", hour) => hour,
                ("pm", 12) => 12,
                ("pm", hour) => hour + 12,
                _ => return None,
            }
        }
        None if raw_hour > 23 => return None,
        None => raw_hour,
    };

    Some((hour, minute))
}
