use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread::{self, JoinHandle};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Critical,
}

impl FromStr for Urgency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "critical" => Ok(Self::Critical),
            other => Err(anyhow!("invalid urgency: {other} (expected low, normal or critical)")),
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::Critical => "critical",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    pub icon: Option<PathBuf>,
    pub sound: Option<PathBuf>,
    pub timeout_ms: u64,
}

/// Desktop notifications through `notify-send`, with an optional sound played
/// by an external player.
#[derive(Debug, Clone)]
pub struct Notifier {
    enabled: bool,
    sender: String,
    sound_player: String,
    defaults: Notification,
}

impl Notifier {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let urgency = cfg
            .get("notify.urgency")
            .map(|raw| raw.parse::<Urgency>())
            .transpose()?
            .unwrap_or_default();
        let timeout_ms = cfg.get_u64("notify.timeout_ms")?.unwrap_or(5000);

        let notifier = Self {
            enabled: cfg.get_bool("notify").unwrap_or(true),
            sender: cfg.get("notify.command").unwrap_or_else(|| "notify-send".to_string()),
            sound_player: cfg.get("notify.sound_player").unwrap_or_else(|| "paplay".to_string()),
            defaults: Notification {
                title: String::new(),
                message: String::new(),
                urgency,
                icon: cfg.get_path("notify.icon"),
                sound: cfg.get_path("notify.sound"),
                timeout_ms,
            },
        };
        debug!(
            enabled = notifier.enabled,
            sender = %notifier.sender,
            "initialized notifier"
        );
        Ok(notifier)
    }

    /// A notification carrying the configured urgency, icon, sound and timeout.
    pub fn compose(&self, title: impl Into<String>, message: impl Into<String>) -> Notification {
        Notification {
            title: title.into(),
            message: message.into(),
            ..self.defaults.clone()
        }
    }

    /// Spawns the sender (and the sound player) without waiting on either.
    #[instrument(skip(self, notification), fields(title = %notification.title))]
    pub fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        if !self.enabled {
            debug!("notifications disabled; skipping");
            return Ok(());
        }

        info!(urgency = %notification.urgency, "sending notification");
        spawn_detached(&self.sender, sender_args(notification))?;

        if let Some(sound) = &notification.sound {
            if let Err(err) = spawn_detached(&self.sound_player, vec![sound.clone().into_os_string()]) {
                warn!(error = %err, sound = %sound.display(), "failed to play notification sound");
            }
        }
        Ok(())
    }
}

pub fn sender_args(notification: &Notification) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        notification.title.clone().into(),
        notification.message.clone().into(),
        format!("--urgency={}", notification.urgency).into(),
        format!("--expire-time={}", notification.timeout_ms).into(),
    ];
    if let Some(icon) = &notification.icon {
        args.push("--icon".into());
        args.push(icon.clone().into_os_string());
    }
    args
}

/// Starts `program` without blocking on it. A background thread waits on the
/// child so it is reaped even in a long-running host.
pub(crate) fn spawn_detached(
    program: &str,
    args: Vec<OsString>,
) -> anyhow::Result<JoinHandle<io::Result<ExitStatus>>> {
    debug!(program, ?args, "spawning");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to run {program}"))?;

    let program = program.to_string();
    Ok(thread::spawn(move || {
        let status = child.wait();
        match &status {
            Ok(status) if status.success() => debug!(program = %program, "child exited"),
            Ok(status) => warn!(program = %program, %status, "child exited with failure"),
            Err(err) => warn!(program = %program, error = %err, "failed to wait for child"),
        }
        status
    }))
}
