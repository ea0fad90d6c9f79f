//! Drag-to-reorder engine for the task list.
//!
//! The host feeds pointer events and item extents into a [`DragEngine`] and
//! applies the [`RenderEffect`]s it returns. The engine never touches a widget
//! tree; the only authoritative state it mutates is the [`ItemStore`], and
//! only on a successful drop.
//!
//! [`ItemStore`]: crate::store::ItemStore

pub mod autoscroll;
pub mod geometry;
pub mod placeholder;
pub mod session;

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

pub use autoscroll::{AutoScrollController, ScrollDirection, TimerToken, Viewport};
pub use geometry::{ItemExtent, resolve};
pub use placeholder::{PlaceholderTracker, Slot};
pub use session::{CancelReason, DragEngine, DragPhase, DropOutcome, DropReport, RenderEffect};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReorderError {
    #[error("item {0} is not in the list")]
    InvalidReference(Uuid),

    #[error("item {0} is already in the list")]
    DuplicateItem(Uuid),

    #[error("pointer position could not be mapped to an insertion index")]
    GeometryUnresolved,

    #[error("auto-scroll tick arrived for a stopped timer")]
    ScrollStateDesync,
}

/// Empirically tuned constants for the drag interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderTuning {
    /// Fraction of an item's height where the dead zone begins.
    pub dead_zone_start: f32,
    /// Fraction of an item's height where the dead zone ends.
    pub dead_zone_end: f32,
    pub hysteresis_px: f32,
    pub drag_start_distance_px: f32,
    pub edge_band_px: f32,
    pub scroll_step_px: f32,
    pub scroll_interval: Duration,
}

impl Default for ReorderTuning {
    fn default() -> Self {
        Self {
            dead_zone_start: 0.3,
            dead_zone_end: 0.7,
            hysteresis_px: 3.0,
            drag_start_distance_px: 10.0,
            edge_band_px: 40.0,
            scroll_step_px: 20.0,
            scroll_interval: Duration::from_millis(50),
        }
    }
}

impl ReorderTuning {
    #[tracing::instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let tuning = Self {
            dead_zone_start: cfg.get_f32("reorder.dead_zone_start")?.unwrap_or(defaults.dead_zone_start),
            dead_zone_end: cfg.get_f32("reorder.dead_zone_end")?.unwrap_or(defaults.dead_zone_end),
            hysteresis_px: cfg.get_f32("reorder.hysteresis_px")?.unwrap_or(defaults.hysteresis_px),
            drag_start_distance_px: cfg
                .get_f32("reorder.drag_start_distance_px")?
                .unwrap_or(defaults.drag_start_distance_px),
            edge_band_px: cfg.get_f32("reorder.edge_band_px")?.unwrap_or(defaults.edge_band_px),
            scroll_step_px: cfg.get_f32("reorder.scroll_step_px")?.unwrap_or(defaults.scroll_step_px),
            scroll_interval: cfg
                .get_u64("reorder.scroll_interval_ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.scroll_interval),
        };
        tuning.validate()?;
        tracing::debug!(?tuning, "loaded reorder tuning");
        Ok(tuning)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let zone_ok = (0.0..=1.0).contains(&self.dead_zone_start)
            && (0.0..=1.0).contains(&self.dead_zone_end)
            && self.dead_zone_start <= self.dead_zone_end;
        if !zone_ok {
            anyhow::bail!(
                "reorder dead zone must satisfy 0 <= start <= end <= 1, got {}..{}",
                self.dead_zone_start,
                self.dead_zone_end
            );
        }
        if self.hysteresis_px < 0.0
            || self.drag_start_distance_px < 0.0
            || self.edge_band_px < 0.0
            || self.scroll_step_px < 0.0
        {
            anyhow::bail!("reorder pixel settings cannot be negative");
        }
        if self.scroll_interval.is_zero() {
            anyhow::bail!("reorder.scroll_interval_ms must be positive");
        }
        Ok(())
    }
}
