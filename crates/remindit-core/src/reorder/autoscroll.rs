use std::time::Duration;

use tracing::{debug, trace, warn};

use super::{ReorderError, ReorderTuning};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    Up,
    #[default]
    Idle,
    Down,
}

/// Identifies one run of the periodic scroll timer. A stopped timer's token
/// is never reissued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start { token: TimerToken, interval: Duration },
    Stop(TimerToken),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub offset: f32,
    pub height: f32,
    pub content_height: f32,
}

impl Viewport {
    pub fn new(height: f32, content_height: f32) -> Self {
        Self {
            offset: 0.0,
            height,
            content_height,
        }
    }

    pub fn max_offset(&self) -> f32 {
        (self.content_height - self.height).max(0.0)
    }

    /// Applies `delta` within bounds and reports whether the offset moved.
    pub fn scroll_by(&mut self, delta: f32) -> bool {
        let next = (self.offset + delta).clamp(0.0, self.max_offset());
        if next == self.offset {
            return false;
        }
        self.offset = next;
        true
    }
}

#[derive(Debug, Clone)]
pub struct AutoScrollController {
    edge_band_px: f32,
    step_px: f32,
    interval: Duration,
    direction: ScrollDirection,
    active: Option<TimerToken>,
    issued: u64,
}

impl AutoScrollController {
    pub fn new(tuning: &ReorderTuning) -> Self {
        Self {
            edge_band_px: tuning.edge_band_px,
            step_px: tuning.scroll_step_px,
            interval: tuning.scroll_interval,
            direction: ScrollDirection::Idle,
            active: None,
            issued: 0,
        }
    }

    pub fn direction(&self) -> ScrollDirection {
        self.direction
    }

    pub fn active_timer(&self) -> Option<TimerToken> {
        self.active
    }

    /// Classifies the pointer against the viewport edges and starts or stops
    /// the timer on a direction change.
    pub fn update(&mut self, pointer_y: f32, viewport_height: f32) -> Vec<TimerCommand> {
        let direction = if pointer_y < self.edge_band_px {
            ScrollDirection::Up
        } else if pointer_y > viewport_height - self.edge_band_px {
            ScrollDirection::Down
        } else {
            ScrollDirection::Idle
        };

        if direction == self.direction {
            return Vec::new();
        }

        debug!(from = ?self.direction, to = ?direction, pointer_y, "auto-scroll direction changed");
        let mut commands = Vec::with_capacity(2);
        if let Some(token) = self.active.take() {
            commands.push(TimerCommand::Stop(token));
        }
        self.direction = direction;

        if direction != ScrollDirection::Idle {
            self.issued += 1;
            let token = TimerToken(self.issued);
            self.active = Some(token);
            commands.push(TimerCommand::Start {
                token,
                interval: self.interval,
            });
        }
        commands
    }

    /// Advances the viewport for one timer tick. Returns the new offset when
    /// it moved.
    pub fn tick(&mut self, token: TimerToken, viewport: &mut Viewport) -> Result<Option<f32>, ReorderError> {
        if self.active != Some(token) {
            return Err(ReorderError::ScrollStateDesync);
        }

        let delta = match self.direction {
            ScrollDirection::Up => -self.step_px,
            ScrollDirection::Down => self.step_px,
            ScrollDirection::Idle => {
                warn!(?token, "active timer while idle");
                return Err(ReorderError::ScrollStateDesync);
            }
        };

        if viewport.scroll_by(delta) {
            trace!(offset = viewport.offset, "auto-scrolled");
            Ok(Some(viewport.offset))
        } else {
            Ok(None)
        }
    }

    /// Stops scrolling regardless of direction.
    pub fn stop(&mut self) -> Option<TimerToken> {
        self.direction = ScrollDirection::Idle;
        self.active.take()
    }
}
