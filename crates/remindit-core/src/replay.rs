//! Scripted pointer host for the reorder engine.
//!
//! Plays a list of pointer events against a [`DragEngine`] using a fixed row
//! layout, the way a GUI would feed it, and records every render effect.

use std::path::Path;

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::reorder::{
    CancelReason, DragEngine, DragPhase, DropOutcome, ItemExtent, RenderEffect, ReorderTuning, TimerToken,
    Viewport,
};
use crate::store::ItemStore;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// `item` is the 1-based display index.
    Down { item: usize, y: f32 },
    Move { y: f32 },
    Up,
    Leave,
    Cancel,
    Tick {
        #[serde(default = "one")]
        count: u32,
    },
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowLayout {
    pub row_height: f32,
    pub row_spacing: f32,
}

impl RowLayout {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            row_height: cfg.get_f32("layout.row_height")?.unwrap_or(40.0),
            row_spacing: cfg.get_f32("layout.row_spacing")?.unwrap_or(5.0),
        })
    }

    pub fn content_height(&self, rows: usize) -> f32 {
        rows as f32 * (self.row_height + self.row_spacing)
    }

    /// Extents in viewport coordinates for the store order.
    pub fn extents(&self, store: &ItemStore, scroll_offset: f32) -> Vec<ItemExtent> {
        store
            .ids()
            .enumerate()
            .map(|(idx, id)| {
                let top = idx as f32 * (self.row_height + self.row_spacing) - scroll_offset;
                ItemExtent::new(id, top, self.row_height)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub outcomes: Vec<DropOutcome>,
    pub effects: Vec<RenderEffect>,
}

impl ReplaySummary {
    pub fn committed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome, DropOutcome::Committed { .. }))
    }
}

/// Reads a script: either a JSON array of events or one event per line.
pub fn load_script(path: &Path) -> anyhow::Result<Vec<ScriptEvent>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    parse_script(&raw).with_context(|| format!("failed parsing {}", path.display()))
}

pub fn parse_script(raw: &str) -> anyhow::Result<Vec<ScriptEvent>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim()).with_context(|| format!("line {}", idx + 1))
        })
        .collect()
}

#[instrument(skip_all, fields(events = events.len(), items = store.len()))]
pub fn run(
    store: &mut ItemStore,
    tuning: ReorderTuning,
    layout: RowLayout,
    viewport_height: f32,
    events: &[ScriptEvent],
) -> anyhow::Result<ReplaySummary> {
    let viewport = Viewport::new(viewport_height, layout.content_height(store.len()));
    let mut engine = DragEngine::new(tuning, viewport);
    let mut timer: Option<TimerToken> = None;
    let mut summary = ReplaySummary::default();

    for (step, event) in events.iter().enumerate() {
        debug!(step, ?event, "replaying event");
        let effects = match event {
            ScriptEvent::Down { item, y } => {
                let id = item
                    .checked_sub(1)
                    .and_then(|idx| store.list().get(idx))
                    .map(|item| item.id)
                    .ok_or_else(|| anyhow!("event {}: no item at position {item}", step + 1))?;
                engine.pointer_down(store, id, *y)
            }
            ScriptEvent::Move { y } => {
                let extents = layout.extents(store, engine.viewport().offset);
                engine.pointer_move(store, *y, &extents)
            }
            ScriptEvent::Up => {
                let report = engine.pointer_up(store);
                summary.outcomes.push(report.outcome);
                report.effects
            }
            ScriptEvent::Leave => engine.pointer_leave(),
            ScriptEvent::Cancel => engine.cancel(),
            ScriptEvent::Tick { count } => {
                let mut effects = Vec::new();
                if let Some(token) = timer {
                    for _ in 0..*count {
                        effects.extend(engine.scroll_tick(token));
                    }
                }
                effects
            }
        };

        for effect in &effects {
            match effect {
                RenderEffect::StartScrollTimer { token, .. } => timer = Some(*token),
                RenderEffect::StopScrollTimer(token) if timer == Some(*token) => timer = None,
                _ => {}
            }
        }
        summary.effects.extend(effects);
    }

    if engine.phase() != DragPhase::Idle {
        info!("script ended mid-drag; cancelling");
        summary.effects.extend(engine.cancel());
        summary.outcomes.push(DropOutcome::Cancelled(CancelReason::Aborted));
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Utc};

    use super::{RowLayout, ScriptEvent, parse_script, run};
    use crate::item::Item;
    use crate::reorder::{CancelReason, DropOutcome, RenderEffect, ReorderTuning};
    use crate::store::ItemStore;

    fn store_of(titles: &[&str]) -> ItemStore {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 2, 8, 0, 0)
            .single()
            .expect("valid now");
        let at = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
        ItemStore::from_items(
            titles
                .iter()
                .map(|title| Item::new(title.to_string(), String::new(), at, now)),
        )
        .expect("unique ids")
    }

    fn titles(store: &ItemStore) -> Vec<String> {
        store.list().iter().map(|item| item.title.clone()).collect()
    }

    const LAYOUT: RowLayout = RowLayout {
        row_height: 40.0,
        row_spacing: 5.0,
    };

    #[test]
    fn parses_lines_and_arrays() {
        let lines = parse_script(
            "{\"event\":\"down\",\"item\":1,\"y\":60}\n\n{\"event\":\"tick\"}\n{\"event\":\"up\"}\n",
        )
        .expect("parse lines");
        assert_eq!(
            lines,
            vec![
                ScriptEvent::Down { item: 1, y: 60.0 },
                ScriptEvent::Tick { count: 1 },
                ScriptEvent::Up,
            ]
        );

        let array = parse_script(r#"[{"event":"move","y":3.5},{"event":"leave"}]"#).expect("parse array");
        assert_eq!(array, vec![ScriptEvent::Move { y: 3.5 }, ScriptEvent::Leave]);
    }

    #[test]
    fn scripted_drag_commits() {
        let mut store = store_of(&["A", "B", "C"]);
        let events = vec![
            ScriptEvent::Down { item: 1, y: 60.0 },
            ScriptEvent::Move { y: 80.0 },
            ScriptEvent::Move { y: 150.0 },
            ScriptEvent::Up,
        ];

        let summary = run(&mut store, ReorderTuning::default(), LAYOUT, 400.0, &events).expect("replay");
        assert!(summary.committed());
        assert_eq!(titles(&store), ["B", "C", "A"]);
    }

    #[test]
    fn ticks_follow_the_active_timer() {
        let mut store = store_of(&["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"]);
        let events = vec![
            ScriptEvent::Down { item: 2, y: 60.0 },
            ScriptEvent::Move { y: 385.0 },
            ScriptEvent::Tick { count: 3 },
            ScriptEvent::Move { y: 200.0 },
            ScriptEvent::Tick { count: 2 },
            ScriptEvent::Leave,
        ];

        let before = store.clone();
        let summary = run(&mut store, ReorderTuning::default(), LAYOUT, 400.0, &events).expect("replay");
        let scrolls: Vec<f32> = summary
            .effects
            .iter()
            .filter_map(|effect| match effect {
                RenderEffect::ScrollOffset(offset) => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(scrolls, vec![20.0, 40.0, 50.0]);
        assert!(summary.outcomes.is_empty());
        assert_eq!(store, before);
    }

    #[test]
    fn unfinished_script_is_cancelled() {
        let mut store = store_of(&["A", "B"]);
        let before = store.clone();
        let events = vec![ScriptEvent::Down { item: 2, y: 60.0 }, ScriptEvent::Move { y: 5.0 }];

        let summary = run(&mut store, ReorderTuning::default(), LAYOUT, 400.0, &events).expect("replay");
        assert_eq!(summary.outcomes, vec![DropOutcome::Cancelled(CancelReason::Aborted)]);
        assert!(summary.effects.contains(&RenderEffect::PlaceholderHidden));
        assert_eq!(store, before);
    }

    #[test]
    fn unknown_item_position_is_an_error() {
        let mut store = store_of(&["A"]);
        let events = vec![ScriptEvent::Down { item: 4, y: 10.0 }];
        assert!(run(&mut store, ReorderTuning::default(), LAYOUT, 400.0, &events).is_err());
    }
}
