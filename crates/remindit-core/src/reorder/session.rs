//! Drag session state machine.
//!
//! # Phases
//!
//! - `Idle`: nothing pressed.
//! - `Pressed`: pointer went down on an item but has not moved far enough.
//! - `Dragging`: an item is detached; every move re-resolves the insertion
//!   index, moves the placeholder and updates auto-scroll, in that order.
//!
//! Drop, leave and cancel always end in `Idle` with the placeholder cleared
//! and the scroll timer stopped. Only a drop with a resolved index touches the
//! store, and it does so with a single [`ItemStore::reorder`].

use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::autoscroll::{AutoScrollController, ScrollDirection, TimerCommand, TimerToken, Viewport};
use super::geometry::{ItemExtent, Probe, resolve};
use super::placeholder::PlaceholderTracker;
use super::{ReorderError, ReorderTuning};
use crate::store::ItemStore;

/// Instruction for the rendering host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEffect {
    /// Hide the live row and render only the drag preview.
    ShowPreview(Uuid),
    /// Render the row normally again.
    RestoreItem(Uuid),
    PlaceholderAt(usize),
    PlaceholderHidden,
    ScrollOffset(f32),
    StartScrollTimer { token: TimerToken, interval: Duration },
    StopScrollTimer(TimerToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Pressed,
    Dragging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Pointer left the drop region.
    Left,
    /// Explicit cancel, e.g. the window closed.
    Aborted,
    /// Drop arrived before any insertion index was resolved.
    Unresolved,
    /// The dragged item disappeared from the store mid-drag.
    InvalidReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Committed { item: Uuid, from: usize, to: usize },
    Cancelled(CancelReason),
    /// Pointer-up without an active drag (a plain click).
    NoSession,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropReport {
    pub outcome: DropOutcome,
    pub effects: Vec<RenderEffect>,
}

#[derive(Debug, Clone)]
struct DragSession {
    dragged: Uuid,
    source_index: usize,
    insert_index: Option<usize>,
    last_sampled_y: Option<f32>,
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Pressed { item: Uuid, origin_y: f32 },
    Dragging(DragSession),
}

#[derive(Debug, Clone)]
pub struct DragEngine {
    tuning: ReorderTuning,
    state: State,
    placeholder: PlaceholderTracker,
    scroll: AutoScrollController,
    viewport: Viewport,
}

impl DragEngine {
    pub fn new(tuning: ReorderTuning, viewport: Viewport) -> Self {
        let scroll = AutoScrollController::new(&tuning);
        Self {
            tuning,
            state: State::Idle,
            placeholder: PlaceholderTracker::default(),
            scroll,
            viewport,
        }
    }

    pub fn phase(&self) -> DragPhase {
        match self.state {
            State::Idle => DragPhase::Idle,
            State::Pressed { .. } => DragPhase::Pressed,
            State::Dragging(_) => DragPhase::Dragging,
        }
    }

    pub fn dragged(&self) -> Option<Uuid> {
        match &self.state {
            State::Dragging(session) => Some(session.dragged),
            _ => None,
        }
    }

    pub fn insert_index(&self) -> Option<usize> {
        match &self.state {
            State::Dragging(session) => session.insert_index,
            _ => None,
        }
    }

    pub fn placeholder(&self) -> &PlaceholderTracker {
        &self.placeholder
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scroll_direction(&self) -> ScrollDirection {
        self.scroll.direction()
    }

    pub fn scroll_timer(&self) -> Option<TimerToken> {
        self.scroll.active_timer()
    }

    #[instrument(skip(self, store))]
    pub fn pointer_down(&mut self, store: &ItemStore, item: Uuid, y: f32) -> Vec<RenderEffect> {
        if let State::Dragging(session) = &self.state {
            debug!(dragged = %session.dragged, "drag already active; ignoring press");
            return Vec::new();
        }
        if store.position(item).is_none() {
            debug!(%item, "press on unknown item");
            self.state = State::Idle;
            return Vec::new();
        }

        self.state = State::Pressed { item, origin_y: y };
        Vec::new()
    }

    #[instrument(skip(self, store, extents), fields(extents = extents.len()))]
    pub fn pointer_move(&mut self, store: &ItemStore, y: f32, extents: &[ItemExtent]) -> Vec<RenderEffect> {
        let mut effects = Vec::new();

        if let State::Pressed { item, origin_y } = self.state {
            if !y.is_finite() {
                debug!(y, "ignoring non-finite pointer before drag start");
                return effects;
            }
            if (y - origin_y).abs() < self.tuning.drag_start_distance_px {
                return effects;
            }
            let Some(source_index) = store.position(item) else {
                debug!(%item, "pressed item vanished before drag start");
                self.state = State::Idle;
                return effects;
            };

            info!(%item, source_index, "drag started");
            self.placeholder = PlaceholderTracker::new(store.ids().filter(|id| *id != item));
            self.state = State::Dragging(DragSession {
                dragged: item,
                source_index,
                insert_index: None,
                last_sampled_y: None,
            });
            effects.push(RenderEffect::ShowPreview(item));
        }

        let State::Dragging(session) = &mut self.state else {
            return effects;
        };

        let dragged = session.dragged;
        let shown = self.placeholder.index();
        self.placeholder.sync_items(store.ids().filter(|id| *id != dragged));

        let resolved = resolve(
            &self.tuning,
            &Probe {
                pointer_y: y,
                extents,
                excluded: dragged,
                source_index: session.source_index,
                prior_index: session.insert_index,
                last_sampled_y: session.last_sampled_y,
            },
        );

        // The sync alone can move the marker when rows disappear.
        self.placeholder.set_index(resolved);
        if self.placeholder.index() != shown {
            effects.push(match self.placeholder.index() {
                Some(index) => RenderEffect::PlaceholderAt(index),
                None => RenderEffect::PlaceholderHidden,
            });
        }
        session.insert_index = self.placeholder.index();
        session.last_sampled_y = Some(y);

        let commands = self.scroll.update(y, self.viewport.height);
        effects.extend(commands.into_iter().map(timer_effect));
        effects
    }

    #[instrument(skip(self, store))]
    pub fn pointer_up(&mut self, store: &mut ItemStore) -> DropReport {
        let session = match std::mem::replace(&mut self.state, State::Idle) {
            State::Dragging(session) => session,
            State::Pressed { .. } | State::Idle => {
                return DropReport {
                    outcome: DropOutcome::NoSession,
                    effects: Vec::new(),
                };
            }
        };

        let target = session.insert_index.and(self.placeholder.index());
        let mut effects = self.teardown();

        let outcome = match target {
            None => {
                debug!(dragged = %session.dragged, "drop without a resolved index");
                DropOutcome::Cancelled(CancelReason::Unresolved)
            }
            Some(target) => match store.reorder(session.dragged, target) {
                Ok(moved) => {
                    info!(item = %session.dragged, from = moved.from, to = moved.to, "drag committed");
                    DropOutcome::Committed {
                        item: session.dragged,
                        from: moved.from,
                        to: moved.to,
                    }
                }
                Err(err) => {
                    warn!(error = %err, "dropped item no longer exists; cancelling");
                    DropOutcome::Cancelled(CancelReason::InvalidReference)
                }
            },
        };

        effects.push(RenderEffect::RestoreItem(session.dragged));
        DropReport { outcome, effects }
    }

    pub fn pointer_leave(&mut self) -> Vec<RenderEffect> {
        self.abort(CancelReason::Left)
    }

    /// Unconditional cancel for window close or an explicit escape.
    pub fn cancel(&mut self) -> Vec<RenderEffect> {
        self.abort(CancelReason::Aborted)
    }

    pub fn scroll_tick(&mut self, token: TimerToken) -> Vec<RenderEffect> {
        if !matches!(self.state, State::Dragging(_)) {
            debug!(?token, error = %ReorderError::ScrollStateDesync, "tick outside a drag");
            return Vec::new();
        }

        match self.scroll.tick(token, &mut self.viewport) {
            Ok(Some(offset)) => vec![RenderEffect::ScrollOffset(offset)],
            Ok(None) => Vec::new(),
            Err(err) => {
                debug!(?token, error = %err, "ignoring stale scroll tick");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    fn abort(&mut self, reason: CancelReason) -> Vec<RenderEffect> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Dragging(session) => {
                info!(dragged = %session.dragged, ?reason, "drag cancelled");
                let mut effects = self.teardown();
                effects.push(RenderEffect::RestoreItem(session.dragged));
                effects
            }
            State::Pressed { .. } | State::Idle => self.teardown(),
        }
    }

    fn teardown(&mut self) -> Vec<RenderEffect> {
        let mut effects = Vec::new();
        if let Some(token) = self.scroll.stop() {
            effects.push(RenderEffect::StopScrollTimer(token));
        }
        if self.placeholder.clear() {
            effects.push(RenderEffect::PlaceholderHidden);
        }
        self.placeholder = PlaceholderTracker::default();
        effects
    }
}

fn timer_effect(command: TimerCommand) -> RenderEffect {
    match command {
        TimerCommand::Start { token, interval } => RenderEffect::StartScrollTimer { token, interval },
        TimerCommand::Stop(token) => RenderEffect::StopScrollTimer(token),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    use super::{CancelReason, DragEngine, DragPhase, DropOutcome, RenderEffect};
    use crate::item::Item;
    use crate::reorder::{ItemExtent, ReorderTuning, ScrollDirection, Slot, Viewport};
    use crate::store::ItemStore;

    const TOP: f32 = 100.0;
    const ROW: f32 = 40.0;

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

    fn id_of(store: &ItemStore, title: &str) -> Uuid {
        store
            .list()
            .iter()
            .find(|item| item.title == title)
            .map(|item| item.id)
            .expect("item present")
    }

    fn titles(store: &ItemStore) -> Vec<String> {
        store.list().iter().map(|item| item.title.clone()).collect()
    }

    fn extents(store: &ItemStore) -> Vec<ItemExtent> {
        store
            .ids()
            .enumerate()
            .map(|(idx, id)| ItemExtent::new(id, TOP + idx as f32 * ROW, ROW))
            .collect()
    }

    fn center_of(index: usize) -> f32 {
        TOP + index as f32 * ROW + ROW / 2.0
    }

    fn engine() -> DragEngine {
        DragEngine::new(ReorderTuning::default(), Viewport::new(400.0, 400.0))
    }

    fn start_drag(engine: &mut DragEngine, store: &ItemStore, title: &str, to_y: f32) -> Vec<RenderEffect> {
        let id = id_of(store, title);
        let index = store.position(id).expect("present");
        engine.pointer_down(store, id, center_of(index));
        engine.pointer_move(store, to_y, &extents(store))
    }

    #[test]
    fn drag_first_below_last() {
        let mut store = store_of(&["A", "B", "C"]);
        let mut engine = engine();

        let effects = start_drag(&mut engine, &store, "A", 135.0);
        assert_eq!(effects.first(), Some(&RenderEffect::ShowPreview(id_of(&store, "A"))));
        assert_eq!(engine.insert_index(), Some(0));

        engine.pointer_move(&store, 240.0, &extents(&store));
        assert_eq!(engine.insert_index(), Some(2));

        let report = engine.pointer_up(&mut store);
        assert!(matches!(report.outcome, DropOutcome::Committed { from: 0, to: 2, .. }));
        assert_eq!(titles(&store), ["B", "C", "A"]);
        assert_eq!(engine.phase(), DragPhase::Idle);
        assert!(!engine.placeholder().is_visible());
    }

    #[test]
    fn drag_last_above_first() {
        let mut store = store_of(&["A", "B", "C"]);
        let mut engine = engine();

        start_drag(&mut engine, &store, "C", 185.0);
        engine.pointer_move(&store, 105.0, &extents(&store));
        assert_eq!(engine.placeholder().slots()[0], Slot::Placeholder);

        let report = engine.pointer_up(&mut store);
        assert!(matches!(report.outcome, DropOutcome::Committed { from: 2, to: 0, .. }));
        assert!(report.effects.contains(&RenderEffect::PlaceholderHidden));
        assert!(report.effects.contains(&RenderEffect::RestoreItem(id_of(&store, "C"))));
        assert_eq!(titles(&store), ["C", "A", "B"]);
    }

    #[test]
    fn top_edge_starts_and_center_stops_scrolling() {
        let store = store_of(&["A", "B", "C"]);
        let mut engine = engine();

        start_drag(&mut engine, &store, "B", 140.0);
        assert_eq!(engine.scroll_timer(), None);

        let effects = engine.pointer_move(&store, 10.0, &extents(&store));
        let token = engine.scroll_timer().expect("timer started");
        assert!(effects.contains(&RenderEffect::StartScrollTimer {
            token,
            interval: ReorderTuning::default().scroll_interval,
        }));
        assert_eq!(engine.scroll_direction(), ScrollDirection::Up);

        let effects = engine.pointer_move(&store, 200.0, &extents(&store));
        assert!(effects.contains(&RenderEffect::StopScrollTimer(token)));
        assert_eq!(engine.scroll_timer(), None);
    }

    #[test]
    fn scroll_ticks_move_the_viewport_until_drop() {
        let mut store = store_of(&["A", "B", "C"]);
        let mut engine = DragEngine::new(ReorderTuning::default(), Viewport::new(400.0, 1000.0));

        start_drag(&mut engine, &store, "A", 390.0);
        let token = engine.scroll_timer().expect("timer started");
        assert_eq!(engine.scroll_tick(token), vec![RenderEffect::ScrollOffset(20.0)]);

        let report = engine.pointer_up(&mut store);
        assert!(report.effects.contains(&RenderEffect::StopScrollTimer(token)));
        assert!(engine.scroll_tick(token).is_empty());
        assert_eq!(engine.viewport().offset, 20.0);
    }

    #[test]
    fn leaving_discards_the_session() {
        let store = store_of(&["A", "B", "C"]);
        let before = store.clone();
        let mut engine = engine();

        start_drag(&mut engine, &store, "B", 175.0);
        engine.pointer_move(&store, 110.0, &extents(&store));
        assert!(engine.placeholder().is_visible());

        let effects = engine.pointer_leave();
        assert!(effects.contains(&RenderEffect::PlaceholderHidden));
        assert!(effects.contains(&RenderEffect::RestoreItem(id_of(&store, "B"))));
        assert_eq!(store, before);
        assert_eq!(engine.phase(), DragPhase::Idle);
        assert!(!engine.placeholder().is_visible());
    }

    #[test]
    fn deleting_the_dragged_item_cancels_the_drop() {
        let mut store = store_of(&["A", "B", "C"]);
        let mut engine = engine();

        start_drag(&mut engine, &store, "B", 240.0);
        let dragged = id_of(&store, "B");
        store.remove(dragged).expect("remove mid-drag");
        let after_delete = store.clone();

        let report = engine.pointer_up(&mut store);
        assert_eq!(report.outcome, DropOutcome::Cancelled(CancelReason::InvalidReference));
        assert_eq!(store, after_delete);
        assert_eq!(engine.phase(), DragPhase::Idle);
    }

    #[test]
    fn deleting_a_row_mid_drag_reports_the_shifted_placeholder() {
        let mut store = store_of(&["A", "B", "C", "D"]);
        let mut engine = engine();

        let effects = start_drag(&mut engine, &store, "A", 300.0);
        assert!(effects.contains(&RenderEffect::PlaceholderAt(3)));

        store.remove(id_of(&store, "D")).expect("remove mid-drag");
        let effects = engine.pointer_move(&store, 301.0, &extents(&store));
        assert_eq!(effects, vec![RenderEffect::PlaceholderAt(2)]);
        assert_eq!(engine.insert_index(), Some(2));

        let report = engine.pointer_up(&mut store);
        assert!(matches!(report.outcome, DropOutcome::Committed { from: 0, to: 2, .. }));
        assert_eq!(titles(&store), ["B", "C", "A"]);
    }

    #[test]
    fn non_finite_pointer_does_not_start_a_drag() {
        let store = store_of(&["A", "B"]);
        let mut engine = engine();

        engine.pointer_down(&store, id_of(&store, "A"), center_of(0));
        assert!(engine.pointer_move(&store, f32::NAN, &extents(&store)).is_empty());
        assert!(engine.pointer_move(&store, f32::INFINITY, &extents(&store)).is_empty());
        assert_eq!(engine.phase(), DragPhase::Pressed);
        assert_eq!(engine.dragged(), None);
    }

    #[test]
    fn small_press_movement_is_a_click() {
        let mut store = store_of(&["A", "B"]);
        let before = store.clone();
        let mut engine = engine();

        let id = id_of(&store, "A");
        engine.pointer_down(&store, id, 120.0);
        assert!(engine.pointer_move(&store, 125.0, &extents(&store)).is_empty());
        assert_eq!(engine.phase(), DragPhase::Pressed);

        assert_eq!(engine.pointer_up(&mut store).outcome, DropOutcome::NoSession);
        assert_eq!(store, before);
    }

    #[test]
    fn second_press_does_not_start_another_session() {
        let store = store_of(&["A", "B", "C"]);
        let mut engine = engine();

        start_drag(&mut engine, &store, "A", 240.0);
        let other = id_of(&store, "C");
        assert!(engine.pointer_down(&store, other, 200.0).is_empty());
        assert_eq!(engine.dragged(), Some(id_of(&store, "A")));
    }

    #[test]
    fn jitter_below_threshold_keeps_the_index() {
        let store = store_of(&["A", "B", "C", "D"]);
        let mut engine = engine();

        start_drag(&mut engine, &store, "A", 150.0);
        engine.pointer_move(&store, 160.0, &extents(&store));
        engine.pointer_move(&store, 166.5, &extents(&store));
        assert_eq!(engine.insert_index(), Some(0));

        // 168.5 is already past B's dead zone.
        engine.pointer_move(&store, 168.5, &extents(&store));
        assert_eq!(engine.insert_index(), Some(0));

        engine.pointer_move(&store, 172.0, &extents(&store));
        assert_eq!(engine.insert_index(), Some(1));
    }

    #[test]
    fn placeholder_visible_only_while_dragging() {
        let mut store = store_of(&["A", "B"]);
        let mut engine = engine();
        assert!(!engine.placeholder().is_visible());

        let id = id_of(&store, "B");
        engine.pointer_down(&store, id, center_of(1));
        assert!(!engine.placeholder().is_visible());

        engine.pointer_move(&store, 105.0, &extents(&store));
        assert_eq!(engine.phase(), DragPhase::Dragging);
        assert!(engine.placeholder().is_visible());

        engine.pointer_up(&mut store);
        assert!(!engine.placeholder().is_visible());
        assert_eq!(titles(&store), ["B", "A"]);
    }

    #[test]
    fn any_drop_moves_exactly_one_item() {
        for count in 1..=5 {
            let names: Vec<String> = (0..count).map(|idx| format!("t{idx}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();

            for source in 0..count {
                for target in 0..count {
                    let mut store = store_of(&refs);
                    let mut engine = engine();
                    let dragged = names[source].clone();

                    let bottom = TOP + count as f32 * ROW;
                    start_drag(&mut engine, &store, &dragged, bottom + 50.0);

                    let candidates: Vec<usize> = (0..count).filter(|idx| *idx != source).collect();
                    let pointer_y = match candidates.get(target) {
                        Some(raw) => TOP + *raw as f32 * ROW + 2.0,
                        None => bottom + 10.0,
                    };
                    engine.pointer_move(&store, pointer_y, &extents(&store));
                    engine.pointer_up(&mut store);

                    let mut expected = names.clone();
                    let moved = expected.remove(source);
                    expected.insert(target, moved);
                    assert_eq!(titles(&store), expected, "count={count} source={source} target={target}");
                }
            }
        }
    }

    #[test]
    fn cancel_after_moves_never_changes_the_store() {
        let store = store_of(&["A", "B", "C", "D"]);
        let before = store.clone();
        let mut engine = engine();

        start_drag(&mut engine, &store, "C", 10.0);
        for y in [60.0, 130.0, 250.0, 395.0, 20.0] {
            engine.pointer_move(&store, y, &extents(&store));
        }
        let effects = engine.cancel();
        assert!(effects.iter().any(|effect| matches!(effect, RenderEffect::StopScrollTimer(_))));
        assert_eq!(store, before);
        assert_eq!(engine.scroll_timer(), None);
        assert_eq!(engine.phase(), DragPhase::Idle);
    }
}
