use tracing::{debug, trace};
use uuid::Uuid;

use super::{ReorderError, ReorderTuning};

/// On-screen rectangle of one list item, in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemExtent {
    pub id: Uuid,
    pub top: f32,
    pub height: f32,
}

impl ItemExtent {
    pub fn new(id: Uuid, top: f32, height: f32) -> Self {
        Self { id, top, height }
    }

    fn dead_zone(&self, tuning: &ReorderTuning) -> (f32, f32) {
        (
            self.top + self.height * tuning.dead_zone_start,
            self.top + self.height * tuning.dead_zone_end,
        )
    }
}

/// Everything the resolver looks at for one pointer sample.
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    pub pointer_y: f32,
    /// Item extents in list order, placeholder excluded.
    pub extents: &'a [ItemExtent],
    /// The dragged item; skipped by the zone scan.
    pub excluded: Uuid,
    pub source_index: usize,
    pub prior_index: Option<usize>,
    pub last_sampled_y: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Above(usize),
    Dead,
    Below(usize),
}

/// Maps a pointer sample to an insertion index in the list with the dragged
/// item removed.
pub fn resolve(tuning: &ReorderTuning, probe: &Probe<'_>) -> usize {
    if let (Some(prior), Some(last_y)) = (probe.prior_index, probe.last_sampled_y)
        && (probe.pointer_y - last_y).abs() < tuning.hysteresis_px
    {
        trace!(pointer_y = probe.pointer_y, last_y, prior, "below hysteresis threshold");
        return prior;
    }

    let source = probe.extents.iter().position(|extent| extent.id == probe.excluded);
    let index = match scan(tuning, probe) {
        Ok(Zone::Above(raw)) | Ok(Zone::Below(raw)) => without_source(raw, source),
        Ok(Zone::Dead) => probe.prior_index.unwrap_or(probe.source_index),
        Err(err) => {
            debug!(error = %err, pointer_y = probe.pointer_y, "treating pointer as append");
            without_source(probe.extents.len(), source)
        }
    };

    trace!(pointer_y = probe.pointer_y, index, "resolved insertion index");
    index
}

fn scan(tuning: &ReorderTuning, probe: &Probe<'_>) -> Result<Zone, ReorderError> {
    if !probe.pointer_y.is_finite() {
        return Err(ReorderError::GeometryUnresolved);
    }

    let mut candidates = probe
        .extents
        .iter()
        .enumerate()
        .filter(|(_, extent)| extent.id != probe.excluded)
        .peekable();
    if candidates.peek().is_none() {
        return Err(ReorderError::GeometryUnresolved);
    }

    for (position, extent) in candidates {
        let (dead_start, dead_end) = extent.dead_zone(tuning);
        if probe.pointer_y < dead_start {
            return Ok(Zone::Above(position));
        }
        if probe.pointer_y < dead_end {
            return Ok(Zone::Dead);
        }
    }

    Ok(Zone::Below(probe.extents.len()))
}

// The placeholder goes into the list without the dragged item, so positions
// past the dragged item's slot shift up by one.
fn without_source(raw: usize, source: Option<usize>) -> usize {
    match source {
        Some(source) if raw > source => raw - 1,
        _ => raw,
    }
}
