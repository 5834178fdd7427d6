//! Preparing a surface for a session: snapshot first, then inject groups.

use std::num::NonZeroUsize;

use tracing::{debug, warn};

use crate::segment::segment;
use crate::surface::{GroupScope, Surface, SurfaceError};

/// A surface that has been snapshotted and injected with word groups.
pub struct Prepared<S: Surface> {
    pub groups: Vec<S::Group>,
    pub snapshot: S::Snapshot,
}

/// Wrap every visible text unit on the page in group units.
///
/// Returns `Ok(None)` without touching the surface when there is nothing
/// visible to read.
pub fn prepare_on_page<S: Surface>(
    surface: &mut S,
    group_size: NonZeroUsize,
) -> Result<Option<Prepared<S>>, SurfaceError> {
    let units = surface.visible_text_units();
    if units.is_empty() {
        return Ok(None);
    }

    let snapshot = surface.snapshot();
    // Back to front, so splicing a unit never shifts one still to be wrapped.
    for unit in units.iter().rev() {
        let groups = segment(&unit.text, group_size);
        if let Err(err) = surface.wrap_text_unit(unit, &groups) {
            undo(surface, snapshot);
            return Err(err);
        }
    }

    let groups = surface.collect_groups(GroupScope::Region);
    debug!(units = units.len(), groups = groups.len(), "wrapped page text");
    Ok(Some(Prepared { groups, snapshot }))
}

/// Replace the page with the pasted-text reader.
///
/// Callers reject blank text before getting here.
pub fn prepare_pasted<S: Surface>(
    surface: &mut S,
    text: &str,
    group_size: NonZeroUsize,
) -> Result<Prepared<S>, SurfaceError> {
    let groups = segment(text, group_size);
    let snapshot = surface.snapshot();
    if let Err(err) = surface.mount_reader(&groups) {
        undo(surface, snapshot);
        return Err(err);
    }

    let groups = surface.collect_groups(GroupScope::Reader);
    debug!(groups = groups.len(), "mounted reader");
    Ok(Prepared { groups, snapshot })
}

fn undo<S: Surface>(surface: &mut S, snapshot: S::Snapshot) {
    if let Err(err) = surface.restore(snapshot) {
        warn!(%err, "could not undo a partial injection");
    }
}
