//! The rendering surface the reading engine works against.
//!
//! Anything that can enumerate its visible text, swap a piece of text for
//! addressable word groups, style those groups, and snapshot/restore its
//! content region can host a reading session. [`crate::document::Document`]
//! is the headless implementation used by the terminal app and the tests.

use std::fmt;

use thiserror::Error;

use crate::segment::WordGroup;

/// Class added to the group currently highlighted.
pub const HIGHLIGHT_CLASS: &str = "flashread-highlight";
/// Id of the full-viewport container mounted for pasted text.
pub const OVERLAY_ID: &str = "flashread-overlay";
/// Id of the dismiss control inside the overlay.
pub const CLOSE_BUTTON_ID: &str = "flashread-close";
/// Id of the container holding pasted-text groups.
pub const CONTENT_ID: &str = "flashread-content";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("snapshot was taken from generation {taken}, surface is at generation {current}")]
    StaleSnapshot { taken: u64, current: u64 },
    #[error("no {expected} at {location}")]
    Detached {
        expected: &'static str,
        location: String,
    },
}

/// A run of visible text eligible for wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit<L> {
    pub locator: L,
    pub text: String,
}

/// Where to look for group units when collecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope {
    /// The whole content region.
    Region,
    /// Only the pasted-text reader's content container.
    Reader,
}

pub trait Surface {
    type Snapshot;
    type Locator: Clone + fmt::Debug;
    type Group: Clone + fmt::Debug;
    type Scroll: Copy + fmt::Debug;

    /// Verbatim copy of the content region.
    fn snapshot(&self) -> Self::Snapshot;

    /// Overwrite the content region with `snapshot`.
    fn restore(&mut self, snapshot: Self::Snapshot) -> Result<(), SurfaceError>;

    /// Visible, non-blank text leaves in document order.
    fn visible_text_units(&self) -> Vec<TextUnit<Self::Locator>>;

    /// Replace one text leaf with group units, in place.
    fn wrap_text_unit(
        &mut self,
        unit: &TextUnit<Self::Locator>,
        groups: &[WordGroup],
    ) -> Result<(), SurfaceError>;

    /// Replace the content region with the pasted-text reader holding `groups`.
    fn mount_reader(&mut self, groups: &[WordGroup]) -> Result<(), SurfaceError>;

    /// Group units within `scope`, in document order.
    fn collect_groups(&self, scope: GroupScope) -> Vec<Self::Group>;

    /// Apply the highlight in `color`, or clear it when `None`.
    fn set_highlight(&mut self, group: &Self::Group, color: Option<&str>)
        -> Result<(), SurfaceError>;

    /// Scroll so `group` is centered, unless it is already in view.
    fn scroll_into_view(&mut self, group: &Self::Group);

    fn scroll_position(&self) -> Self::Scroll;

    fn set_scroll_position(&mut self, position: Self::Scroll);

    /// Degraded cleanup: drop a single injected group unit if still present.
    fn remove_group(&mut self, group: &Self::Group);

    /// Degraded cleanup: drop the pasted-text reader if mounted.
    fn remove_reader(&mut self);
}
