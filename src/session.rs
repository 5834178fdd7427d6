use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WORDS_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(300) {
    Some(wpm) => wpm,
    None => unreachable!(),
};
pub const DEFAULT_GROUP_SIZE: NonZeroUsize = NonZeroUsize::MIN;
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#add8e6";

/// Where the reading content comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum Source {
    #[strum(to_string = "on-page")]
    #[serde(rename = "onPage")]
    OnPage,
    #[strum(to_string = "pasted")]
    #[serde(rename = "pastedText")]
    Pasted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Running(Source),
    Paused(Source),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Inactive)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, SessionState::Paused(_))
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            SessionState::Inactive => None,
            SessionState::Running(source) | SessionState::Paused(source) => Some(*source),
        }
    }
}

/// Pacing and styling fixed when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub color: String,
    pub group_size: NonZeroUsize,
    pub words_per_minute: NonZeroU32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            group_size: DEFAULT_GROUP_SIZE,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
        }
    }
}

/// Floor for [`tick_delay`] so an absurd speed cannot spin the timer.
pub const MIN_TICK_DELAY: Duration = Duration::from_millis(1);

/// Time between ticks. One tick advances one group, whatever its size.
pub fn tick_delay(words_per_minute: NonZeroU32) -> Duration {
    Duration::from_micros(60_000_000 / u64::from(words_per_minute.get())).max(MIN_TICK_DELAY)
}

/// Outcome of advancing the cursor by one tick.
#[derive(Debug, PartialEq, Eq)]
pub enum Step<'a, G> {
    Highlight {
        previous: Option<&'a G>,
        current: &'a G,
    },
    Finished,
}

/// The single live reading session: its groups, cursor, and what to put
/// back when it ends.
#[derive(Debug)]
pub struct Session<G, C, S> {
    source: Source,
    groups: Vec<G>,
    cursor: usize,
    paused: bool,
    settings: Settings,
    saved_content: C,
    saved_scroll: S,
}

impl<G, C, S: Copy> Session<G, C, S> {
    pub fn new(
        source: Source,
        groups: Vec<G>,
        settings: Settings,
        saved_content: C,
        saved_scroll: S,
    ) -> Self {
        Self {
            source,
            groups,
            cursor: 0,
            paused: false,
            settings,
            saved_content,
            saved_scroll,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.paused {
            SessionState::Paused(self.source)
        } else {
            SessionState::Running(self.source)
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn groups(&self) -> &[G] {
        &self.groups
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn delay(&self) -> Duration {
        tick_delay(self.settings.words_per_minute)
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self, words_per_minute: Option<NonZeroU32>) {
        if let Some(wpm) = words_per_minute {
            self.settings.words_per_minute = wpm;
        }
        self.paused = false;
    }

    pub fn advance(&mut self) -> Step<'_, G> {
        if self.cursor >= self.groups.len() {
            return Step::Finished;
        }
        let index = self.cursor;
        self.cursor += 1;
        Step::Highlight {
            previous: index.checked_sub(1).map(|i| &self.groups[i]),
            current: &self.groups[index],
        }
    }

    /// Consume the session, handing back what restoration needs.
    pub fn into_parts(self) -> (Vec<G>, C, S) {
        (self.groups, self.saved_content, self.saved_scroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn session(groups: Vec<&'static str>) -> Session<&'static str, (), usize> {
        Session::new(Source::OnPage, groups, Settings::default(), (), 0)
    }

    #[test]
    fn delay_is_sixty_thousand_over_wpm() {
        let wpm = |n| NonZeroU32::new(n).unwrap();
        assert_eq!(tick_delay(wpm(300)), Duration::from_millis(200));
        assert_eq!(tick_delay(wpm(60)), Duration::from_millis(1000));
        assert_eq!(tick_delay(wpm(150)), Duration::from_millis(400));
        assert_eq!(tick_delay(wpm(7)), Duration::from_micros(8_571_428));
    }

    #[test]
    fn huge_speeds_never_reach_a_zero_delay() {
        let wpm = |n| NonZeroU32::new(n).unwrap();
        assert_eq!(tick_delay(wpm(60_000)), MIN_TICK_DELAY);
        assert_eq!(tick_delay(wpm(70_000_000)), MIN_TICK_DELAY);
        assert_eq!(tick_delay(wpm(u32::MAX)), MIN_TICK_DELAY);
    }

    #[test]
    fn advance_walks_groups_then_finishes() {
        let mut s = session(vec!["a", "b"]);
        assert_matches!(s.advance(), Step::Highlight { previous: None, current: &"a" });
        assert_matches!(
            s.advance(),
            Step::Highlight { previous: Some(&"a"), current: &"b" }
        );
        assert_eq!(s.cursor(), 2);
        assert_matches!(s.advance(), Step::Finished);
        assert_eq!(s.cursor(), 2, "cursor never passes the group count");
    }

    #[test]
    fn pause_and_resume_keep_the_cursor() {
        let mut s = session(vec!["a", "b", "c"]);
        s.advance();
        s.pause();
        assert_eq!(s.state(), SessionState::Paused(Source::OnPage));
        s.resume(NonZeroU32::new(150));
        assert_eq!(s.state(), SessionState::Running(Source::OnPage));
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.delay(), Duration::from_millis(400));
    }

    #[test]
    fn resume_without_speed_keeps_the_old_one() {
        let mut s = session(vec!["a"]);
        s.pause();
        s.resume(None);
        assert_eq!(s.settings().words_per_minute, DEFAULT_WORDS_PER_MINUTE);
    }

    #[test]
    fn state_helpers() {
        assert!(!SessionState::Inactive.is_active());
        assert!(SessionState::Paused(Source::Pasted).is_active());
        assert!(SessionState::Paused(Source::Pasted).is_paused());
        assert_eq!(SessionState::Running(Source::Pasted).source(), Some(Source::Pasted));
        assert_eq!(Source::OnPage.to_string(), "on-page");
    }
}
