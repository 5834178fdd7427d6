//! The reading engine: owns the single session and drives it through
//! start, ticks, pause/resume and teardown.

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, trace, warn};

use crate::capture::{prepare_on_page, prepare_pasted, Prepared};
use crate::message::{words_per_minute, Command, Notice, Notifier};
use crate::session::{Session, SessionState, Settings, Source, Step};
use crate::surface::{Surface, SurfaceError};
use crate::timer::RepeatingTimer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("pasted text is empty")]
    EmptyText,
    #[error("no visible text to read on this page")]
    NothingToRead,
    #[error("could not prepare the page: {0}")]
    Surface(#[from] SurfaceError),
}

/// What to start reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRequest {
    OnPage,
    Pasted(String),
}

impl StartRequest {
    fn source(&self) -> Source {
        match self {
            StartRequest::OnPage => Source::OnPage,
            StartRequest::Pasted(_) => Source::Pasted,
        }
    }
}

type LiveSession<S> =
    Session<<S as Surface>::Group, <S as Surface>::Snapshot, <S as Surface>::Scroll>;

pub struct Engine<S: Surface, N: Notifier> {
    surface: S,
    notifier: N,
    session: Option<LiveSession<S>>,
    timer: RepeatingTimer,
}

impl<S: Surface, N: Notifier> Engine<S, N> {
    pub fn new(surface: S, notifier: N) -> Self {
        Self {
            surface,
            notifier,
            session: None,
            timer: RepeatingTimer::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Inactive, Session::state)
    }

    /// Groups highlighted so far in the current session.
    pub fn cursor(&self) -> Option<usize> {
        self.session.as_ref().map(Session::cursor)
    }

    pub fn group_count(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.groups().len())
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.session.as_ref().map(Session::settings)
    }

    /// Delay of the armed tick timer, if any.
    pub fn tick_interval(&self) -> Option<Duration> {
        self.timer.interval()
    }

    /// How long the event loop may wait before the next tick is due.
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.timer.time_until_due(now)
    }

    /// Apply one controller command.
    pub fn handle(&mut self, command: Command, now: Instant) -> Result<(), EngineError> {
        trace!(?command, "handling command");
        match command {
            Command::StartHighlighting(payload) => {
                self.start(StartRequest::OnPage, payload.resolve(), now)
            }
            Command::StartPastedHighlighting(payload) => self.start(
                StartRequest::Pasted(payload.text),
                payload.settings.resolve(),
                now,
            ),
            Command::StopHighlighting => {
                self.stop();
                Ok(())
            }
            Command::PauseHighlighting => {
                self.pause();
                Ok(())
            }
            Command::ResumeHighlighting { speed } => {
                self.resume(speed.as_ref().and_then(words_per_minute), now);
                Ok(())
            }
            Command::ToggleHighlighting(payload) => {
                self.toggle(payload.resolve(), now);
                Ok(())
            }
        }
    }

    pub fn start(
        &mut self,
        request: StartRequest,
        settings: Settings,
        now: Instant,
    ) -> Result<(), EngineError> {
        if let StartRequest::Pasted(text) = &request {
            if text.trim().is_empty() {
                return Err(EngineError::EmptyText);
            }
        }

        let preempted = self.session.is_some();
        if preempted {
            info!("preempting the running session");
            self.teardown(false);
        }

        let source = request.source();
        let prepared = match &request {
            StartRequest::OnPage => prepare_on_page(&mut self.surface, settings.group_size),
            StartRequest::Pasted(text) => {
                prepare_pasted(&mut self.surface, text, settings.group_size).map(Some)
            }
        };
        let Prepared { groups, snapshot } = match prepared {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                self.report_lost_session(preempted);
                return Err(EngineError::NothingToRead);
            }
            Err(err) => {
                self.report_lost_session(preempted);
                return Err(err.into());
            }
        };

        info!(
            %source,
            groups = groups.len(),
            wpm = settings.words_per_minute.get(),
            group_size = settings.group_size.get(),
            "session started"
        );
        let scroll = self.surface.scroll_position();
        let session = Session::new(source, groups, settings, snapshot, scroll);
        self.timer.arm(session.delay(), now);
        self.session = Some(session);
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.session.is_some() {
            info!("session stopped");
            self.teardown(true);
        }
    }

    pub fn pause(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if !matches!(session.state(), SessionState::Paused(_)) {
                self.timer.cancel();
                session.pause();
                info!(cursor = session.cursor(), "session paused");
            }
        }
    }

    pub fn resume(&mut self, words_per_minute: Option<NonZeroU32>, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            if matches!(session.state(), SessionState::Paused(_)) {
                session.resume(words_per_minute);
                self.timer.arm(session.delay(), now);
                info!(
                    cursor = session.cursor(),
                    wpm = session.settings().words_per_minute.get(),
                    "session resumed"
                );
            }
        }
    }

    /// Shortcut toggle: stop whatever is active, otherwise start on-page
    /// reading. Reports the resulting state either way.
    pub fn toggle(&mut self, settings: Settings, now: Instant) {
        if self.state().is_active() {
            self.stop();
        } else if let Err(err) = self.start(StartRequest::OnPage, settings, now) {
            warn!(%err, "toggle could not start reading");
        }
        let state = self.state();
        self.notifier.notify(Notice::HotkeyToggle {
            is_highlighting_active: state.is_active(),
            is_paused: state.is_paused(),
        });
    }

    /// Fire the tick timer if it is due. Returns whether a tick ran.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.timer.fire(now) {
            return false;
        }
        self.tick();
        true
    }

    /// Advance the highlight by one group, or finish the session.
    pub fn tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.timer.cancel();
            return;
        };
        if session.state().is_paused() {
            return;
        }

        let color = session.settings().color.clone();
        match session.advance() {
            Step::Highlight { previous, current } => {
                if let Some(previous) = previous {
                    if let Err(err) = self.surface.set_highlight(previous, None) {
                        warn!(%err, "could not clear highlight");
                    }
                }
                if let Err(err) = self.surface.set_highlight(current, Some(&color)) {
                    warn!(%err, "could not apply highlight");
                }
                self.surface.scroll_into_view(current);
                trace!(?current, "highlighted group");
            }
            Step::Finished => {
                info!("reached the end of the text");
                self.teardown(true);
            }
        }
    }

    /// Disarm the timer, restore the page, drop the session. Never fails;
    /// a stale snapshot degrades to removing the injected units one by one.
    fn teardown(&mut self, notify: bool) {
        self.timer.cancel();
        let Some(session) = self.session.take() else {
            return;
        };
        let (groups, snapshot, scroll) = session.into_parts();

        if let Err(err) = self.surface.restore(snapshot) {
            warn!(%err, "restoring the page failed, removing injected groups instead");
            for group in groups.iter().rev() {
                self.surface.remove_group(group);
            }
            self.surface.remove_reader();
        }
        drop(groups);

        self.surface.set_scroll_position(scroll);
        if notify {
            self.notifier.notify(Notice::HighlightingStopped);
        }
    }

    fn report_lost_session(&self, preempted: bool) {
        if preempted {
            self.notifier.notify(Notice::HighlightingStopped);
        }
    }
}
