//! The terminal host: one page, one controller, one engine, all driven from
//! the runner's event queue.

use std::num::NonZeroUsize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

use crate::config::{Config, ConfigStore, Preset};
use crate::controller::{ControlState, Controller};
use crate::document::{Document, Viewport};
use crate::engine::Engine;
use crate::message::{ChannelNotifier, ChannelSink, Command, Notice};
use crate::runtime::AppEvent;
use crate::session::{SessionState, Source};

const PAGE_SCROLL: isize = 10;

pub struct App<C: ConfigStore> {
    pub controller: Controller<C, ChannelSink<AppEvent>>,
    pub engine: Engine<Document, ChannelNotifier>,
    notices: Receiver<Notice>,
    message: Option<String>,
    should_quit: bool,
}

impl<C: ConfigStore> App<C> {
    /// `events` is the queue the runner reads; controller commands go there
    /// and come back through [`App::handle_event`].
    pub fn new(store: C, config: Config, page: Document, events: Sender<AppEvent>) -> Self {
        let (notice_tx, notices) = mpsc::channel();
        Self {
            controller: Controller::with_config(
                store,
                ChannelSink::new(events, AppEvent::Command),
                config,
            ),
            engine: Engine::new(page, ChannelNotifier::new(notice_tx)),
            notices,
            message: None,
            should_quit: false,
        }
    }

    pub fn document(&self) -> &Document {
        self.engine.surface()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn session_state(&self) -> SessionState {
        self.engine.state()
    }

    pub fn controls(&self) -> ControlState {
        self.controller.controls()
    }

    /// How long the runner may block before the engine needs a tick.
    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.engine.time_until_tick(now)
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::Resize(width, height) => self.resize(width, height),
            AppEvent::Command(command) => self.handle_command(command, now),
            AppEvent::Tick => {}
        }
        // A busy queue must not starve the reading pace.
        self.engine.poll(now);
        self.drain_notices();
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        let viewport = crate::ui::content_viewport(width, height);
        self.engine.surface_mut().set_viewport(viewport);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.engine.surface_mut().set_viewport(viewport);
    }

    fn handle_command(&mut self, command: Command, now: Instant) {
        if let Err(err) = self.engine.handle(command, now) {
            warn!(%err, "command failed");
            self.message = Some(err.to_string());
            // The controls assumed the start went through.
            self.controller.on_notice(Notice::HighlightingStopped);
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            if notice == Notice::HighlightingStopped && self.controls().active {
                self.message = Some("Finished reading".to_string());
            }
            self.controller.on_notice(notice);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        self.message = None;

        let result = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Ok(())
            }
            KeyCode::Char('s') => self
                .controller
                .set_mode(Source::OnPage)
                .and_then(|()| self.controller.start()),
            KeyCode::Char('p') => {
                let text = self.controller.pasted_text().to_string();
                self.controller.start_pasted(&text)
            }
            KeyCode::Char(' ') => self.controller.toggle_pause(),
            KeyCode::Esc => {
                if self.controls().active || self.session_state().is_active() {
                    self.controller.stop()
                } else {
                    Ok(())
                }
            }
            KeyCode::Char('t') => self.controller.hotkey_toggle(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.controller.step_speed(1);
                Ok(())
            }
            KeyCode::Char('-') => {
                self.controller.step_speed(-1);
                Ok(())
            }
            KeyCode::Char('[') => {
                self.step_group_size(-1);
                Ok(())
            }
            KeyCode::Char(']') => {
                self.step_group_size(1);
                Ok(())
            }
            KeyCode::Char(c @ '1'..='3') => {
                let index = usize::from(c as u8 - b'1');
                self.controller.apply_preset(Preset::ALL[index]);
                Ok(())
            }
            KeyCode::Char('m') => {
                let next = match self.controller.mode() {
                    Source::OnPage => Source::Pasted,
                    Source::Pasted => Source::OnPage,
                };
                self.controller.set_mode(next)
            }
            KeyCode::Up => {
                self.scroll(-1);
                Ok(())
            }
            KeyCode::Down => {
                self.scroll(1);
                Ok(())
            }
            KeyCode::PageUp => {
                self.scroll(-PAGE_SCROLL);
                Ok(())
            }
            KeyCode::PageDown => {
                self.scroll(PAGE_SCROLL);
                Ok(())
            }
            other => {
                debug!(?other, "unbound key");
                Ok(())
            }
        };

        if let Err(err) = result {
            self.message = Some(err.to_string());
        }
    }

    fn step_group_size(&mut self, delta: isize) {
        let current = self.controller.config().group_size;
        let next = current.saturating_add_signed(delta);
        if let Some(size) = NonZeroUsize::new(next) {
            self.controller.set_group_size(size);
        }
    }

    fn scroll(&mut self, delta: isize) {
        self.engine.surface_mut().scroll_by(delta);
    }
}
