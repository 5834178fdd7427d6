//! The settings and control surface: what the user configures and presses,
//! relayed to the reading engine as commands.

use std::num::NonZeroUsize;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{
    Config, ConfigStore, Preset, MAX_GROUP_SIZE, MAX_WORDS_PER_MINUTE, MIN_WORDS_PER_MINUTE,
};
use crate::message::{Command, CommandSink, Notice, Unreachable};
use crate::session::Source;

/// Words per minute added or removed by one speed step.
pub const SPEED_STEP: u32 = 10;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Please paste some text to read!")]
    EmptyText,
    #[error(transparent)]
    Unreachable(#[from] Unreachable),
}

/// What the controls currently show. It follows the controller's own
/// actions and is reconciled by engine notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub active: bool,
    pub paused: bool,
}

pub struct Controller<C: ConfigStore, K: CommandSink> {
    store: C,
    sink: K,
    config: Config,
    controls: ControlState,
    pasted_text: String,
}

impl<C: ConfigStore, K: CommandSink> Controller<C, K> {
    pub fn new(store: C, sink: K) -> Self {
        let config = store.load();
        Self::with_config(store, sink, config)
    }

    pub fn with_config(store: C, sink: K, config: Config) -> Self {
        Self {
            store,
            sink,
            config,
            controls: ControlState::default(),
            pasted_text: String::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    pub fn mode(&self) -> Source {
        self.config.active_mode
    }

    pub fn pasted_text(&self) -> &str {
        &self.pasted_text
    }

    pub fn set_pasted_text(&mut self, text: impl Into<String>) {
        self.pasted_text = text.into();
    }

    /// Start reading in the current mode.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        match self.config.active_mode {
            Source::OnPage => {
                self.sink.send(Command::start(&self.config.settings()))?;
                self.controls = ControlState {
                    active: true,
                    paused: false,
                };
                Ok(())
            }
            Source::Pasted => {
                let text = self.pasted_text.clone();
                self.start_pasted(&text)
            }
        }
    }

    pub fn start_pasted(&mut self, text: &str) -> Result<(), ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ControllerError::EmptyText);
        }
        self.sink
            .send(Command::start_pasted(text, &self.config.settings()))?;
        if self.config.active_mode != Source::Pasted {
            self.config.active_mode = Source::Pasted;
            self.persist();
        }
        self.controls = ControlState {
            active: true,
            paused: false,
        };
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ControllerError> {
        self.sink.send(Command::StopHighlighting)?;
        self.controls = ControlState::default();
        Ok(())
    }

    /// Pause a running session, or resume a paused one at the current speed.
    pub fn toggle_pause(&mut self) -> Result<(), ControllerError> {
        if !self.controls.active {
            return Ok(());
        }
        if self.controls.paused {
            let wpm = self.config.settings().words_per_minute;
            self.sink.send(Command::resume(wpm))?;
            self.controls.paused = false;
        } else {
            self.sink.send(Command::PauseHighlighting)?;
            self.controls.paused = true;
        }
        Ok(())
    }

    /// Keyboard-shortcut relay. The engine reports the outcome back with a
    /// `hotkeyToggle` notice.
    pub fn hotkey_toggle(&mut self) -> Result<(), ControllerError> {
        self.sink.send(Command::toggle(&self.config.settings()))?;
        Ok(())
    }

    /// Switch between on-page and pasted reading. Anything running stops.
    pub fn set_mode(&mut self, mode: Source) -> Result<(), ControllerError> {
        if mode == self.config.active_mode {
            return Ok(());
        }
        if self.controls.active {
            self.stop()?;
        }
        info!(%mode, "switched mode");
        self.config.active_mode = mode;
        self.persist();
        Ok(())
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.config.apply_preset(preset);
        info!(%preset, wpm = self.config.wpm, group_size = self.config.group_size, "applied preset");
        self.persist();
    }

    /// Change the speed by `steps` increments. Takes effect on the next
    /// start or resume.
    pub fn step_speed(&mut self, steps: i32) {
        let delta = i64::from(steps) * i64::from(SPEED_STEP);
        let wpm = (i64::from(self.config.wpm) + delta).clamp(
            i64::from(MIN_WORDS_PER_MINUTE),
            i64::from(MAX_WORDS_PER_MINUTE),
        );
        self.config.wpm = u32::try_from(wpm).unwrap_or(MIN_WORDS_PER_MINUTE);
        self.config.active_preset = None;
        self.persist();
    }

    pub fn set_group_size(&mut self, size: NonZeroUsize) {
        self.config.group_size = size.get().min(MAX_GROUP_SIZE);
        self.config.active_preset = None;
        self.persist();
    }

    pub fn set_color(&mut self, color: &str) {
        let color = color.trim();
        if color.is_empty() {
            return;
        }
        self.config.highlight_color = color.to_string();
        self.persist();
    }

    pub fn on_notice(&mut self, notice: Notice) {
        debug!(?notice, "notice from engine");
        match notice {
            Notice::HighlightingStopped => self.controls = ControlState::default(),
            Notice::HotkeyToggle {
                is_highlighting_active,
                is_paused,
            } => {
                if self.config.active_mode != Source::OnPage {
                    self.config.active_mode = Source::OnPage;
                    self.persist();
                }
                self.controls = ControlState {
                    active: is_highlighting_active,
                    paused: is_paused,
                };
            }
        }
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.config) {
            warn!(%err, "could not save settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use crate::message::ChannelSink;
    use assert_matches::assert_matches;
    use std::sync::mpsc::{self, Receiver};

    type TestController = Controller<MemoryConfigStore, ChannelSink<Command>>;

    fn controller(config: Config) -> (TestController, Receiver<Command>) {
        let (tx, rx) = mpsc::channel();
        let store = MemoryConfigStore::new(config);
        (Controller::new(store, ChannelSink::new(tx, |c| c)), rx)
    }

    fn drain(rx: &Receiver<Command>) -> Vec<Command> {
        rx.try_iter().collect()
    }

    #[test]
    fn start_sends_current_settings() {
        let (mut c, rx) = controller(Config::default());
        c.start().unwrap();
        let sent = drain(&rx);
        let [Command::StartHighlighting(payload)] = sent.as_slice() else {
            panic!("expected one startHighlighting, got {sent:?}");
        };
        let settings = payload.resolve();
        assert_eq!(settings.words_per_minute.get(), 250);
        assert_eq!(settings.group_size.get(), 6);
        assert_eq!(c.controls(), ControlState { active: true, paused: false });
    }

    #[test]
    fn pasted_text_is_trimmed_and_validated() {
        let (mut c, rx) = controller(Config::default());
        assert_eq!(c.start_pasted("  \n\t "), Err(ControllerError::EmptyText));
        assert_eq!(
            ControllerError::EmptyText.to_string(),
            "Please paste some text to read!"
        );
        assert!(drain(&rx).is_empty());
        assert!(!c.controls().active);

        c.start_pasted("  some words \n").unwrap();
        assert_matches!(
            drain(&rx).as_slice(),
            [Command::StartPastedHighlighting(payload)] if payload.text == "some words"
        );
        assert_eq!(c.mode(), Source::Pasted);
    }

    #[test]
    fn start_in_pasted_mode_uses_the_held_text() {
        let (mut c, rx) = controller(Config {
            active_mode: Source::Pasted,
            ..Config::default()
        });
        assert_eq!(c.start(), Err(ControllerError::EmptyText));
        c.set_pasted_text("held text");
        c.start().unwrap();
        assert_matches!(
            drain(&rx).as_slice(),
            [Command::StartPastedHighlighting(payload)] if payload.text == "held text"
        );
    }

    #[test]
    fn toggle_pause_resumes_at_the_current_speed() {
        let (mut c, rx) = controller(Config::default());
        c.toggle_pause().unwrap();
        assert!(drain(&rx).is_empty(), "nothing to pause while inactive");

        c.start().unwrap();
        c.toggle_pause().unwrap();
        assert!(c.controls().paused);
        c.step_speed(3);
        c.toggle_pause().unwrap();
        let sent = drain(&rx);
        assert_matches!(sent[1], Command::PauseHighlighting);
        let Command::ResumeHighlighting { speed: Some(speed) } = &sent[2] else {
            panic!("expected resume with speed, got {:?}", sent[2]);
        };
        assert_eq!(speed.as_u64(), Some(280));
        assert_eq!(c.controls(), ControlState { active: true, paused: false });
    }

    #[test]
    fn speed_steps_clamp_and_clear_the_preset() {
        let (mut c, _rx) = controller(Config::default());
        c.step_speed(-1000);
        assert_eq!(c.config().wpm, MIN_WORDS_PER_MINUTE);
        assert_eq!(c.config().active_preset, None);
        c.step_speed(1000);
        assert_eq!(c.config().wpm, MAX_WORDS_PER_MINUTE);
    }

    #[test]
    fn settings_changes_are_persisted() {
        let (tx, _rx) = mpsc::channel();
        let store = MemoryConfigStore::new(Config::default());
        let mut c = Controller::new(store, ChannelSink::new(tx, |c: Command| c));
        c.apply_preset(Preset::Blitz);
        c.set_color("tomato");
        c.set_color("   ");
        let saved = c.store.saved().unwrap();
        assert_eq!(saved.active_preset, Some(Preset::Blitz));
        assert_eq!(saved.wpm, 400);
        assert_eq!(saved.highlight_color, "tomato");

        c.set_group_size(NonZeroUsize::new(99).unwrap());
        let saved = c.store.saved().unwrap();
        assert_eq!(saved.group_size, MAX_GROUP_SIZE);
        assert_eq!(saved.active_preset, None);
    }

    #[test]
    fn notices_reconcile_the_display() {
        let (mut c, _rx) = controller(Config {
            active_mode: Source::Pasted,
            ..Config::default()
        });
        c.on_notice(Notice::HotkeyToggle {
            is_highlighting_active: true,
            is_paused: false,
        });
        assert_eq!(c.mode(), Source::OnPage);
        assert_eq!(c.controls(), ControlState { active: true, paused: false });

        c.on_notice(Notice::HighlightingStopped);
        assert_eq!(c.controls(), ControlState::default());
    }

    #[test]
    fn switching_mode_stops_a_running_session() {
        let (mut c, rx) = controller(Config::default());
        c.start().unwrap();
        c.set_mode(Source::Pasted).unwrap();
        let sent = drain(&rx);
        assert_matches!(sent.last(), Some(Command::StopHighlighting));
        assert!(!c.controls().active);
        assert_eq!(c.mode(), Source::Pasted);
    }

    #[test]
    fn unreachable_engine_leaves_the_display_alone() {
        let (mut c, rx) = controller(Config::default());
        drop(rx);
        assert_eq!(c.start(), Err(ControllerError::Unreachable(Unreachable)));
        assert_eq!(c.controls(), ControlState::default());
        assert_eq!(c.hotkey_toggle(), Err(ControllerError::Unreachable(Unreachable)));
    }
}
