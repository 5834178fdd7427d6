//! Messages exchanged between the controller and the reading engine.
//!
//! Both directions are fire-and-forget: a sender never waits for the other
//! side and treats a missing peer as a no-op.

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::{Settings, DEFAULT_HIGHLIGHT_COLOR};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Settings as they arrive on the wire. Anything missing or malformed falls
/// back to the defaults when resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Value>,
}

impl SettingsPayload {
    pub fn resolve(&self) -> Settings {
        let defaults = Settings::default();
        Settings {
            color: self
                .color
                .as_ref()
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_HIGHLIGHT_COLOR)
                .to_string(),
            group_size: self
                .group_size
                .as_ref()
                .and_then(positive_integer)
                .and_then(|n| usize::try_from(n).ok())
                .and_then(NonZeroUsize::new)
                .unwrap_or(defaults.group_size),
            words_per_minute: self
                .speed
                .as_ref()
                .and_then(words_per_minute)
                .unwrap_or(defaults.words_per_minute),
        }
    }
}

impl From<&Settings> for SettingsPayload {
    fn from(settings: &Settings) -> Self {
        Self {
            color: Some(Value::from(settings.color.clone())),
            group_size: Some(Value::from(settings.group_size.get())),
            speed: Some(Value::from(settings.words_per_minute.get())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PastedPayload {
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub settings: SettingsPayload,
}

/// Controller → engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    StartHighlighting(SettingsPayload),
    StartPastedHighlighting(PastedPayload),
    StopHighlighting,
    PauseHighlighting,
    ResumeHighlighting {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<Value>,
    },
    /// Sent by the keyboard shortcut; only ever targets the on-page source.
    ToggleHighlighting(SettingsPayload),
}

impl Command {
    pub fn start(settings: &Settings) -> Self {
        Command::StartHighlighting(settings.into())
    }

    pub fn start_pasted(text: impl Into<String>, settings: &Settings) -> Self {
        Command::StartPastedHighlighting(PastedPayload {
            text: text.into(),
            settings: settings.into(),
        })
    }

    pub fn resume(words_per_minute: NonZeroU32) -> Self {
        Command::ResumeHighlighting {
            speed: Some(Value::from(words_per_minute.get())),
        }
    }

    pub fn toggle(settings: &Settings) -> Self {
        Command::ToggleHighlighting(settings.into())
    }

    pub fn decode(raw: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Engine → controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notice {
    HighlightingStopped,
    #[serde(rename_all = "camelCase")]
    HotkeyToggle {
        is_highlighting_active: bool,
        is_paused: bool,
    },
}

impl Notice {
    pub fn decode(raw: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub(crate) fn words_per_minute(value: &Value) -> Option<NonZeroU32> {
    positive_integer(value)
        .and_then(|n| u32::try_from(n).ok())
        .and_then(NonZeroU32::new)
}

fn positive_integer(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(whole),
        _ => None,
    };
    number.filter(|n| *n > 0)
}

fn whole(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 1.0).then(|| f.trunc() as u64)
}

/// Receives notices from the engine.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Delivers notices over a channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notice>,
}

impl ChannelNotifier {
    pub fn new(tx: Sender<Notice>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            debug!(?notice, "controller is gone, notice dropped");
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("reading engine is not reachable")]
pub struct Unreachable;

/// Carries commands to the engine.
pub trait CommandSink {
    fn send(&self, command: Command) -> Result<(), Unreachable>;
}

/// Sends commands over a channel, mapped into the receiver's event type.
pub struct ChannelSink<T> {
    tx: Sender<T>,
    wrap: fn(Command) -> T,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: Sender<T>, wrap: fn(Command) -> T) -> Self {
        Self { tx, wrap }
    }
}

impl<T> CommandSink for ChannelSink<T> {
    fn send(&self, command: Command) -> Result<(), Unreachable> {
        self.tx.send((self.wrap)(command)).map_err(|_| {
            warn!("reading engine is not reachable, command dropped");
            Unreachable
        })
    }
}
