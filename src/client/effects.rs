//! Presentation side effects the chat core can request without knowing the UI.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualEffect {
    Matrix(bool),
    Glitch(bool),
    Theme(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    SpeechOutput(String),
    SpeechInput,
    Visual(VisualEffect),
}

pub trait Effects: Send {
    fn apply(&mut self, effect: Effect);
}

/// Front end without audio or canvas: effects are only traced.
#[derive(Debug, Default)]
pub struct LogEffects;

impl Effects for LogEffects {
    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::SpeechOutput(text) => tracing::debug!("speak: {} chars", text.len()),
            Effect::SpeechInput => tracing::debug!("listening for speech input"),
            Effect::Visual(visual) => tracing::debug!("visual effect: {:?}", visual),
        }
    }
}

/// Keeps every effect in order; handy for asserting on what the core asked for.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    pub applied: Vec<Effect>,
}

impl Effects for RecordingEffects {
    fn apply(&mut self, effect: Effect) {
        self.applied.push(effect);
    }
}
