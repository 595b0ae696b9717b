use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const THEMES: &[&str] = &[
    "neon",
    "matrix-green",
    "amber",
    "cyberpunk",
    "vaporwave",
    "midnight",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Matrix,
    Glitch,
    Convo,
    Terminal,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Matrix => "Matrix",
            Mode::Glitch => "Glitch",
            Mode::Convo => "Convo",
            Mode::Terminal => "Terminal",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    pub matrix: bool,
    pub glitch: bool,
    pub convo: bool,
    pub terminal: bool,
}

impl Modes {
    fn flag_mut(&mut self, mode: Mode) -> &mut bool {
        match mode {
            Mode::Matrix => &mut self.matrix,
            Mode::Glitch => &mut self.glitch,
            Mode::Convo => &mut self.convo,
            Mode::Terminal => &mut self.terminal,
        }
    }

    pub fn is_on(&self, mode: Mode) -> bool {
        match mode {
            Mode::Matrix => self.matrix,
            Mode::Glitch => self.glitch,
            Mode::Convo => self.convo,
            Mode::Terminal => self.terminal,
        }
    }
}

/// Everything the chat UI keeps between inputs, in one serializable place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSession {
    pub username: Option<String>,
    pub token: Option<String>,
    pub theme: String,
    pub modes: Modes,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self {
            username: None,
            token: None,
            theme: THEMES[0].to_string(),
            modes: Modes::default(),
        }
    }
}

impl ClientSession {
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn sign_in(&mut self, username: String, token: String) {
        self.username = Some(username);
        self.token = Some(token);
    }

    pub fn sign_out(&mut self) {
        self.username = None;
        self.token = None;
    }

    /// Flips `mode` and returns its new state.
    pub fn toggle(&mut self, mode: Mode) -> bool {
        let flag = self.modes.flag_mut(mode);
        *flag = !*flag;
        *flag
    }

    /// Picks a theme other than the current one.
    pub fn randomize_theme(&mut self) -> &str {
        let candidates: Vec<&str> = THEMES
            .iter()
            .copied()
            .filter(|t| *t != self.theme)
            .collect();
        if let Some(theme) = candidates.choose(&mut rand::thread_rng()) {
            self.theme = theme.to_string();
        }
        &self.theme
    }
}
