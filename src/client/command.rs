use std::time::Duration;

use super::session::Mode;

pub const IMAGE_PREFIXES: &[&str] = &["/image", "/imagine"];

const MAX_TIMER: Duration = Duration::from_secs(24 * 3600);

pub const HELP: &str = "Commands: /clear, /theme, /timer <90|30s|5m|1h>, /matrix, /glitch, \
/convo, /terminal, /image <prompt>, /help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    Theme,
    Timer(Duration),
    Toggle(Mode),
    Image(String),
    Help,
    /// A slash command that could not be understood; the text is shown to the user.
    Invalid(String),
}

impl Command {
    /// `None` means the input is ordinary chat text.
    pub fn parse(input: &str) -> Option<Command> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }

        let (name, args) = match input.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (input, ""),
        };
        let name = name.to_ascii_lowercase();

        if IMAGE_PREFIXES.contains(&name.as_str()) {
            return Some(if args.is_empty() {
                Command::Invalid(format!("Usage: {} <prompt>", name))
            } else {
                Command::Image(args.to_string())
            });
        }

        Some(match name.as_str() {
            "/clear" => Command::Clear,
            "/theme" => Command::Theme,
            "/help" => Command::Help,
            "/matrix" => Command::Toggle(Mode::Matrix),
            "/glitch" => Command::Toggle(Mode::Glitch),
            "/convo" => Command::Toggle(Mode::Convo),
            "/terminal" => Command::Toggle(Mode::Terminal),
            "/timer" => match parse_duration(args) {
                Some(duration) => Command::Timer(duration),
                None => Command::Invalid(format!(
                    "Invalid timer duration '{}'. Try 90, 30s, 5m or 1h.",
                    args
                )),
            },
            _ => Command::Invalid(format!("Unknown command {}. {}", name, HELP)),
        })
    }
}

/// Accepts a bare number of seconds or a number with an `s`, `m` or `h` suffix.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_ascii_lowercase();
    let (digits, unit) = match input.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => input.split_at(idx),
        None => (input.as_str(), ""),
    };

    let value: u64 = digits.parse().ok()?;
    let secs = match unit.trim() {
        "" | "s" | "sec" | "secs" => value,
        "m" | "min" | "mins" => value.checked_mul(60)?,
        "h" | "hr" | "hrs" => value.checked_mul(3600)?,
        _ => return None,
    };

    let duration = Duration::from_secs(secs);
    (secs > 0 && duration <= MAX_TIMER).then_some(duration)
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, 0, 0) => format!("{}h", h),
        (h, m, _) => format!("{}h {}m", h, m),
    }
}
