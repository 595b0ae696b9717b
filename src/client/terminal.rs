use chrono::Local;

use super::session::ClientSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutput {
    Text(String),
    Clear,
    Exit,
}

/// Answers a line typed while terminal mode is on.
pub fn respond(line: &str, session: &ClientSession) -> ShellOutput {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));

    match cmd {
        "help" => ShellOutput::Text("available: help, whoami, date, echo, clear, exit".into()),
        "whoami" => ShellOutput::Text(
            session
                .username
                .clone()
                .unwrap_or_else(|| "guest".to_string()),
        ),
        "date" => ShellOutput::Text(Local::now().format("%a %b %e %H:%M:%S %Y").to_string()),
        "echo" => ShellOutput::Text(rest.to_string()),
        "clear" => ShellOutput::Clear,
        "exit" => ShellOutput::Exit,
        _ => ShellOutput::Text(format!("{}: command not found", cmd)),
    }
}
