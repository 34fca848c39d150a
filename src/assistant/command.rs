//! Chat command parsing.
//!
//! Commands are the slash-prefixed inputs the bot reacts to regardless of
//! phase; everything else is free text and is routed by phase.

/// One parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/help`, `/start`
    Help,
    /// `/setup`
    Setup,
    /// `/compose`
    Compose,
    /// `/confirm`, `/send`
    Confirm,
    /// Any other `/word`.
    Unknown,
    /// Not a command.
    Text(String),
}

/// Parses message content into a [`Command`].
pub struct CommandParser;

impl CommandParser {
    pub fn parse(content: &str) -> Command {
        let trimmed = content.trim();

        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Text(content.to_string());
        };

        // Only the first word counts; Telegram may append `@BotName`.
        let word = rest.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or("").to_lowercase();

        match name.as_str() {
            "help" | "start" => Command::Help,
            "setup" => Command::Setup,
            "compose" => Command::Compose,
            "confirm" | "send" => Command::Confirm,
            "" => Command::Text(content.to_string()),
            _ => Command::Unknown,
        }
    }
}

impl Command {
    /// Short name for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Setup => "setup",
            Self::Compose => "compose",
            Self::Confirm => "confirm",
            Self::Unknown => "unknown",
            Self::Text(_) => "text",
        }
    }
}
