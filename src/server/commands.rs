//! Reserved command lines and chat message formatting
//!
//! A command prefix is only recognized at the start of a line; everything
//! else is chat text.

/// Prefix for joining or creating a group.
pub const CHAT_PREFIX: &str = ":chat: ";
/// Prefix for changing display name.
pub const NAME_PREFIX: &str = ":name: ";
/// Leave the current active group.
pub const EXIT_COMMAND: &str = ":exit:";

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `:chat: <group>`
    JoinChat(&'a str),
    /// `:name: <new name>`
    Rename(&'a str),
    /// `:exit:`
    Exit,
    /// Ordinary chat text
    Chat(&'a str),
    /// Blank line, ignored
    Empty,
}

/// Classify one trimmed input line.
pub fn parse(line: &str) -> Command<'_> {
    if line.is_empty() {
        Command::Empty
    } else if let Some(rest) = line.strip_prefix(CHAT_PREFIX) {
        Command::JoinChat(rest.trim())
    } else if let Some(rest) = line.strip_prefix(NAME_PREFIX) {
        Command::Rename(rest.trim())
    } else if line == EXIT_COMMAND {
        Command::Exit
    } else {
        Command::Chat(line)
    }
}

/// Timestamped chat line as persisted and broadcast.
pub fn format_message(name: &str, message: &str) -> String {
    if message.is_empty() {
        return String::new();
    }
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{timestamp}][{name}]:{message}\n")
}
