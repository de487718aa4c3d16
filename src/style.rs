//! ANSI escape codes for user-visible server text

pub const RESET: &str = "\x1b[0m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BOLD_YELLOW: &str = "\x1b[33;1m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const BOLD_MAGENTA: &str = "\x1b[35;1m";
