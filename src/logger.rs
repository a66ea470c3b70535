//! Console output of a build run.
//!
//! Every line carries a bracketed stage prefix:
//!
//! ```text
//! [schema] 2 table(s): equations, people
//! [records] people: 14 record(s)
//! [warn] UnresolvedReference: data/people/003_noether.json: `#nobody` ...
//! [summary] 1 diagnostic(s), 0 fatal
//! [done] 31 pages written to docs
//! ```
//!
//! Stage lines are cut to the terminal width so a large table does not flood
//! the console. Diagnostics (`error`, `warn`) are printed whole: they name a
//! file and a cause, and both matter.

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::OnceLock,
};

/// Used when the terminal size cannot be queried (piped output, CI).
const FALLBACK_WIDTH: u16 = 120;

static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Print a line under a stage prefix.
///
/// ```ignore
/// log!("index"; "{} target(s)", index.len());
/// log!("warn"; "{diagnostic}");
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// How a stage prefix is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Error,
    Warn,
    Summary,
    Done,
    /// Progress of a pipeline stage (`schema`, `records`, `render`, ...).
    Stage,
}

impl Tone {
    fn of(module: &str) -> Self {
        match module.to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "summary" => Self::Summary,
            "done" => Self::Done,
            _ => Self::Stage,
        }
    }

    fn paint(self, prefix: String) -> ColoredString {
        match self {
            Self::Error => prefix.bright_red().bold(),
            Self::Warn => prefix.bright_magenta().bold(),
            Self::Summary => prefix.bright_cyan().bold(),
            Self::Done => prefix.bright_green().bold(),
            Self::Stage => prefix.bright_yellow().bold(),
        }
    }

    const fn is_diagnostic(self) -> bool {
        matches!(self, Self::Error | Self::Warn)
    }
}

pub fn log(module: &str, message: &str) {
    let tone = Tone::of(module);
    let prefix = tone.paint(format!("[{module}]"));

    let message = if tone.is_diagnostic() || message.contains('\n') {
        message
    } else {
        let room = usize::from(terminal_width()).saturating_sub(prefix_width(module));
        fit_to_width(message, room)
    };

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

fn terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map_or(FALLBACK_WIDTH, |(width, _)| width))
}

/// Columns taken by `[module] `.
const fn prefix_width(module: &str) -> usize {
    module.len() + "[] ".len()
}

/// Longest prefix of `message` within `max` bytes, cut on a char boundary.
fn fit_to_width(message: &str, max: usize) -> &str {
    if message.len() <= max {
        return message;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_width() {
        assert_eq!(prefix_width("records"), "[records] ".len());
        assert_eq!(prefix_width(""), 3);
    }

    #[test]
    fn test_tone_of_module() {
        assert_eq!(Tone::of("error"), Tone::Error);
        assert_eq!(Tone::of("WARN"), Tone::Warn);
        assert_eq!(Tone::of("summary"), Tone::Summary);
        assert_eq!(Tone::of("done"), Tone::Done);
        assert_eq!(Tone::of("index"), Tone::Stage);
    }

    #[test]
    fn test_only_diagnostics_print_whole() {
        assert!(Tone::Error.is_diagnostic());
        assert!(Tone::Warn.is_diagnostic());
        assert!(!Tone::Summary.is_diagnostic());
        assert!(!Tone::Stage.is_diagnostic());
    }

    #[test]
    fn test_fit_to_width_keeps_short_lines() {
        assert_eq!(fit_to_width("people: 2 record(s)", 40), "people: 2 record(s)");
        assert_eq!(fit_to_width("", 0), "");
    }

    #[test]
    fn test_fit_to_width_cuts_long_lines() {
        assert_eq!(fit_to_width("equations: 12 record(s)", 9), "equations");
        assert_eq!(fit_to_width("people", 0), "");
    }

    #[test]
    fn test_fit_to_width_respects_char_boundaries() {
        // "ö" and "∑" take 2 and 3 bytes.
        assert_eq!(fit_to_width("Gödel", 2), "G");
        assert_eq!(fit_to_width("∑∑", 4), "∑");
        assert_eq!(fit_to_width("a∑b", 3), "a");
    }
}
