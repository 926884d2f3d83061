//! Color theme for terminal output
//!
//! Respects the `NO_COLOR` environment variable, the `--no-color` flag and
//! non-terminal stdout.

use colored::{ColoredString, Colorize};
use std::sync::OnceLock;

static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();

/// Decide once whether output is colored
pub fn init_colors(no_color_flag: bool) {
    let should_enable =
        !no_color_flag && std::env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stdout);

    COLOR_ENABLED.get_or_init(|| should_enable);

    if !should_enable {
        colored::control::set_override(false);
    }
}

#[must_use]
pub fn colors_enabled() -> bool {
    *COLOR_ENABLED
        .get_or_init(|| std::env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stdout))
}

/// Styles shared by every command's human output
pub struct Theme;

impl Theme {
    #[must_use]
    pub fn success(text: &str) -> ColoredString {
        if colors_enabled() {
            text.green().bold()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn error(text: &str) -> ColoredString {
        if colors_enabled() {
            text.red().bold()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn warning(text: &str) -> ColoredString {
        if colors_enabled() {
            text.yellow().bold()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn info(text: &str) -> ColoredString {
        if colors_enabled() {
            text.blue()
        } else {
            text.normal()
        }
    }

    /// URLs and names the user may need to copy
    #[must_use]
    pub fn highlight(text: &str) -> ColoredString {
        if colors_enabled() {
            text.cyan().bold()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn header(text: &str) -> ColoredString {
        if colors_enabled() {
            text.white().bold()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn dim(text: &str) -> ColoredString {
        if colors_enabled() {
            text.bright_black()
        } else {
            text.normal()
        }
    }

    /// Money flowing in
    #[must_use]
    pub fn income(text: &str) -> ColoredString {
        if colors_enabled() {
            text.green()
        } else {
            text.normal()
        }
    }

    /// Money flowing out
    #[must_use]
    pub fn spending(text: &str) -> ColoredString {
        if colors_enabled() {
            text.red()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn bar(text: &str) -> ColoredString {
        if colors_enabled() {
            text.cyan()
        } else {
            text.normal()
        }
    }

    #[must_use]
    pub fn value(text: &str) -> ColoredString {
        if colors_enabled() {
            text.magenta()
        } else {
            text.normal()
        }
    }

    /// Pick income or spending by sign; zero counts as income
    #[must_use]
    pub fn amount(text: &str, amount: f64) -> ColoredString {
        if amount < 0.0 {
            Self::spending(text)
        } else {
            Self::income(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(Theme::header("Date").to_string(), "Date");
        assert_eq!(Theme::amount("-$4.50", -4.5).to_string(), "-$4.50");
        assert_eq!(Theme::amount("+$10.00", 10.0).to_string(), "+$10.00");
        assert_eq!(Theme::bar("███").to_string(), "███");
    }
}
