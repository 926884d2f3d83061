//! Output formatting helpers: money, truncation, bars and plain tables

use colored::ColoredString;
use std::fmt::Write;

use crate::utils::colors::Theme;

/// Fallback when the terminal size is unknown (pipes, CI)
const DEFAULT_TERMINAL_WIDTH: usize = 120;

/// Columns never shrink below this when fitting a table to the terminal
const MIN_COLUMN_WIDTH: usize = 8;

const COLUMN_GAP: &str = "  ";

/// `$1,234.56`, ignoring the sign
#[must_use]
pub fn format_currency_plain(amount: f64) -> String {
    format!("${}", group_thousands(amount.abs()))
}

/// `-$4.50`, `+$1,200.00` or `$0.00`
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let plain = format_currency_plain(amount);
    // Sign is decided on the rounded value so -0.001 prints as $0.00
    if plain == "$0.00" {
        plain
    } else if amount < 0.0 {
        format!("-{plain}")
    } else {
        format!("+{plain}")
    }
}

fn group_thousands(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{grouped}.{cents}")
}

/// Shorten to `max` characters, marking the cut with `…`
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(max - 1).collect();
    cut.push('…');
    cut
}

/// A bar of `█` proportional to `fraction` (clamped to `0..=1`)
#[must_use]
pub fn bar_chart(fraction: f64, max_width: usize) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let width = (fraction * max_width as f64).round() as usize;
    "█".repeat(width.min(max_width))
}

/// Upper-case the first character
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// `n thing` or `n things`
#[must_use]
pub fn plural(count: usize, singular: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {singular}s")
    }
}

/// Width of stdout's terminal, or a default when it is not a terminal
#[must_use]
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map_or(DEFAULT_TERMINAL_WIDTH, |(terminal_size::Width(w), _)| {
            usize::from(w)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// One table cell; the style is applied after padding so widths stay right
#[derive(Clone)]
pub struct Cell {
    text: String,
    style: Option<fn(&str) -> ColoredString>,
}

impl Cell {
    #[must_use]
    pub fn styled(text: impl Into<String>, style: fn(&str) -> ColoredString) -> Self {
        Self {
            text: text.into(),
            style: Some(style),
        }
    }

    /// A signed currency amount colored by direction
    #[must_use]
    pub fn amount(amount: f64) -> Self {
        let style: fn(&str) -> ColoredString = if amount < 0.0 {
            Theme::spending
        } else {
            Theme::income
        };
        Self::styled(format_currency(amount), style)
    }

    fn render(&self, width: usize, align: Align) -> String {
        let text = truncate(&self.text, width);
        let pad = width.saturating_sub(text.chars().count());
        let padded = match align {
            Align::Left => format!("{text}{}", " ".repeat(pad)),
            Align::Right => format!("{}{text}", " ".repeat(pad)),
        };
        match self.style {
            Some(style) => style(&padded).to_string(),
            None => padded,
        }
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Self { text, style: None }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Self::from(text.to_string())
    }
}

/// A borderless, column-aligned table fitted to a maximum width
pub struct Table {
    headers: Vec<(String, Align)>,
    rows: Vec<Vec<Cell>>,
    max_width: usize,
}

impl Table {
    #[must_use]
    pub fn new(headers: &[(&str, Align)]) -> Self {
        Self {
            headers: headers
                .iter()
                .map(|(name, align)| ((*name).to_string(), *align))
                .collect(),
            rows: Vec::new(),
            max_width: terminal_width(),
        }
    }

    #[must_use]
    pub const fn with_max_width(mut self, max_width: usize) -> Self {
        self.max_width = max_width;
        self
    }

    /// Add a row; missing trailing cells render empty
    pub fn add_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|(name, _)| name.chars().count())
            .collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.text.chars().count());
            }
        }

        // Shrink the widest column until the table fits
        let gaps = COLUMN_GAP.len() * widths.len().saturating_sub(1);
        while widths.iter().sum::<usize>() + gaps > self.max_width {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            if widest <= MIN_COLUMN_WIDTH {
                break;
            }
            widths[idx] = widest - 1;
        }
        widths
    }

    #[must_use]
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let mut output = String::new();

        let header: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|((name, align), width)| {
                Cell::styled(name.as_str(), Theme::header).render(*width, *align)
            })
            .collect();
        writeln!(&mut output, "{}", header.join(COLUMN_GAP).trim_end()).unwrap();

        let rule_width = widths.iter().sum::<usize>() + COLUMN_GAP.len() * widths.len().saturating_sub(1);
        writeln!(&mut output, "{}", Theme::dim(&"─".repeat(rule_width))).unwrap();

        let empty = Cell::from("");
        for row in &self.rows {
            let line: Vec<String> = self
                .headers
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, ((_, align), width))| row.get(i).unwrap_or(&empty).render(*width, *align))
                .collect();
            writeln!(&mut output, "{}", line.join(COLUMN_GAP).trim_end()).unwrap();
        }
        output
    }
}
