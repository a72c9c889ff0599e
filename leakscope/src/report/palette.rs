//! Report colors
//!
//! A `Palette` is a plain value chosen once at startup and handed to whatever
//! renders text. A disabled palette returns its input unchanged.

use crossterm::style::{Color, Stylize};
use crossterm::tty::IsTty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub const fn colored() -> Self {
        Self { enabled: true }
    }

    pub const fn plain() -> Self {
        Self { enabled: false }
    }

    /// Colors when stdout, where reports are printed, is a terminal and
    /// `NO_COLOR` is unset.
    pub fn detect() -> Self {
        Self::for_terminal(std::io::stdout().is_tty())
    }

    fn for_terminal(is_tty: bool) -> Self {
        Self { enabled: is_tty && std::env::var_os("NO_COLOR").is_none() }
    }

    fn paint(self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Field names and section titles.
    pub fn label(self, text: &str) -> String {
        self.paint(text, Color::Blue)
    }

    /// Goroutine IDs and states.
    pub fn value(self, text: &str) -> String {
        self.paint(text, Color::Yellow)
    }

    /// Where the leaked goroutine came from.
    pub fn origin(self, text: &str) -> String {
        self.paint(text, Color::Red)
    }

    /// Frames matched by a caller filter.
    pub fn highlight(self, text: &str) -> String {
        self.paint(text, Color::Green)
    }

    pub fn section(self, text: &str) -> String {
        self.paint(text, Color::Magenta)
    }
}
