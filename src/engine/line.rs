//! Input lines and their terminators.

use std::fmt;

/// Line terminator observed on an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// Bytes written for this terminator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// One line of input: its text without terminator, and the terminator it
/// ended with (`None` for a final unterminated line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Text without the trailing terminator.
    pub text: String,
    /// Terminator the line ended with.
    pub ending: Option<LineEnding>,
}

impl Line {
    /// Create a line from its parts.
    #[must_use]
    pub fn new(text: impl Into<String>, ending: Option<LineEnding>) -> Self {
        Self {
            text: text.into(),
            ending,
        }
    }

    /// Split a raw line (possibly ending in `\n` or `\r\n`) into a `Line`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        if let Some(rest) = raw.strip_suffix("\r\n") {
            Self::new(rest, Some(LineEnding::CrLf))
        } else if let Some(rest) = raw.strip_suffix('\n') {
            Self::new(rest, Some(LineEnding::Lf))
        } else {
            Self::new(raw, None)
        }
    }

    /// Whether the line is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split text into lines, keeping terminator information.
///
/// ```
/// use linedupe::engine::{split_lines, LineEnding};
///
/// let lines = split_lines("a\r\nb\nc");
/// assert_eq!(lines.len(), 3);
/// assert_eq!(lines[0].ending, Some(LineEnding::CrLf));
/// assert_eq!(lines[2].ending, None);
/// ```
#[must_use]
pub fn split_lines(text: &str) -> Vec<Line> {
    text.split_inclusive('\n').map(Line::from_raw).collect()
}
