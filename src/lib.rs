//! Incremental, event-driven parsing of unified diff and git patch files.
//!
//! The scanner walks a single immutable buffer one line at a time and pushes
//! events into caller-supplied [`sink::Patch`] / [`sink::Diff`] objects: file
//! info (paths, operation, mode, binary hunk sizes), hunk boundaries, and the
//! individual body lines with their old/new line numbers. Line content is
//! never copied; every slice handed to the sink borrows the input buffer.

pub mod line;
pub mod scanner;
pub mod sink;

pub use line::{get_filename, HunkNumbers, LineView};
pub use scanner::{parse, PatchScanner};
pub use sink::{BinaryHunk, BinaryHunkKind, Diff, FileMode, FileOp, Patch};

/// Errors that can occur while scanning a patch.
///
/// Each variant carries its numeric context: the 1-based source line where
/// the condition was detected (for [`ParseError::InvalidString`], the line of
/// the `diff` boundary whose path extraction failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// A `@@` header does not have the `-old[,count] +new[,count]` shape, or
    /// a line the format requires at this point is missing
    InvalidHunkHeader(usize),

    /// An `old mode` header was not followed by a `new mode` header
    NewModeExpected(usize),

    /// A filename field is entirely whitespace
    NoFilename(usize),

    /// Path extraction from a `diff` boundary line yielded an empty path
    InvalidString(usize),
}

impl ParseError {
    /// The numeric context attached to the error
    pub fn line(&self) -> usize {
        match self {
            Self::InvalidHunkHeader(line)
            | Self::NewModeExpected(line)
            | Self::NoFilename(line)
            | Self::InvalidString(line) => *line,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::InvalidHunkHeader(line) => {
                write!(f, "Invalid hunk header at line {}", line)
            }
            Self::NewModeExpected(line) => {
                write!(f, "New mode expected after old mode at line {}", line)
            }
            Self::NoFilename(line) => write!(f, "Cannot get filename at line {}", line),
            Self::InvalidString(line) => {
                write!(f, "Cannot extract file paths from diff line {}", line)
            }
        }
    }
}

impl std::error::Error for ParseError {}
