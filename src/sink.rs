//! The sink contract: caller-implemented objects that receive parse events.
//!
//! The scanner never owns a sink; it borrows a [`Patch`] for the duration of
//! one buffer and each [`Diff`] for the duration of one file.

use std::fmt;

/// The kind of an opaque binary change block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryHunkKind {
    /// A full replacement payload (`literal <size>`)
    Literal,

    /// A delta against the previous content (`delta <size>`)
    Delta,
}

/// An opaque binary change block, recorded as kind plus byte size only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryHunk {
    /// Whether the payload is a literal or a delta
    pub kind: BinaryHunkKind,

    /// The decoded payload size in bytes, as stated by the header
    pub size: usize,
}

/// An explicit mode change (`old mode`/`new mode` header pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode {
    /// Octal permission bits before the change
    pub old: u32,

    /// Octal permission bits after the change
    pub new: u32,
}

/// The operation a diff performs on its file.
///
/// `New` and `Deleted` carry the octal mode from their header line; renames
/// and copies record their mode (if any) separately via [`FileMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    /// The file is created with the given mode
    New(u32),

    /// The file is deleted with the given mode
    Deleted(u32),

    /// The file is renamed
    Renamed,

    /// The file is copied
    Copied,

    /// The file is touched in place
    None,
}

impl FileOp {
    /// Whether this operation creates or removes the file
    pub fn is_new_or_deleted(&self) -> bool {
        matches!(self, Self::New(_) | Self::Deleted(_))
    }
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::New(mode) => write!(f, "new file mode {:o}", mode),
            Self::Deleted(mode) => write!(f, "deleted file mode {:o}", mode),
            Self::Renamed => write!(f, "renamed"),
            Self::Copied => write!(f, "copied"),
            Self::None => write!(f, "touched"),
        }
    }
}

/// Receives the events for a single file within a patch.
///
/// Call order for one diff: `set_info` exactly once, then for each textual
/// hunk a `new_hunk` followed by its `add_line` calls in source order, then
/// `close` exactly once. Content-less and binary diffs go straight from
/// `set_info` to `close`.
pub trait Diff {
    /// Set the file info.
    ///
    /// `binary_sizes` is present for binary diffs only; such diffs never
    /// carry textual hunks. `file_mode` is present only when the diff has an
    /// explicit `old mode`/`new mode` header pair.
    fn set_info(
        &mut self,
        old_name: &[u8],
        new_name: &[u8],
        op: FileOp,
        binary_sizes: Option<Vec<BinaryHunk>>,
        file_mode: Option<FileMode>,
    );

    /// Add a body line.
    ///
    /// For an added line (`+`), `old_line` is 0 and `new_line` is the line
    /// number in the destination file. For a removed line (`-`), `old_line`
    /// is the line number in the source file and `new_line` is 0. For a
    /// context line, both are set. `line` excludes the leading marker
    /// character and any trailing newline.
    fn add_line(&mut self, old_line: u32, new_line: u32, line: &[u8]);

    /// A new hunk starts; its `add_line` calls follow
    fn new_hunk(&mut self);

    /// Close the diff: no more events for this file
    fn close(&mut self);
}

/// Receives the per-patch events and hands out per-file sinks.
pub trait Patch {
    /// Create a fresh sink for the next file in the patch
    fn new_diff(&mut self) -> &mut dyn Diff;

    /// Close the patch, after the whole buffer was consumed successfully
    fn close(&mut self);
}
