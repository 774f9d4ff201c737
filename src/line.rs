//! A borrowed view of one source line, with the classification predicates
//! and micro-parsers the scanner drives its state machine with.

use crate::sink::FileOp;
use crate::ParseError;
use std::fmt;

/// Numbers recovered from one `@@ -old[,count] +new[,count] @@` header.
///
/// The counts are consumed while the hunk body is read and drive the body
/// loop's termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkNumbers {
    /// First line of the hunk in the source file
    pub old_start: u32,

    /// Number of source lines covered by the hunk
    pub old_count: u32,

    /// First line of the hunk in the destination file
    pub new_start: u32,

    /// Number of destination lines covered by the hunk
    pub new_count: u32,
}

/// One line of the source buffer: its text (without trailing newline or
/// carriage return) and its 1-based line number.
///
/// Borrows the buffer it was cut from and is only valid while that buffer is
/// alive.
#[derive(Debug, Clone, Copy)]
pub struct LineView<'a> {
    text: &'a [u8],
    number: usize,
}

/// Read a run of decimal digits starting at `i`, folding onto `acc`.
///
/// Returns the value and the index of the first non-digit byte.
fn read_decimal(buf: &[u8], mut i: usize, mut acc: u32) -> (u32, usize) {
    while i < buf.len() && buf[i].is_ascii_digit() {
        acc = acc
            .wrapping_mul(10)
            .wrapping_add(u32::from(buf[i] - b'0'));
        i += 1;
    }
    (acc, i)
}

fn strip_tree_prefix<'a>(path: &'a [u8], prefix: &[u8]) -> &'a [u8] {
    path.strip_prefix(prefix).unwrap_or(path)
}

/// Extract a filename from the text following a `---`/`+++`/`rename from`
/// style label.
///
/// Leading spaces are trimmed, the text is truncated at the first tab (the
/// timestamp separator appended by diff tools), a single leading `a/` or
/// `b/` tree prefix is stripped, and the literal `/dev/null` maps to an
/// empty name. Fails with [`ParseError::NoFilename`] when nothing is left
/// after trimming.
pub fn get_filename(buf: &[u8], line: usize) -> Result<&[u8], ParseError> {
    let start = buf
        .iter()
        .position(|&c| c != b' ')
        .ok_or(ParseError::NoFilename(line))?;
    let buf = &buf[start..];
    let buf = match buf.iter().position(|&c| c == b'\t') {
        Some(tab) => &buf[..tab],
        None => buf,
    };
    let buf = if buf.starts_with(b"a/") || buf.starts_with(b"b/") {
        &buf[2..]
    } else {
        buf
    };
    if buf == b"/dev/null" {
        Ok(b"")
    } else {
        Ok(buf)
    }
}

impl<'a> LineView<'a> {
    /// Create a view over `text` at the given 1-based line number
    pub fn new(text: &'a [u8], number: usize) -> Self {
        Self { text, number }
    }

    /// The line text, without trailing newline or carriage return
    pub fn text(&self) -> &'a [u8] {
        self.text
    }

    /// The 1-based line number
    pub fn number(&self) -> usize {
        self.number
    }

    /// The text after the first `n` bytes, empty if the line is shorter
    pub(crate) fn tail(&self, n: usize) -> &'a [u8] {
        match self.text.get(n..) {
            Some(rest) => rest,
            None => b"",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The `GIT binary patch` marker introducing opaque binary hunks
    pub fn is_binary(&self) -> bool {
        self.text == b"GIT binary patch"
    }

    pub fn is_rename_from(&self) -> bool {
        self.text.starts_with(b"rename from")
    }

    pub fn is_copy_from(&self) -> bool {
        self.text.starts_with(b"copy from")
    }

    pub fn is_new_file(&self) -> bool {
        self.text.starts_with(b"new file")
    }

    pub fn is_deleted_file(&self) -> bool {
        self.text.starts_with(b"deleted file")
    }

    /// The `--- old` header naming a diff's source path
    pub fn is_minus_header(&self) -> bool {
        self.text.starts_with(b"--- ")
    }

    /// The `+++ new` header naming a diff's destination path
    pub fn is_plus_header(&self) -> bool {
        self.text.starts_with(b"+++ ")
    }

    pub fn is_index(&self) -> bool {
        self.text.starts_with(b"index ")
    }

    /// Classify this header line as the file operation it announces.
    ///
    /// `new file`/`deleted file` headers also carry the octal mode after
    /// their fixed label; rename and copy headers carry no mode here.
    pub fn file_op(&self) -> FileOp {
        if self.is_new_file() {
            FileOp::New(self.parse_mode(b"new file mode "))
        } else if self.is_deleted_file() {
            FileOp::Deleted(self.parse_mode(b"deleted file mode "))
        } else if self.is_rename_from() {
            FileOp::Renamed
        } else if self.is_copy_from() {
            FileOp::Copied
        } else {
            FileOp::None
        }
    }

    /// Decode the octal mode following `label`.
    ///
    /// Reads the maximal run of octal digits and stops at the first other
    /// byte; a missing or empty run yields 0.
    pub fn parse_mode(&self, label: &[u8]) -> u32 {
        self.tail(label.len())
            .iter()
            .take_while(|c| (b'0'..=b'7').contains(c))
            .fold(0u32, |r, &c| r * 8 + u32::from(c - b'0'))
    }

    /// Parse the number pairs out of a `@@ -old[,count] +new[,count] @@…`
    /// hunk header.
    ///
    /// The caller guarantees the 4-byte `@@ -` prefix. Omitted counts
    /// default to 1, and extra tokens between the old pair and the `+` are
    /// skipped. Fails with [`ParseError::InvalidHunkHeader`] when either
    /// pair runs into the end of the line.
    pub fn parse_hunk_numbers(&self) -> Result<HunkNumbers, ParseError> {
        let buf = self.tail(4);
        let err = ParseError::InvalidHunkHeader(self.number);

        let (old_start, after) = read_decimal(buf, 0, 0);
        // skip the byte that terminated the number, then look at the next one
        let mut i = after + 1;
        if i >= buf.len() {
            return Err(err);
        }
        let c = buf[i];
        i += 1;
        let old_count = if c.is_ascii_digit() {
            let (value, after) = read_decimal(buf, i, u32::from(c - b'0'));
            i = after;
            value
        } else {
            1
        };

        if c != b'+' {
            match buf[i..].iter().position(|&c| c == b'+') {
                Some(plus) => i += plus + 1,
                None => i = buf.len(),
            }
        }

        let (new_start, after) = read_decimal(buf, i, 0);
        let mut i = after + 1;
        if i >= buf.len() {
            return Err(err);
        }
        let c = buf[i];
        i += 1;
        let new_count = if c.is_ascii_digit() {
            read_decimal(buf, i, u32::from(c - b'0')).0
        } else {
            1
        };

        Ok(HunkNumbers {
            old_start,
            old_count,
            new_start,
            new_count,
        })
    }

    /// Extract the old/new path pair from a `diff …` boundary line.
    ///
    /// Tool-specific tokens such as `--git` or `-r` may follow the fixed
    /// `diff ` prefix, so the last two space-separated tokens are taken as
    /// the path candidates and the `a/`/`b/` tree prefixes stripped. Fails
    /// with [`ParseError::InvalidString`] when either candidate comes up
    /// empty, which tells the caller this was not a 2-path form.
    pub fn parse_file_pair(&self) -> Result<(&'a [u8], &'a [u8]), ParseError> {
        let rest = self
            .text
            .get(5..)
            .ok_or(ParseError::InvalidHunkHeader(self.number))?;

        let mut tokens = rest.rsplit(|&c| c == b' ');
        let new = tokens.next().unwrap_or(b"");
        let old = tokens.next().unwrap_or(b"");

        let old = strip_tree_prefix(old, b"a/");
        let new = strip_tree_prefix(new, b"b/");
        if old.is_empty() || new.is_empty() {
            return Err(ParseError::InvalidString(self.number));
        }
        Ok((old, new))
    }
}

impl fmt::Display for LineView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.number, String::from_utf8_lossy(self.text))
    }
}

#[cfg(test)]
mod hunk_numbers_tests {
    use super::{HunkNumbers, LineView};
    use crate::ParseError;

    fn numbers(text: &str) -> Result<HunkNumbers, ParseError> {
        LineView::new(text.as_bytes(), 1).parse_hunk_numbers()
    }

    #[test]
    fn test_full_pairs() {
        assert_eq!(
            numbers("@@ -123,456 +789,101112 @@").unwrap(),
            HunkNumbers {
                old_start: 123,
                old_count: 456,
                new_start: 789,
                new_count: 101112,
            }
        );
    }

    #[test]
    fn test_default_counts() {
        assert_eq!(
            numbers("@@ -123 +789 @@").unwrap(),
            HunkNumbers {
                old_start: 123,
                old_count: 1,
                new_start: 789,
                new_count: 1,
            }
        );
    }

    #[test]
    fn test_zero_counts() {
        assert_eq!(
            numbers("@@ -0,0 +1 @@").unwrap(),
            HunkNumbers {
                old_start: 0,
                old_count: 0,
                new_start: 1,
                new_count: 1,
            }
        );
    }

    #[test]
    fn test_section_tail() {
        assert_eq!(
            numbers("@@ -34,11 +50,6 @@ fn main()").unwrap(),
            HunkNumbers {
                old_start: 34,
                old_count: 11,
                new_start: 50,
                new_count: 6,
            }
        );
    }

    #[test]
    fn test_tokens_before_plus() {
        assert_eq!(
            numbers("@@ -1,2 junk +3,4 @@").unwrap(),
            HunkNumbers {
                old_start: 1,
                old_count: 2,
                new_start: 3,
                new_count: 4,
            }
        );
    }

    #[test]
    fn test_truncated_after_plus() {
        assert_eq!(
            numbers("@@ -1,2 +3"),
            Err(ParseError::InvalidHunkHeader(1))
        );
    }

    #[test]
    fn test_truncated_old_pair() {
        assert_eq!(numbers("@@ -1"), Err(ParseError::InvalidHunkHeader(1)));
    }

    #[test]
    fn test_no_numbers_at_all() {
        assert!(numbers("@@ -").is_err());
    }
}

#[cfg(test)]
mod filename_tests {
    use super::get_filename;
    use crate::ParseError;

    #[test]
    fn test_plain() {
        assert_eq!(get_filename(b"foo/bar.cpp", 1).unwrap(), b"foo/bar.cpp");
    }

    #[test]
    fn test_leading_spaces() {
        assert_eq!(get_filename(b"   a/x.c", 1).unwrap(), b"x.c");
    }

    #[test]
    fn test_tab_truncates_timestamp() {
        assert_eq!(
            get_filename(b"foo/bar.cpp\t2023-01-01 00:00:00", 1).unwrap(),
            b"foo/bar.cpp"
        );
    }

    #[test]
    fn test_strips_single_tree_prefix() {
        assert_eq!(get_filename(b"a/foo", 1).unwrap(), b"foo");
        assert_eq!(get_filename(b"b/foo", 1).unwrap(), b"foo");
        // only one prefix is stripped
        assert_eq!(get_filename(b"a/b/foo", 1).unwrap(), b"b/foo");
    }

    #[test]
    fn test_dev_null_is_absent_file() {
        assert_eq!(get_filename(b"/dev/null", 1).unwrap(), b"");
        assert_eq!(get_filename(b"  /dev/null\t2023", 1).unwrap(), b"");
    }

    #[test]
    fn test_whitespace_only() {
        assert_eq!(get_filename(b"   ", 7), Err(ParseError::NoFilename(7)));
        assert_eq!(get_filename(b"", 7), Err(ParseError::NoFilename(7)));
    }
}

#[cfg(test)]
mod file_pair_tests {
    use super::LineView;
    use crate::ParseError;

    fn pair(text: &str) -> Result<(&[u8], &[u8]), ParseError> {
        LineView::new(text.as_bytes(), 1).parse_file_pair()
    }

    #[test]
    fn test_git_form() {
        assert_eq!(
            pair("diff --git a/foo/bar.cpp b/Foo/Bar/bar.cpp").unwrap(),
            (&b"foo/bar.cpp"[..], &b"Foo/Bar/bar.cpp"[..])
        );
    }

    #[test]
    fn test_recursive_form() {
        assert_eq!(
            pair("diff -r a/foo/bar.cpp b/Foo/Bar/bar.cpp").unwrap(),
            (&b"foo/bar.cpp"[..], &b"Foo/Bar/bar.cpp"[..])
        );
    }

    #[test]
    fn test_bare_form() {
        assert_eq!(
            pair("diff foo/bar.cpp Foo/Bar/bar.cpp").unwrap(),
            (&b"foo/bar.cpp"[..], &b"Foo/Bar/bar.cpp"[..])
        );
    }

    #[test]
    fn test_single_path() {
        assert_eq!(pair("diff --git"), Err(ParseError::InvalidString(1)));
    }

    #[test]
    fn test_trailing_space() {
        assert_eq!(
            pair("diff --git a/foo b/bar "),
            Err(ParseError::InvalidString(1))
        );
    }
}

#[cfg(test)]
mod classify_tests {
    use super::LineView;
    use crate::sink::FileOp;

    fn op(text: &str) -> FileOp {
        LineView::new(text.as_bytes(), 1).file_op()
    }

    #[test]
    fn test_file_op() {
        assert_eq!(op("new file mode 100644"), FileOp::New(0o100644));
        assert_eq!(op("deleted file mode 100755"), FileOp::Deleted(0o100755));
        assert_eq!(op("rename from old.txt"), FileOp::Renamed);
        assert_eq!(op("copy from old.txt"), FileOp::Copied);
        assert_eq!(op("index 0123456..89abcde 100644"), FileOp::None);
        assert_eq!(op("--- a/foo"), FileOp::None);
    }

    #[test]
    fn test_file_op_without_mode() {
        // "new file" with no mode label decodes to 0
        assert_eq!(op("new file"), FileOp::New(0));
    }

    #[test]
    fn test_parse_mode_stops_at_non_octal() {
        let line = LineView::new(b"old mode 100644junk", 1);
        assert_eq!(line.parse_mode(b"old mode "), 0o100644);
    }

    #[test]
    fn test_predicates() {
        let line = LineView::new(b"GIT binary patch", 1);
        assert!(line.is_binary());
        assert!(!LineView::new(b"GIT binary patch extra", 1).is_binary());
        assert!(LineView::new(b"--- a/foo", 1).is_minus_header());
        assert!(LineView::new(b"+++ b/foo", 1).is_plus_header());
        assert!(LineView::new(b"index 12..34", 1).is_index());
        assert!(LineView::new(b"", 1).is_empty());
    }
}
