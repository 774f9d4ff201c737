//! The incremental patch scanner and its per-diff state machine.
//!
//! [`PatchScanner`] owns a cursor into one immutable buffer, a running line
//! counter, and at most one pushed-back line. Its single read primitive,
//! `next(filter, stop_on_mismatch)`, hands each parsing phase exactly the
//! upcoming line that phase wants, without ever pre-splitting the input.

use crate::line::{get_filename, HunkNumbers, LineView};
use crate::sink::{BinaryHunk, BinaryHunkKind, Diff, FileMode, FileOp, Patch};
use crate::ParseError;
use log::trace;

/// A stateless read selector over one line
type Filter = fn(&LineView<'_>) -> bool;

/// A `diff …` boundary line opening a new file's diff
fn is_diff_boundary(line: &LineView<'_>) -> bool {
    line.text().starts_with(b"diff -")
}

/// A line worth stopping on while skipping extended headers: the binary
/// marker, a minus header, or the next diff boundary
fn is_useful(line: &LineView<'_>) -> bool {
    line.is_binary() || line.is_minus_header() || is_diff_boundary(line)
}

/// A top-level file boundary: a minus header or a diff boundary
fn is_starter(line: &LineView<'_>) -> bool {
    line.is_minus_header() || is_diff_boundary(line)
}

/// Accept whatever comes next
fn any_line(_: &LineView<'_>) -> bool {
    true
}

fn is_hunk_header(line: &LineView<'_>) -> bool {
    line.text().starts_with(b"@@ -")
}

fn is_old_mode(line: &LineView<'_>) -> bool {
    line.text().starts_with(b"old mode ")
}

/// A hunk body line: removed, added, context, or the no-newline marker
fn is_hunk_body(line: &LineView<'_>) -> bool {
    match line.text().first() {
        Some(b'-') | Some(b'+') | Some(b' ') => true,
        _ => line.text().starts_with(b"\\ No newline"),
    }
}

/// Read the run of decimal digits at the start of `buf`, 0 if there is none
fn parse_usize(buf: &[u8]) -> usize {
    buf.iter()
        .take_while(|c| c.is_ascii_digit())
        .fold(0usize, |r, &c| {
            r.wrapping_mul(10).wrapping_add(usize::from(c - b'0'))
        })
}

/// Parse a whole patch buffer, driving `patch` with the resulting events.
///
/// Convenience wrapper around [`PatchScanner::new`] + [`PatchScanner::parse`].
pub fn parse(buf: &[u8], patch: &mut dyn Patch) -> Result<(), ParseError> {
    PatchScanner::new(buf).parse(patch)
}

/// Reads a patch buffer one line at a time and emits diff events.
///
/// One scanner processes one buffer to completion before any sink method is
/// invoked again; any failure aborts the whole buffer, leaving already
/// emitted events valid.
pub struct PatchScanner<'a> {
    buf: &'a [u8],
    pos: usize,
    line: usize,
    last: Option<LineView<'a>>,
}

impl<'a> PatchScanner<'a> {
    /// Create a scanner over the full patch content
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            line: 1,
            last: None,
        }
    }

    /// Re-arm the scanner so the same buffer can be traversed again
    pub fn reset(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.last = None;
    }

    /// The running 1-based line counter
    pub fn line(&self) -> usize {
        self.line
    }

    /// Push exactly one already-read line back for the next `next()` call
    fn set_last(&mut self, line: LineView<'a>) {
        self.last = Some(line);
    }

    /// The sole read primitive: the next line matching `filter`.
    ///
    /// A pushed-back line is tried first; on mismatch it is discarded, never
    /// re-preserved. Scanning then continues from the cursor; the cursor is
    /// committed past a line only when it matches. With `stop_on_mismatch`
    /// the first mismatching line ends the call with `None` instead of being
    /// skipped. Returns `None` at end of buffer.
    fn next(&mut self, filter: Filter, stop_on_mismatch: bool) -> Option<LineView<'a>> {
        if let Some(line) = self.last.take() {
            if filter(&line) {
                return Some(line);
            }
            if stop_on_mismatch {
                return None;
            }
        }

        let mut start = self.pos;
        let mut n = self.pos;
        while n < self.buf.len() {
            if self.buf[n] == b'\n' {
                let mut end = n;
                if end > start && self.buf[end - 1] == b'\r' {
                    end -= 1;
                }
                let line = LineView::new(&self.buf[start..end], self.line);
                self.line += 1;
                if filter(&line) {
                    self.pos = n + 1;
                    return Some(line);
                }
                if stop_on_mismatch {
                    return None;
                }
                start = n + 1;
            }
            n += 1;
        }
        None
    }

    /// Top level: hand every file's diff to `parse_diff`, then close the
    /// patch. The first failure aborts the whole buffer.
    pub fn parse(&mut self, patch: &mut dyn Patch) -> Result<(), ParseError> {
        while let Some(line) = self.next(is_starter, false) {
            self.parse_diff(line, patch)?;
        }
        patch.close();
        Ok(())
    }

    fn parse_diff(
        &mut self,
        diff_line: LineView<'a>,
        patch: &mut dyn Patch,
    ) -> Result<(), ParseError> {
        trace!("diff at {}", diff_line);

        if diff_line.is_minus_header() {
            // A --- before any diff boundary: either junk in a leading mail
            // header, or a patch with no boundary lines at all. Look for an
            // embedded boundary to tell the two apart.
            let rest = &self.buf[self.pos..];
            if let Some(found) = rest.windows(7).position(|w| w == b"\ndiff -") {
                // resume right past the newline; the boundary surfaces on
                // the outer loop's next iteration
                self.pos += found + 1;
                return Ok(());
            }
            return self.parse_minus(&diff_line, FileOp::None, None, patch);
        }

        let mut line = match self.next(any_line, false) {
            Some(line) => line,
            None => {
                // nothing after the boundary line
                let (old, new) = diff_line.parse_file_pair()?;
                trace!("single diff line: {}", String::from_utf8_lossy(new));
                let diff = patch.new_diff();
                diff.set_info(old, new, FileOp::None, None, None);
                diff.close();
                return Ok(());
            }
        };

        let mut file_mode = None;
        if is_old_mode(&line) {
            let old = line.parse_mode(b"old mode ");
            let mode_line = match self.next(any_line, false) {
                Some(l) if l.text().starts_with(b"new mode ") => l,
                Some(l) => return Err(ParseError::NewModeExpected(l.number())),
                None => return Err(ParseError::NewModeExpected(self.line)),
            };
            let mode = FileMode {
                old,
                new: mode_line.parse_mode(b"new mode "),
            };
            match self.next(any_line, false) {
                Some(l) => {
                    line = l;
                    file_mode = Some(mode);
                }
                None => {
                    // the mode pair is the entire diff
                    let (old, new) = diff_line.parse_file_pair()?;
                    trace!("mode change only: {}", String::from_utf8_lossy(new));
                    let diff = patch.new_diff();
                    diff.set_info(old, new, FileOp::None, None, Some(mode));
                    diff.close();
                    return Ok(());
                }
            }
        }

        let op = line.file_op();
        trace!("op {} for {}, header {}", op, diff_line, line);

        if is_diff_boundary(&line) || line.is_empty() {
            // no further headers for this file
            let (old, new) = diff_line.parse_file_pair()?;
            let diff = patch.new_diff();
            diff.set_info(old, new, FileOp::None, None, file_mode);
            diff.close();
            self.set_last(line);
            return Ok(());
        }

        if matches!(op, FileOp::Renamed | FileOp::Copied) {
            // with no content change there is no ---/+++ pair, so the paths
            // come from the from/to header lines themselves
            let (from_label, to_label): (&[u8], &[u8]) = if op == FileOp::Renamed {
                (b"rename from ", b"rename to ")
            } else {
                (b"copy from ", b"copy to ")
            };
            let old = get_filename(line.tail(from_label.len()), line.number())?;
            let to_line = self
                .next(any_line, false)
                .ok_or(ParseError::InvalidHunkHeader(self.line))?;
            let new = get_filename(to_line.tail(to_label.len()), line.number())?;
            trace!(
                "{} from {} to {}",
                op,
                String::from_utf8_lossy(old),
                String::from_utf8_lossy(new)
            );

            let diff = patch.new_diff();
            diff.set_info(old, new, op, None, file_mode);

            match self.next(any_line, false) {
                Some(probe) if probe.is_minus_header() => {
                    // skip the +++ line
                    self.next(any_line, false);
                    let hunk_line = self
                        .next(any_line, false)
                        .ok_or(ParseError::InvalidHunkHeader(self.line))?;
                    self.parse_hunks(hunk_line, diff)?;
                    diff.close();
                }
                Some(probe) => {
                    // no content hunks for this file
                    diff.close();
                    self.set_last(probe);
                }
                None => diff.close(),
            }
            return Ok(());
        }

        if op.is_new_or_deleted() || line.is_index() {
            line = match self.next(is_useful, false) {
                Some(l) => l,
                None => {
                    let (old, new) = diff_line.parse_file_pair()?;
                    trace!("single diff line: {}", String::from_utf8_lossy(new));
                    let diff = patch.new_diff();
                    diff.set_info(old, new, op, None, file_mode);
                    diff.close();
                    return Ok(());
                }
            };
            if line.is_binary() {
                // file info lives only in the boundary line here
                let (old, new) = diff_line.parse_file_pair()?;
                trace!("binary file ({}): {}", op, String::from_utf8_lossy(new));
                let diff = patch.new_diff();
                let sizes = self.skip_binary();
                diff.set_info(old, new, op, Some(sizes), file_mode);
                diff.close();
                return Ok(());
            } else if is_diff_boundary(&line) {
                let (old, new) = diff_line.parse_file_pair()?;
                let diff = patch.new_diff();
                diff.set_info(old, new, op, None, file_mode);
                diff.close();
                self.set_last(line);
                return Ok(());
            }
        }

        if line.is_minus_header() {
            return self.parse_minus(&line, op, file_mode, patch);
        }

        Ok(())
    }

    fn parse_minus(
        &mut self,
        line: &LineView<'a>,
        op: FileOp,
        file_mode: Option<FileMode>,
        patch: &mut dyn Patch,
    ) -> Result<(), ParseError> {
        let old = get_filename(line.tail(3), line.number())?;

        let plus_line = self
            .next(any_line, false)
            .ok_or(ParseError::InvalidHunkHeader(self.line))?;
        if !plus_line.is_plus_header() {
            // a diff with no hunks at all
            trace!("no +++ after ---, dropping: {}", plus_line);
            return Ok(());
        }
        let new = get_filename(plus_line.tail(3), line.number())?;
        trace!(
            "files: old {} -- new {}",
            String::from_utf8_lossy(old),
            String::from_utf8_lossy(new)
        );

        let diff = patch.new_diff();
        diff.set_info(old, new, op, None, file_mode);

        let hunk_line = self
            .next(any_line, false)
            .ok_or(ParseError::InvalidHunkHeader(self.line))?;
        self.parse_hunks(hunk_line, diff)?;
        diff.close();
        Ok(())
    }

    fn parse_hunks(&mut self, line: LineView<'a>, diff: &mut dyn Diff) -> Result<(), ParseError> {
        let numbers = line.parse_hunk_numbers()?;
        self.parse_hunk(numbers, diff);
        while let Some(header) = self.next(is_hunk_header, true) {
            let numbers = header.parse_hunk_numbers()?;
            self.parse_hunk(numbers, diff);
        }
        Ok(())
    }

    /// Emit one hunk's body, consuming the counts from its header.
    ///
    /// Stops once both remaining counts reach zero, or silently earlier when
    /// no further line matches the body filter (truncated hunk).
    fn parse_hunk(&mut self, numbers: HunkNumbers, diff: &mut dyn Diff) {
        diff.new_hunk();
        let mut old_line = numbers.old_start;
        let mut new_line = numbers.new_start;
        let mut old_left = numbers.old_count;
        let mut new_left = numbers.new_count;
        while let Some(line) = self.next(is_hunk_body, true) {
            match line.text().first() {
                Some(b'-') => {
                    diff.add_line(old_line, 0, line.tail(1));
                    old_line = old_line.wrapping_add(1);
                    old_left = old_left.wrapping_sub(1);
                }
                Some(b'+') => {
                    diff.add_line(0, new_line, line.tail(1));
                    new_line = new_line.wrapping_add(1);
                    new_left = new_left.wrapping_sub(1);
                }
                Some(b' ') => {
                    diff.add_line(old_line, new_line, line.tail(1));
                    old_line = old_line.wrapping_add(1);
                    new_line = new_line.wrapping_add(1);
                    old_left = old_left.wrapping_sub(1);
                    new_left = new_left.wrapping_sub(1);
                }
                // the no-newline marker: matches the filter, records nothing
                _ => {}
            }
            if old_left == 0 && new_left == 0 {
                break;
            }
        }
    }

    /// Record the sizes of the opaque binary hunks at the cursor.
    ///
    /// Each `literal <size>`/`delta <size>` label is followed by payload
    /// lines up to an empty line; the payload is skipped, never interpreted.
    fn skip_binary(&mut self) -> Vec<BinaryHunk> {
        let mut sizes = Vec::new();
        loop {
            let rest = &self.buf[self.pos..];
            if rest.starts_with(b"literal ") {
                self.pos += 8;
                sizes.push(BinaryHunk {
                    kind: BinaryHunkKind::Literal,
                    size: parse_usize(&self.buf[self.pos..]),
                });
            } else if rest.starts_with(b"delta ") {
                self.pos += 6;
                sizes.push(BinaryHunk {
                    kind: BinaryHunkKind::Delta,
                    size: parse_usize(&self.buf[self.pos..]),
                });
            } else {
                break;
            }
            self.skip_until_empty_line();
        }
        sizes
    }

    /// Advance line by line until an empty line is consumed, or to the end
    /// of the buffer if there is none
    fn skip_until_empty_line(&mut self) {
        let rest = &self.buf[self.pos..];
        let mut line_start = 0;
        for (n, &c) in rest.iter().enumerate() {
            if c == b'\n' {
                self.line += 1;
                if n == line_start {
                    self.pos += n + 1;
                    return;
                }
                line_start = n + 1;
            }
        }
        self.pos = self.buf.len();
    }
}

#[cfg(test)]
mod next_tests {
    use super::*;

    #[test]
    fn test_commits_cursor_only_on_match() {
        let mut scanner = PatchScanner::new(b"abc\n@@ -1 +1 @@\n");
        // stop_on_mismatch abandons the candidate without consuming it
        assert!(scanner.next(is_hunk_header, true).is_none());
        let line = scanner.next(any_line, false).unwrap();
        assert_eq!(line.text(), b"abc");
        let line = scanner.next(is_hunk_header, false).unwrap();
        assert_eq!(line.text(), b"@@ -1 +1 @@");
    }

    #[test]
    fn test_skips_mismatches_without_stop() {
        let mut scanner = PatchScanner::new(b"abc\ndef\ndiff -r a b\n");
        let line = scanner.next(is_starter, false).unwrap();
        assert_eq!(line.text(), b"diff -r a b");
        assert!(scanner.next(any_line, false).is_none());
    }

    #[test]
    fn test_pushback_is_tried_first() {
        let mut scanner = PatchScanner::new(b"diff -r a b\nrest\n");
        let line = scanner.next(any_line, false).unwrap();
        scanner.set_last(line);
        let again = scanner.next(is_starter, false).unwrap();
        assert_eq!(again.text(), b"diff -r a b");
        assert_eq!(again.number(), 1);
    }

    #[test]
    fn test_pushback_mismatch_is_discarded() {
        let mut scanner = PatchScanner::new(b"abc\ndiff -r a b\n");
        let line = scanner.next(any_line, false).unwrap();
        scanner.set_last(line);
        // the pushed-back "abc" fails the filter and is dropped for good
        assert!(scanner.next(is_starter, true).is_none());
        let line = scanner.next(any_line, false).unwrap();
        assert_eq!(line.text(), b"diff -r a b");
    }

    #[test]
    fn test_strips_carriage_return() {
        let mut scanner = PatchScanner::new(b"abc\r\n\r\n");
        assert_eq!(scanner.next(any_line, false).unwrap().text(), b"abc");
        assert_eq!(scanner.next(any_line, false).unwrap().text(), b"");
    }

    #[test]
    fn test_unterminated_final_line_is_ignored() {
        let mut scanner = PatchScanner::new(b"abc\ndef");
        assert_eq!(scanner.next(any_line, false).unwrap().text(), b"abc");
        assert!(scanner.next(any_line, false).is_none());
    }
}
