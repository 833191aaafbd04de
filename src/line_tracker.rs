use crate::error::DocumentError;
use crate::region::Region;
use crate::store::TextStore;

/// Line delimiters recognized by the tracker, longest first so that "\r\n"
/// wins over a lone "\r".
pub const DELIMITERS: [&str; 3] = ["\r\n", "\r", "\n"];

/// A delimiter occurrence inside a scanned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterMatch {
    /// Byte index of the delimiter's first character.
    pub index: usize,
    pub text: &'static str,
}

/// Locates the next line delimiter in `text` at or after `from`.
pub fn next_delimiter(text: &str, from: usize) -> Option<DelimiterMatch> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                let text = if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    "\r\n"
                } else {
                    "\r"
                };
                return Some(DelimiterMatch { index: i, text });
            }
            b'\n' => return Some(DelimiterMatch { index: i, text: "\n" }),
            _ => i += 1,
        }
    }
    None
}

/// One tracked line. `length` includes the delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    pub offset: usize,
    pub length: usize,
    pub delimiter: Option<&'static str>,
}

impl LineRecord {
    fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Maintains the offset-ordered table of line records for a document.
///
/// Records are contiguous; when the text ends with a delimiter the trailing
/// empty line is conceptual and not materialized as a record. Offsets of
/// records behind an edit are shifted one by one, so an edit near the start
/// of a very large document costs O(remaining line count). That shift is the
/// tracker's documented performance characteristic; line numbering depends
/// on it staying exact.
#[derive(Debug, Clone)]
pub struct LineTracker {
    lines: Vec<LineRecord>,
}

impl Default for LineTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LineTracker {
    pub fn new() -> Self {
        Self {
            lines: vec![LineRecord {
                offset: 0,
                length: 0,
                delimiter: None,
            }],
        }
    }

    fn last(&self) -> &LineRecord {
        &self.lines[self.lines.len() - 1]
    }

    /// Total tracked text length in bytes.
    pub fn text_length(&self) -> usize {
        self.last().end()
    }

    pub fn number_of_lines(&self) -> usize {
        if self.last().delimiter.is_some() {
            self.lines.len() + 1
        } else {
            self.lines.len()
        }
    }

    /// Counts the lines `text` would have, without touching tracker state.
    /// Agrees with `set(text)` followed by `number_of_lines()`.
    pub fn compute_number_of_lines(text: &str) -> usize {
        let mut count = 1;
        let mut from = 0;
        while let Some(m) = next_delimiter(text, from) {
            count += 1;
            from = m.index + m.text.len();
        }
        count
    }

    /// Rebuilds the table from scratch.
    pub fn set(&mut self, text: &str) {
        self.lines = scan(text, 0);
        if self.lines.is_empty() {
            self.lines.push(LineRecord {
                offset: 0,
                length: 0,
                delimiter: None,
            });
        }
    }

    /// Index of the line containing `offset`. An offset equal to the text
    /// length resolves to the conceptual trailing line when the text ends
    /// with a delimiter, otherwise to the last line.
    pub fn line_of_offset(&self, offset: usize) -> Result<usize, DocumentError> {
        let total = self.text_length();
        if offset > total {
            return Err(DocumentError::BadLocation(format!(
                "offset {offset} exceeds text length {total}"
            )));
        }
        Ok(self.record_index(offset))
    }

    /// Offset and content length (excluding the delimiter) of `line`.
    pub fn line_information(&self, line: usize) -> Result<Region, DocumentError> {
        self.check_line(line)?;
        if line == self.lines.len() {
            return Ok(Region::new(self.text_length(), 0));
        }
        let record = &self.lines[line];
        let delimiter_length = record.delimiter.map_or(0, str::len);
        Ok(Region::new(record.offset, record.length - delimiter_length))
    }

    pub fn line_offset(&self, line: usize) -> Result<usize, DocumentError> {
        self.check_line(line)?;
        if line == self.lines.len() {
            return Ok(self.text_length());
        }
        Ok(self.lines[line].offset)
    }

    /// Length of `line` including its delimiter.
    pub fn line_length(&self, line: usize) -> Result<usize, DocumentError> {
        self.check_line(line)?;
        if line == self.lines.len() {
            return Ok(0);
        }
        Ok(self.lines[line].length)
    }

    pub fn line_delimiter(&self, line: usize) -> Result<Option<&'static str>, DocumentError> {
        self.check_line(line)?;
        if line == self.lines.len() {
            return Ok(None);
        }
        Ok(self.lines[line].delimiter)
    }

    /// Applies the replacement of `[offset, offset + length)` by `text`,
    /// where `content` is the store *after* the edit. Affected records are
    /// merged, re-derived by delimiter scanning over the edited window,
    /// spliced back in, and every record behind the window is shifted by the
    /// length delta.
    pub fn replace(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
        content: &dyn TextStore,
    ) -> Result<(), DocumentError> {
        let total = self.text_length();
        let cut = offset
            .checked_add(length)
            .filter(|end| *end <= total)
            .ok_or_else(|| {
                DocumentError::BadLocation(format!(
                    "range [{offset}, {offset}+{length}) exceeds text length {total}"
                ))
            })?;

        let mut first = self.record_index(offset);
        // an insertion right after a lone "\r" may pair it into "\r\n", so
        // the preceding record joins the rescan window
        if first > 0
            && (first == self.lines.len() || offset == self.lines[first].offset)
            && self.lines[first - 1].delimiter == Some("\r")
        {
            first -= 1;
        }
        let last = self.record_index(cut);

        let splice_start = first.min(self.lines.len());
        let splice_end = if last == self.lines.len() {
            self.lines.len()
        } else {
            last + 1
        };

        let window_start = if splice_start < self.lines.len() {
            self.lines[splice_start].offset.min(offset)
        } else {
            offset
        };
        let window_old_end = if last == self.lines.len() {
            total
        } else {
            self.lines[last].end()
        };
        let window_new_length = window_old_end - window_start - length + text.len();

        let window_text = content.get_range(window_start, window_new_length);
        let records = scan(&window_text, window_start);
        let record_count = records.len();

        let delta = text.len() as isize - length as isize;
        self.lines.splice(splice_start..splice_end, records);
        for record in self.lines.iter_mut().skip(splice_start + record_count) {
            record.offset = (record.offset as isize + delta) as usize;
        }
        if self.lines.is_empty() {
            self.lines.push(LineRecord {
                offset: 0,
                length: 0,
                delimiter: None,
            });
        }
        Ok(())
    }

    fn check_line(&self, line: usize) -> Result<(), DocumentError> {
        if line >= self.number_of_lines() {
            return Err(DocumentError::BadLocation(format!(
                "line {line} exceeds line count {}",
                self.number_of_lines()
            )));
        }
        Ok(())
    }

    // Record index for offsets in [0, total]; returns lines.len() for the
    // conceptual trailing line.
    fn record_index(&self, offset: usize) -> usize {
        if offset == self.text_length() && self.last().delimiter.is_some() {
            return self.lines.len();
        }
        self.lines.partition_point(|record| record.offset <= offset) - 1
    }
}

fn scan(text: &str, base: usize) -> Vec<LineRecord> {
    let mut records = Vec::new();
    let mut start = 0;
    while let Some(m) = next_delimiter(text, start) {
        let end = m.index + m.text.len();
        records.push(LineRecord {
            offset: base + start,
            length: end - start,
            delimiter: Some(m.text),
        });
        start = end;
    }
    if start < text.len() {
        records.push(LineRecord {
            offset: base + start,
            length: text.len() - start,
            delimiter: None,
        });
    }
    records
}
