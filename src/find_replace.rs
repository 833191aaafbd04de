use regex::{Regex, RegexBuilder};

use crate::document::Document;
use crate::error::DocumentError;
use crate::region::Region;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    FindFirst,
    FindNext,
    Replace,
}

/// Stateful find/replace over a document.
///
/// Drives the external regex engine through a small state machine: a
/// successful `find_first` enables `find_next`, `replace` and
/// `replace_find_next`; the replace operations demand that the immediately
/// preceding operation was a successful find. Replacements are issued
/// through [`Document::replace`], so they run the standard notification
/// pipeline; the adapter never mutates the buffer any other way.
pub struct FindReplaceAdapter<'a> {
    document: &'a mut Document,
    pattern: Option<Regex>,
    regex_mode: bool,
    forward: bool,
    last_operation: Option<Operation>,
    last_match: Option<Region>,
    found: bool,
}

impl<'a> FindReplaceAdapter<'a> {
    pub fn new(document: &'a mut Document) -> Self {
        Self {
            document,
            pattern: None,
            regex_mode: false,
            forward: true,
            last_operation: None,
            last_match: None,
            found: false,
        }
    }

    /// Compiles `find_string` and looks for the first match: at or after
    /// `offset` when searching forward, or the last match strictly before
    /// `offset` when searching backward (the engine only iterates
    /// forward). Literal patterns are escaped into regex syntax; whole-word
    /// mode wraps the pattern in word-boundary anchors and cannot be
    /// combined with regex mode. A zero-length match is no match in forward
    /// searches.
    pub fn find_first(
        &mut self,
        offset: usize,
        find_string: &str,
        forward: bool,
        case_sensitive: bool,
        whole_word: bool,
        regex: bool,
    ) -> Result<Option<Region>, DocumentError> {
        if whole_word && regex {
            return Err(DocumentError::PatternSyntax(
                "whole-word and regex modes are mutually exclusive".to_string(),
            ));
        }
        // validates bounds and character alignment of the start offset
        self.document.get_range(offset, 0)?;
        let pattern = compile_pattern(find_string, case_sensitive, whole_word, regex)?;

        let text = self.document.get();
        let region = if forward {
            find_forward(&pattern, &text, offset)
        } else {
            find_backward(&pattern, &text, offset)
        };

        self.pattern = Some(pattern);
        self.regex_mode = regex;
        self.forward = forward;
        self.last_operation = Some(Operation::FindFirst);
        self.last_match = region;
        self.found = region.is_some();
        Ok(region)
    }

    /// Continues from the prior match with the same compiled pattern.
    pub fn find_next(&mut self) -> Result<Option<Region>, DocumentError> {
        let (Some(pattern), Some(last)) = (self.pattern.clone(), self.last_match) else {
            return Err(DocumentError::IllegalState(
                "find-next requires a preceding find",
            ));
        };
        let text = self.document.get();
        let region = if self.forward {
            find_forward(&pattern, &text, last.end().min(text.len()))
        } else {
            // no native backward iteration: re-scan and keep the last match
            // before the remembered one
            find_backward(&pattern, &text, last.offset)
        };
        self.last_operation = Some(Operation::FindNext);
        self.last_match = region;
        self.found = region.is_some();
        Ok(region)
    }

    /// Substitutes the current match. In regex mode the replacement is a
    /// template: `$n` refers to capture groups, and the escapes `\n`, `\t`,
    /// `\r` and `\\` are interpreted.
    pub fn replace(&mut self, replacement: &str) -> Result<Region, DocumentError> {
        if !self.found
            || !matches!(
                self.last_operation,
                Some(Operation::FindFirst | Operation::FindNext)
            )
        {
            return Err(DocumentError::IllegalState(
                "replace requires an immediately preceding successful find",
            ));
        }
        let Some(target) = self.last_match else {
            return Err(DocumentError::IllegalState(
                "replace requires an immediately preceding successful find",
            ));
        };

        let replacement_text = if self.regex_mode {
            let template = interpret_replace_escapes(replacement)?;
            let Some(pattern) = self.pattern.clone() else {
                return Err(DocumentError::IllegalState(
                    "replace requires an immediately preceding successful find",
                ));
            };
            let text = self.document.get();
            // the buffer is unchanged since the find, so the leftmost match
            // from the match offset is the match itself
            let captures = pattern.captures_at(&text, target.offset).ok_or(
                DocumentError::IllegalState("current match no longer present"),
            )?;
            let mut expanded = String::new();
            captures.expand(&template, &mut expanded);
            expanded
        } else {
            replacement.to_string()
        };

        self.document
            .replace(target.offset, target.length, &replacement_text)?;
        let replaced = Region::new(target.offset, replacement_text.len());
        self.last_operation = Some(Operation::Replace);
        self.last_match = Some(replaced);
        self.found = false;
        Ok(replaced)
    }

    /// `replace` followed by `find_next`, continuing past the substituted
    /// text.
    pub fn replace_find_next(
        &mut self,
        replacement: &str,
    ) -> Result<Option<Region>, DocumentError> {
        self.replace(replacement)?;
        self.find_next()
    }
}

/// Stateless search used by [`Document::search`]: literal patterns only, and
/// every failure (bad pattern, bad offset) reports as no match.
pub(crate) fn search_document(
    document: &Document,
    start_offset: usize,
    find_string: &str,
    forward: bool,
    case_sensitive: bool,
    whole_word: bool,
) -> Option<Region> {
    if document.get_range(start_offset, 0).is_err() {
        return None;
    }
    let pattern = compile_pattern(find_string, case_sensitive, whole_word, false).ok()?;
    let text = document.get();
    if forward {
        find_forward(&pattern, &text, start_offset)
    } else {
        find_backward(&pattern, &text, start_offset)
    }
}

fn compile_pattern(
    find_string: &str,
    case_sensitive: bool,
    whole_word: bool,
    regex: bool,
) -> Result<Regex, DocumentError> {
    let pattern = if regex {
        find_string.to_string()
    } else {
        let escaped = regex::escape(find_string);
        if whole_word {
            format!(r"\b{escaped}\b")
        } else {
            escaped
        }
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|err| DocumentError::PatternSyntax(err.to_string()))
}

fn find_forward(pattern: &Regex, text: &str, offset: usize) -> Option<Region> {
    let found = pattern.find_at(text, offset)?;
    if found.start() == found.end() {
        // an empty match would stall repeated find-next calls
        return None;
    }
    Some(Region::new(found.start(), found.end() - found.start()))
}

fn find_backward(pattern: &Regex, text: &str, before: usize) -> Option<Region> {
    let mut last = None;
    for found in pattern.find_iter(text) {
        if found.start() >= before {
            break;
        }
        last = Some(Region::new(found.start(), found.end() - found.start()));
    }
    last
}

// Replacement templates pass `$n` group references through to the engine but
// interpret backslash escapes themselves; unknown escapes are errors.
fn interpret_replace_escapes(replacement: &str) -> Result<String, DocumentError> {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                return Err(DocumentError::PatternSyntax(format!(
                    "illegal escape '\\{other}' in replacement"
                )));
            }
            None => {
                return Err(DocumentError::PatternSyntax(
                    "dangling escape at end of replacement".to_string(),
                ));
            }
        }
    }
    Ok(out)
}
