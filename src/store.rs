/// Linear character storage backing a document.
///
/// Offsets and lengths are byte offsets into UTF-8 text. The document
/// validates bounds and character-boundary alignment before calling into a
/// store, so implementations may assume every argument is valid.
pub trait TextStore {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The complete content as one string.
    fn get(&self) -> String;

    /// The content of `[offset, offset + length)`.
    fn get_range(&self, offset: usize, length: usize) -> String;

    /// The character starting at `offset`.
    fn char_at(&self, offset: usize) -> char;

    /// Whether `offset` falls on a character boundary.
    fn is_char_boundary(&self, offset: usize) -> bool;

    /// Replaces the entire content.
    fn set(&mut self, text: &str);

    /// Replaces `[offset, offset + length)` with `text`.
    fn replace(&mut self, offset: usize, length: usize, text: &str);
}

/// String-backed store. Every edit splices in place, which makes reads cheap
/// and writes O(content length). The default backend.
#[derive(Debug, Default)]
pub struct StringTextStore {
    text: String,
}

impl StringTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextStore for StringTextStore {
    fn len(&self) -> usize {
        self.text.len()
    }

    fn get(&self) -> String {
        self.text.clone()
    }

    fn get_range(&self, offset: usize, length: usize) -> String {
        self.text[offset..offset + length].to_string()
    }

    fn char_at(&self, offset: usize) -> char {
        self.text[offset..].chars().next().unwrap_or('\u{0}')
    }

    fn is_char_boundary(&self, offset: usize) -> bool {
        self.text.is_char_boundary(offset)
    }

    fn set(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
    }

    fn replace(&mut self, offset: usize, length: usize, text: &str) {
        self.text.replace_range(offset..offset + length, text);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PieceSource {
    Original,
    Added,
}

#[derive(Debug, Clone)]
struct Piece {
    source: PieceSource,
    start: usize,
    length: usize,
}

impl Piece {
    fn new(source: PieceSource, start: usize, length: usize) -> Self {
        Self {
            source,
            start,
            length,
        }
    }
}

/// Piece-table-backed store: the original content and all insertions live in
/// two append-only buffers, and the logical text is a sequence of pieces
/// referencing them. Edits never move existing text, so replace cost is
/// proportional to the piece count rather than the content length.
#[derive(Debug, Default)]
pub struct PieceTableStore {
    original: String,
    added: String,
    pieces: Vec<Piece>,
    total: usize,
}

impl PieceTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let original: String = text.into();
        let total = original.len();
        let pieces = if total > 0 {
            vec![Piece::new(PieceSource::Original, 0, total)]
        } else {
            Vec::new()
        };
        Self {
            original,
            added: String::new(),
            pieces,
            total,
        }
    }

    fn buffer(&self, source: PieceSource) -> &str {
        match source {
            PieceSource::Original => &self.original,
            PieceSource::Added => &self.added,
        }
    }

    fn piece_text(&self, piece: &Piece) -> &str {
        &self.buffer(piece.source)[piece.start..piece.start + piece.length]
    }

    fn insert(&mut self, offset: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let added_start = self.added.len();
        self.added.push_str(text);
        let inserted = Piece::new(PieceSource::Added, added_start, text.len());

        if offset >= self.total {
            self.pieces.push(inserted);
        } else {
            let mut current = 0;
            for i in 0..self.pieces.len() {
                let piece_len = self.pieces[i].length;
                if current + piece_len > offset {
                    let split = offset - current;
                    if split == 0 {
                        self.pieces.insert(i, inserted);
                    } else {
                        let piece = self.pieces[i].clone();
                        let left = Piece::new(piece.source, piece.start, split);
                        let right =
                            Piece::new(piece.source, piece.start + split, piece.length - split);
                        self.pieces[i] = left;
                        self.pieces.insert(i + 1, inserted);
                        self.pieces.insert(i + 2, right);
                    }
                    break;
                }
                current += piece_len;
            }
        }
        self.total += text.len();
    }

    fn delete(&mut self, start: usize, length: usize) {
        if length == 0 {
            return;
        }
        let end = start + length;
        let mut rebuilt = Vec::with_capacity(self.pieces.len() + 1);
        let mut current = 0;
        for piece in &self.pieces {
            let piece_start = current;
            let piece_end = current + piece.length;
            current = piece_end;

            if piece_end <= start || piece_start >= end {
                rebuilt.push(piece.clone());
                continue;
            }
            if piece_start < start {
                // keep the head that precedes the deletion
                rebuilt.push(Piece::new(piece.source, piece.start, start - piece_start));
            }
            if piece_end > end {
                // keep the tail that follows the deletion
                rebuilt.push(Piece::new(
                    piece.source,
                    piece.start + (end - piece_start),
                    piece_end - end,
                ));
            }
        }
        self.pieces = rebuilt;
        self.total -= length;
    }
}

impl TextStore for PieceTableStore {
    fn len(&self) -> usize {
        self.total
    }

    fn get(&self) -> String {
        let mut result = String::with_capacity(self.total);
        for piece in &self.pieces {
            result.push_str(self.piece_text(piece));
        }
        result
    }

    fn get_range(&self, offset: usize, length: usize) -> String {
        let end = offset + length;
        let mut result = String::with_capacity(length);
        let mut current = 0;
        for piece in &self.pieces {
            let piece_end = current + piece.length;
            if piece_end <= offset {
                current = piece_end;
                continue;
            }
            if current >= end {
                break;
            }
            let from = offset.saturating_sub(current);
            let to = (end - current).min(piece.length);
            result.push_str(&self.piece_text(piece)[from..to]);
            current = piece_end;
        }
        result
    }

    fn char_at(&self, offset: usize) -> char {
        let mut current = 0;
        for piece in &self.pieces {
            if current + piece.length > offset {
                let text = self.piece_text(piece);
                return text[offset - current..].chars().next().unwrap_or('\u{0}');
            }
            current += piece.length;
        }
        '\u{0}'
    }

    fn is_char_boundary(&self, offset: usize) -> bool {
        if offset == 0 || offset == self.total {
            return true;
        }
        let mut current = 0;
        for piece in &self.pieces {
            if current + piece.length > offset {
                return self.piece_text(piece).is_char_boundary(offset - current);
            }
            current += piece.length;
        }
        false
    }

    fn set(&mut self, text: &str) {
        *self = Self::from_text(text);
    }

    fn replace(&mut self, offset: usize, length: usize, text: &str) {
        self.delete(offset, length);
        self.insert(offset, text);
    }
}
