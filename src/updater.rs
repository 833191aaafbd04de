use crate::document::DocumentEvent;
use crate::position::PositionStore;

/// Adjusts tracked positions after every edit. Updaters run in registration
/// order; each one decides which categories it manages.
pub trait PositionUpdater {
    fn update(&self, positions: &mut PositionStore, event: &DocumentEvent);
}

/// How one tracked range responds to one edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Adjustment {
    Unchanged,
    Moved { offset: usize, length: usize },
    Deleted,
}

/// Core range arithmetic shared by the default updater and the child-window
/// updater.
///
/// - An insertion at an empty range's anchor extends the range over the new
///   text.
/// - A range entirely before the edit is untouched; one entirely at or after
///   the removed span shifts by the length delta.
/// - A pure deletion consuming a non-empty range whole deletes it, or pins
///   it as a zero-length marker at the edit offset when `deletable` is
///   false. A replacement covering the range makes it span the new text.
/// - An empty range inside the removed span is pinned at the edit offset.
/// - A partial overlap absorbs the edit: the removed overlap leaves the
///   range's length, the inserted text joins it.
pub(crate) fn adjust_range(
    pos_offset: usize,
    pos_length: usize,
    edit_offset: usize,
    removed: usize,
    inserted: usize,
    deletable: bool,
) -> Adjustment {
    let pos_end = pos_offset + pos_length;
    let edit_end = edit_offset + removed;

    if removed == 0 && pos_length == 0 && pos_offset == edit_offset {
        if inserted == 0 {
            return Adjustment::Unchanged;
        }
        return Adjustment::Moved {
            offset: pos_offset,
            length: inserted,
        };
    }
    if pos_end <= edit_offset {
        return Adjustment::Unchanged;
    }
    if pos_offset >= edit_end {
        return Adjustment::Moved {
            offset: pos_offset - removed + inserted,
            length: pos_length,
        };
    }
    if removed > 0 && edit_offset <= pos_offset && pos_end <= edit_end {
        // the edit swallows the range whole
        if pos_length == 0 || inserted == 0 {
            if pos_length > 0 && deletable {
                return Adjustment::Deleted;
            }
            return Adjustment::Moved {
                offset: edit_offset,
                length: 0,
            };
        }
        return Adjustment::Moved {
            offset: edit_offset,
            length: inserted,
        };
    }
    let overlap = pos_end.min(edit_end) - pos_offset.max(edit_offset);
    Adjustment::Moved {
        offset: pos_offset.min(edit_offset),
        length: pos_length.saturating_sub(overlap) + inserted,
    }
}

/// The standard updater for one position category. Every document constructs
/// its own instance for the default category; callers adding further
/// categories register additional instances.
pub struct DefaultPositionUpdater {
    category: String,
    deletable: bool,
}

impl DefaultPositionUpdater {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            deletable: true,
        }
    }

    /// Variant whose positions survive edits that swallow them whole: the
    /// position collapses to a zero-length marker at the edit offset instead
    /// of being removed.
    pub fn undeletable(category: &str) -> Self {
        Self {
            category: category.to_string(),
            deletable: false,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

impl PositionUpdater for DefaultPositionUpdater {
    fn update(&self, positions: &mut PositionStore, event: &DocumentEvent) {
        let Ok(handles) = positions.handles_in(&self.category) else {
            return;
        };
        for handle in handles {
            let Some((offset, length)) = positions.range(handle) else {
                continue;
            };
            match adjust_range(
                offset,
                length,
                event.offset,
                event.length,
                event.text.len(),
                self.deletable,
            ) {
                Adjustment::Unchanged => {}
                Adjustment::Moved { offset, length } => positions.set_range(handle, offset, length),
                Adjustment::Deleted => positions.delete_position(handle),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::DEFAULT_CATEGORY;

    fn event(offset: usize, length: usize, text: &str) -> DocumentEvent {
        DocumentEvent {
            offset,
            length,
            text: text.to_string(),
            modification_stamp: 1,
        }
    }

    #[test]
    fn test_range_before_edit_is_unchanged() {
        assert_eq!(adjust_range(0, 3, 5, 2, 4, true), Adjustment::Unchanged);
        assert_eq!(adjust_range(0, 3, 3, 0, 4, true), Adjustment::Unchanged);
    }

    #[test]
    fn test_range_after_edit_shifts() {
        assert_eq!(
            adjust_range(10, 2, 0, 3, 1, true),
            Adjustment::Moved {
                offset: 8,
                length: 2
            }
        );
        // insertion at the range's start shifts a non-empty range
        assert_eq!(
            adjust_range(5, 2, 5, 0, 3, true),
            Adjustment::Moved {
                offset: 8,
                length: 2
            }
        );
    }

    #[test]
    fn test_insertion_at_empty_anchor_extends() {
        assert_eq!(
            adjust_range(0, 0, 0, 0, 2, true),
            Adjustment::Moved {
                offset: 0,
                length: 2
            }
        );
    }

    #[test]
    fn test_contained_insertion_grows_range() {
        assert_eq!(
            adjust_range(0, 5, 2, 0, 3, true),
            Adjustment::Moved {
                offset: 0,
                length: 8
            }
        );
    }

    #[test]
    fn test_consuming_deletion_removes_range() {
        assert_eq!(adjust_range(2, 3, 2, 3, 0, true), Adjustment::Deleted);
        assert_eq!(adjust_range(3, 1, 2, 3, 0, true), Adjustment::Deleted);
    }

    #[test]
    fn test_consuming_deletion_pins_undeletable_range() {
        assert_eq!(
            adjust_range(2, 3, 2, 3, 0, false),
            Adjustment::Moved {
                offset: 2,
                length: 0
            }
        );
    }

    #[test]
    fn test_covering_replacement_spans_new_text() {
        // exact replacement of the range's content
        assert_eq!(
            adjust_range(3, 4, 3, 4, 1, true),
            Adjustment::Moved {
                offset: 3,
                length: 1
            }
        );
        // replacement strictly containing the range
        assert_eq!(
            adjust_range(3, 4, 2, 6, 2, false),
            Adjustment::Moved {
                offset: 2,
                length: 2
            }
        );
    }

    #[test]
    fn test_empty_range_inside_removed_span_is_pinned() {
        assert_eq!(
            adjust_range(4, 0, 2, 5, 1, true),
            Adjustment::Moved {
                offset: 2,
                length: 0
            }
        );
    }

    #[test]
    fn test_partial_overlap_absorbs_edit() {
        // deletion eats the tail of the range
        assert_eq!(
            adjust_range(0, 5, 3, 4, 0, true),
            Adjustment::Moved {
                offset: 0,
                length: 3
            }
        );
        // replacement straddling the range's start
        assert_eq!(
            adjust_range(4, 4, 2, 4, 1, true),
            Adjustment::Moved {
                offset: 2,
                length: 3
            }
        );
    }

    #[test]
    fn test_updater_only_touches_its_category() {
        let mut positions = PositionStore::new();
        positions.add_category("markers");
        let tracked = positions.add(DEFAULT_CATEGORY, 10, 2).unwrap();
        let ignored = positions.add("markers", 10, 2).unwrap();

        let updater = DefaultPositionUpdater::new(DEFAULT_CATEGORY);
        updater.update(&mut positions, &event(0, 0, "abc"));

        assert_eq!(positions.range(tracked), Some((13, 2)));
        assert_eq!(positions.range(ignored), Some((10, 2)));
    }

    #[test]
    fn test_updater_removes_consumed_position() {
        let mut positions = PositionStore::new();
        let handle = positions.add(DEFAULT_CATEGORY, 2, 3).unwrap();
        let updater = DefaultPositionUpdater::new(DEFAULT_CATEGORY);
        updater.update(&mut positions, &event(1, 6, ""));
        assert!(positions.range(handle).is_none());
        assert!(positions.handles_in(DEFAULT_CATEGORY).unwrap().is_empty());
    }
}
