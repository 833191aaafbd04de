use std::collections::HashMap;

use crate::error::DocumentError;

/// The position category every document starts with.
pub const DEFAULT_CATEGORY: &str = "default";

/// Snapshot of one tracked position. Mutation goes through the owning
/// [`PositionStore`] via the position's handle, so every holder of the
/// handle observes the same live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub length: usize,
    pub category: String,
    pub deleted: bool,
}

impl Position {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Identity of a tracked position. Positions are identity-significant:
/// categories hold handles, not values, and removal matches the handle, so
/// two positions with equal ranges stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionHandle(u64);

#[derive(Debug)]
struct PositionRecord {
    offset: usize,
    length: usize,
    category: String,
    deleted: bool,
}

/// Arena of positions plus the named, offset-ordered categories they belong
/// to. Records of removed positions are retained so stale handles resolve to
/// a deleted snapshot instead of dangling.
#[derive(Debug, Default)]
pub struct PositionStore {
    next_id: u64,
    records: HashMap<u64, PositionRecord>,
    categories: HashMap<String, Vec<PositionHandle>>,
}

impl PositionStore {
    pub fn new() -> Self {
        let mut store = Self::default();
        store.add_category(DEFAULT_CATEGORY);
        store
    }

    /// Adds `category` if it is not present yet.
    pub fn add_category(&mut self, category: &str) {
        self.categories.entry(category.to_string()).or_default();
    }

    /// Removes `category` and all positions in it.
    pub fn remove_category(&mut self, category: &str) -> Result<(), DocumentError> {
        let handles = self
            .categories
            .remove(category)
            .ok_or_else(|| DocumentError::BadPositionCategory(category.to_string()))?;
        for handle in handles {
            if let Some(record) = self.records.get_mut(&handle.0) {
                record.deleted = true;
            }
        }
        Ok(())
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Inserts a position into `category`, keeping the category ordered by
    /// offset. A new position is placed before existing ones with the same
    /// offset.
    pub fn add(
        &mut self,
        category: &str,
        offset: usize,
        length: usize,
    ) -> Result<PositionHandle, DocumentError> {
        if !self.categories.contains_key(category) {
            return Err(DocumentError::BadPositionCategory(category.to_string()));
        }
        let handle = PositionHandle(self.next_id);
        self.next_id += 1;
        self.records.insert(
            handle.0,
            PositionRecord {
                offset,
                length,
                category: category.to_string(),
                deleted: false,
            },
        );
        let index = {
            let handles = &self.categories[category];
            handles.partition_point(|h| {
                self.records
                    .get(&h.0)
                    .map_or(false, |record| record.offset < offset)
            })
        };
        if let Some(handles) = self.categories.get_mut(category) {
            handles.insert(index, handle);
        }
        Ok(handle)
    }

    /// Removes the position identified by `handle` from its category; a
    /// stale handle is ignored. Removes at most one entry.
    pub fn remove(&mut self, handle: PositionHandle) {
        let Some(record) = self.records.get_mut(&handle.0) else {
            return;
        };
        record.deleted = true;
        if let Some(handles) = self.categories.get_mut(&record.category) {
            if let Some(index) = handles.iter().position(|h| *h == handle) {
                handles.remove(index);
            }
        }
    }

    pub fn position(&self, handle: PositionHandle) -> Option<Position> {
        self.records.get(&handle.0).map(|record| Position {
            offset: record.offset,
            length: record.length,
            category: record.category.clone(),
            deleted: record.deleted,
        })
    }

    /// The live `(offset, length)` of a position, `None` once deleted.
    pub fn range(&self, handle: PositionHandle) -> Option<(usize, usize)> {
        self.records
            .get(&handle.0)
            .filter(|record| !record.deleted)
            .map(|record| (record.offset, record.length))
    }

    /// Rewrites a position's range in place; stale handles are ignored.
    pub fn set_range(&mut self, handle: PositionHandle, offset: usize, length: usize) {
        if let Some(record) = self.records.get_mut(&handle.0) {
            if !record.deleted {
                record.offset = offset;
                record.length = length;
            }
        }
    }

    /// Marks a position deleted and drops it from its category. Used by
    /// updaters when an edit swallows a position whole.
    pub fn delete_position(&mut self, handle: PositionHandle) {
        self.remove(handle);
    }

    /// Ordered snapshot of the handles in `category`.
    pub fn handles_in(&self, category: &str) -> Result<Vec<PositionHandle>, DocumentError> {
        self.categories
            .get(category)
            .cloned()
            .ok_or_else(|| DocumentError::BadPositionCategory(category.to_string()))
    }

    /// Whether any category holds at least one position.
    pub fn has_any(&self) -> bool {
        self.categories.values().any(|handles| !handles.is_empty())
    }
}
