use std::cell::RefCell;
use std::rc::Rc;

use crate::document::{Document, DocumentEvent, DocumentListener};
use crate::error::DocumentError;
use crate::line_tracker::LineTracker;
use crate::position::PositionHandle;
use crate::region::{Region, TypedRegion};
use crate::updater::{Adjustment, PositionUpdater, adjust_range};

/// Category installed on a master document to hold child window ranges.
pub const CHILD_RANGE_CATEGORY: &str = "child-ranges";

/// Observes a child document. Events arrive in the child's local offset
/// space, already clipped to its window. Callbacks run inside the master's
/// notification round and must not reenter the master document.
pub trait ChildDocumentListener {
    fn child_document_about_to_change(&self, _event: &DocumentEvent) {}
    fn child_document_changed(&self, _event: &DocumentEvent) {}
}

struct ChildState {
    range: PositionHandle,
    auto_expand: bool,
    tracker: LineTracker,
    listeners: Vec<Rc<dyn ChildDocumentListener>>,
}

/// A live window into a master document. Content queries read the master
/// directly through the window range, edits translate into master edits, and
/// the master's position model keeps the window in place across edits made
/// by anyone.
///
/// The value is a cheaply cloneable handle; clones observe the same window.
#[derive(Clone)]
pub struct ChildDocument {
    master: Rc<RefCell<Document>>,
    state: Rc<RefCell<ChildState>>,
}

impl ChildDocument {
    fn window(&self) -> Region {
        let handle = self.state.borrow().range;
        match self.master.borrow().position(handle) {
            Some(position) if !position.deleted => Region::new(position.offset, position.length),
            _ => Region::new(0, 0),
        }
    }

    pub fn master(&self) -> Rc<RefCell<Document>> {
        self.master.clone()
    }

    // ---- content ---------------------------------------------------------

    pub fn length(&self) -> usize {
        self.window().length
    }

    pub fn get(&self) -> String {
        let window = self.window();
        self.master
            .borrow()
            .get_range(window.offset, window.length)
            .unwrap_or_default()
    }

    pub fn get_range(&self, offset: usize, length: usize) -> Result<String, DocumentError> {
        let window = self.check_local(offset, length)?;
        self.master.borrow().get_range(window.offset + offset, length)
    }

    pub fn char_at(&self, offset: usize) -> Result<char, DocumentError> {
        let window = self.check_local(offset, 0)?;
        self.master.borrow().char_at(window.offset + offset)
    }

    /// Replaces `[offset, offset + length)` of the window. The edit is a
    /// master edit and runs the master's full pipeline.
    pub fn replace(
        &self,
        offset: usize,
        length: usize,
        text: &str,
    ) -> Result<(), DocumentError> {
        let window = self.check_local(offset, length)?;
        self.master
            .borrow_mut()
            .replace(window.offset + offset, length, text)
    }

    /// Replaces the window's entire content.
    pub fn set(&self, text: &str) -> Result<(), DocumentError> {
        let window = self.window();
        self.master
            .borrow_mut()
            .replace(window.offset, window.length, text)
    }

    // ---- window control --------------------------------------------------

    /// Assigns the window explicitly.
    pub fn set_range(&self, offset: usize, length: usize) -> Result<(), DocumentError> {
        let handle = self.state.borrow().range;
        self.master
            .borrow_mut()
            .set_position_range(handle, offset, length)?;
        self.refresh_tracker();
        Ok(())
    }

    pub fn auto_expand_mode(&self) -> bool {
        self.state.borrow().auto_expand
    }

    /// In auto-expand mode insertions overlapping or adjacent to the window
    /// grow it, so the window always contains the edited text; otherwise the
    /// window shifts aside like an ordinary position.
    pub fn set_auto_expand_mode(&self, enabled: bool) {
        self.state.borrow_mut().auto_expand = enabled;
    }

    // ---- line queries ----------------------------------------------------

    pub fn number_of_lines(&self) -> usize {
        self.state.borrow().tracker.number_of_lines()
    }

    pub fn line_of_offset(&self, offset: usize) -> Result<usize, DocumentError> {
        self.state.borrow().tracker.line_of_offset(offset)
    }

    pub fn line_offset(&self, line: usize) -> Result<usize, DocumentError> {
        self.state.borrow().tracker.line_offset(line)
    }

    pub fn line_length(&self, line: usize) -> Result<usize, DocumentError> {
        self.state.borrow().tracker.line_length(line)
    }

    pub fn line_information(&self, line: usize) -> Result<Region, DocumentError> {
        self.state.borrow().tracker.line_information(line)
    }

    // ---- partitioning ----------------------------------------------------

    /// Partitioning queries delegate to the master at the translated offset.
    pub fn content_type(
        &self,
        partitioning: &str,
        offset: usize,
    ) -> Result<String, DocumentError> {
        let window = self.check_local(offset, 0)?;
        self.master
            .borrow()
            .content_type(partitioning, window.offset + offset)
    }

    /// The containing partition, clipped to the window and translated into
    /// local offsets.
    pub fn partition(
        &self,
        partitioning: &str,
        offset: usize,
    ) -> Result<TypedRegion, DocumentError> {
        let window = self.check_local(offset, 0)?;
        let partition = self
            .master
            .borrow()
            .partition(partitioning, window.offset + offset)?;
        Ok(clip_to_window(&partition, &window))
    }

    pub fn compute_partitioning(
        &self,
        partitioning: &str,
        offset: usize,
        length: usize,
    ) -> Result<Vec<TypedRegion>, DocumentError> {
        let window = self.check_local(offset, length)?;
        let regions = self.master.borrow().compute_partitioning(
            partitioning,
            window.offset + offset,
            length,
        )?;
        Ok(regions
            .iter()
            .map(|region| clip_to_window(region, &window))
            .collect())
    }

    // ---- listeners -------------------------------------------------------

    pub fn add_document_listener(&self, listener: Rc<dyn ChildDocumentListener>) {
        let mut state = self.state.borrow_mut();
        if !state.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            state.listeners.push(listener);
        }
    }

    pub fn remove_document_listener(&self, listener: &Rc<dyn ChildDocumentListener>) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    // ---- internals -------------------------------------------------------

    fn check_local(&self, offset: usize, length: usize) -> Result<Region, DocumentError> {
        let window = self.window();
        let end = offset.checked_add(length).ok_or_else(|| {
            DocumentError::BadLocation(format!("range {offset}+{length} overflows"))
        })?;
        if end > window.length {
            return Err(DocumentError::BadLocation(format!(
                "range [{offset}, {end}) exceeds child document length {}",
                window.length
            )));
        }
        Ok(window)
    }

    fn refresh_tracker(&self) {
        let text = self.get();
        self.state.borrow_mut().tracker.set(&text);
    }
}

fn clip_to_window(region: &TypedRegion, window: &Region) -> TypedRegion {
    let start = region.offset.max(window.offset);
    let end = region.end().min(window.end());
    TypedRegion::new(
        start - window.offset,
        end.saturating_sub(start),
        region.content_type.clone(),
    )
}

// Keeps every child window in place across master edits, honoring each
// child's auto-expand mode. Windows are never deleted outright; a deletion
// swallowing a window collapses it to zero length at the edit offset.
struct ChildRangeUpdater {
    children: Rc<RefCell<Vec<ChildDocument>>>,
}

impl PositionUpdater for ChildRangeUpdater {
    fn update(&self, positions: &mut crate::position::PositionStore, event: &DocumentEvent) {
        for child in self.children.borrow().iter() {
            let state = child.state.borrow();
            let Some((offset, length)) = positions.range(state.range) else {
                continue;
            };
            let inserted = event.text.len();
            let expand = state.auto_expand
                && event.length == 0
                && event.offset >= offset
                && event.offset <= offset + length;
            let (offset, length) = if expand {
                (offset, length + inserted)
            } else {
                match adjust_range(offset, length, event.offset, event.length, inserted, false) {
                    Adjustment::Unchanged => (offset, length),
                    Adjustment::Moved { offset, length } => (offset, length),
                    Adjustment::Deleted => (event.offset, 0),
                }
            };
            positions.set_range(state.range, offset, length);
        }
    }
}

// Forwards master notifications to each child in child-local coordinates and
// keeps the child line trackers current.
struct ChildEventForwarder {
    children: Rc<RefCell<Vec<ChildDocument>>>,
}

impl DocumentListener for ChildEventForwarder {
    fn document_about_to_be_changed(&self, master: &mut Document, event: &DocumentEvent) {
        for child in self.children.borrow().iter() {
            let (range, listeners) = {
                let state = child.state.borrow();
                (state.range, state.listeners.clone())
            };
            let Some(position) = master.position(range) else {
                continue;
            };
            if let Some(local) = localize(event, position.offset, position.length) {
                for listener in &listeners {
                    listener.child_document_about_to_change(&local);
                }
            }
        }
    }

    fn document_changed(&self, master: &mut Document, event: &DocumentEvent) {
        for child in self.children.borrow().iter() {
            // the range position was already updated by the position pass
            let Some(position) = master.position(child.state.borrow().range) else {
                continue;
            };
            let window_text = master
                .get_range(position.offset, position.length)
                .unwrap_or_default();
            child.state.borrow_mut().tracker.set(&window_text);
            if let Some(local) = localize(event, position.offset, position.length) {
                let listeners = child.state.borrow().listeners.clone();
                for listener in listeners {
                    listener.child_document_changed(&local);
                }
            }
        }
    }
}

// Translates a master event into window-local coordinates; the removed span
// is clipped to the window. Events not touching the window map to nothing,
// and the inserted text only travels when its insertion point lies inside
// the window.
fn localize(
    event: &DocumentEvent,
    window_offset: usize,
    window_length: usize,
) -> Option<DocumentEvent> {
    let window_end = window_offset + window_length;
    let event_end = event.offset + event.length;
    if event_end < window_offset || event.offset > window_end {
        return None;
    }
    let start = event.offset.max(window_offset);
    let end = event_end.min(window_end);
    let text = if event.offset >= window_offset {
        event.text.clone()
    } else {
        String::new()
    };
    Some(DocumentEvent {
        offset: start - window_offset,
        length: end - start,
        text,
        modification_stamp: event.modification_stamp,
    })
}

struct MasterEntry {
    master: Rc<RefCell<Document>>,
    children: Rc<RefCell<Vec<ChildDocument>>>,
    updater: Rc<dyn PositionUpdater>,
    forwarder: Rc<dyn DocumentListener>,
}

/// Creates and frees child documents. The first child of a master installs
/// the shared range category, range updater and forwarding listener on it;
/// freeing the last child uninstalls them again.
#[derive(Default)]
pub struct ChildDocumentManager {
    masters: Vec<MasterEntry>,
}

impl ChildDocumentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child of `master` with an empty window at offset 0; grow it
    /// with [`ChildDocument::set_range`] or auto-expand mode.
    pub fn create_slave(
        &mut self,
        master: &Rc<RefCell<Document>>,
    ) -> Result<ChildDocument, DocumentError> {
        let index = match self
            .masters
            .iter()
            .position(|entry| Rc::ptr_eq(&entry.master, master))
        {
            Some(index) => index,
            None => {
                let children: Rc<RefCell<Vec<ChildDocument>>> =
                    Rc::new(RefCell::new(Vec::new()));
                let updater: Rc<dyn PositionUpdater> = Rc::new(ChildRangeUpdater {
                    children: children.clone(),
                });
                let forwarder: Rc<dyn DocumentListener> = Rc::new(ChildEventForwarder {
                    children: children.clone(),
                });
                {
                    let mut document = master.borrow_mut();
                    document.add_position_category(CHILD_RANGE_CATEGORY);
                    document.add_position_updater(updater.clone());
                    document.add_prenotified_document_listener(forwarder.clone());
                }
                self.masters.push(MasterEntry {
                    master: master.clone(),
                    children,
                    updater,
                    forwarder,
                });
                self.masters.len() - 1
            }
        };

        let entry = &self.masters[index];
        let range = entry
            .master
            .borrow_mut()
            .add_position_in(CHILD_RANGE_CATEGORY, 0, 0)?;
        let child = ChildDocument {
            master: entry.master.clone(),
            state: Rc::new(RefCell::new(ChildState {
                range,
                auto_expand: false,
                tracker: LineTracker::new(),
                listeners: Vec::new(),
            })),
        };
        entry.children.borrow_mut().push(child.clone());
        Ok(child)
    }

    /// Frees `child`: its backing range position leaves the master, and the
    /// shared category, updater and listener go with the master's last
    /// child.
    pub fn free_slave(&mut self, child: &ChildDocument) {
        let Some(index) = self
            .masters
            .iter()
            .position(|entry| Rc::ptr_eq(&entry.master, &child.master))
        else {
            return;
        };
        {
            let entry = &self.masters[index];
            entry
                .children
                .borrow_mut()
                .retain(|c| !Rc::ptr_eq(&c.state, &child.state));
            entry
                .master
                .borrow_mut()
                .remove_position(child.state.borrow().range);
        }
        if self.masters[index].children.borrow().is_empty() {
            let entry = self.masters.remove(index);
            let mut document = entry.master.borrow_mut();
            document.remove_position_updater(&entry.updater);
            document.remove_prenotified_document_listener(&entry.forwarder);
            let _ = document.remove_position_category(CHILD_RANGE_CATEGORY);
        }
    }
}
