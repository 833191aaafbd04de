use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use crate::error::DocumentError;
use crate::line_tracker::{DELIMITERS, LineTracker};
use crate::partition::{DEFAULT_CONTENT_TYPE, DEFAULT_PARTITIONING, DocumentPartitioner};
use crate::position::{DEFAULT_CATEGORY, Position, PositionHandle, PositionStore};
use crate::region::{Region, TypedRegion};
use crate::store::{StringTextStore, TextStore};
use crate::updater::{DefaultPositionUpdater, PositionUpdater};

/// Describes one atomic text replacement. The removed text is not carried;
/// the post-change content is recoverable by querying the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEvent {
    pub offset: usize,
    /// Length of the removed text.
    pub length: usize,
    /// The inserted text.
    pub text: String,
    pub modification_stamp: u64,
}

/// Observes document changes. Callbacks receive the document itself so they
/// may call back into it: register further listeners, queue
/// post-notification replaces, or issue edits that recurse into the
/// pipeline. Callbacks must not mutate the buffer from
/// `document_about_to_be_changed`, where the event's offsets still describe
/// the old text.
pub trait DocumentListener {
    fn document_about_to_be_changed(&self, _document: &mut Document, _event: &DocumentEvent) {}
    fn document_changed(&self, _document: &mut Document, _event: &DocumentEvent) {}
}

/// Observes changes to a document's partitionings.
pub trait PartitioningListener {
    /// `changed` names every partitioning whose typed regions changed.
    fn document_partitioning_changed(&self, document: &mut Document, changed: &[String]);
}

/// A replace deferred until the running notification round has finished.
type PostReplace = Box<dyn FnOnce(&mut Document) -> Result<(), DocumentError>>;

// Listener notification is either live or suspended; while suspended only
// the most recent document event, together with its partitioning delta,
// survives for replay on resume.
enum NotificationState {
    Active,
    Suspended {
        depth: usize,
        pending: Option<(Vec<String>, DocumentEvent)>,
    },
}

/// The mutable text buffer at the core of the editor: one content store, one
/// line tracker, tracked positions, typed partitionings, and the
/// change-notification pipeline tying them together.
///
/// Everything is single-threaded and synchronous; the suspension and
/// queueing controls order work within one logical call stack, they are not
/// thread synchronization.
pub struct Document {
    store: Box<dyn TextStore>,
    tracker: LineTracker,
    positions: PositionStore,
    updaters: Vec<Rc<dyn PositionUpdater>>,
    partitioners: HashMap<String, Box<dyn DocumentPartitioner>>,
    prenotified_listeners: Vec<Rc<dyn DocumentListener>>,
    listeners: Vec<Rc<dyn DocumentListener>>,
    partitioning_listeners: Vec<Rc<dyn PartitioningListener>>,
    notification: NotificationState,
    post_replaces: Vec<PostReplace>,
    draining: bool,
    post_processing_stopped: usize,
    accepting_post_replaces: bool,
    modification_stamp: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document over the default string-backed store.
    pub fn new() -> Self {
        Self::with_store(Box::new(StringTextStore::new()))
    }

    /// A document over a caller-supplied store; the store's current content
    /// becomes the document's content.
    pub fn with_store(store: Box<dyn TextStore>) -> Self {
        let mut tracker = LineTracker::new();
        tracker.set(&store.get());
        Self {
            store,
            tracker,
            positions: PositionStore::new(),
            updaters: vec![Rc::new(DefaultPositionUpdater::new(DEFAULT_CATEGORY))],
            partitioners: HashMap::new(),
            prenotified_listeners: Vec::new(),
            listeners: Vec::new(),
            partitioning_listeners: Vec::new(),
            notification: NotificationState::Active,
            post_replaces: Vec::new(),
            draining: false,
            post_processing_stopped: 0,
            accepting_post_replaces: true,
            modification_stamp: 0,
        }
    }

    // ---- content queries -------------------------------------------------

    pub fn length(&self) -> usize {
        self.store.len()
    }

    pub fn get(&self) -> String {
        self.store.get()
    }

    pub fn get_range(&self, offset: usize, length: usize) -> Result<String, DocumentError> {
        self.check_range(offset, length)?;
        Ok(self.store.get_range(offset, length))
    }

    pub fn char_at(&self, offset: usize) -> Result<char, DocumentError> {
        if offset >= self.store.len() || !self.store.is_char_boundary(offset) {
            return Err(DocumentError::BadLocation(format!(
                "no character at offset {offset}"
            )));
        }
        Ok(self.store.char_at(offset))
    }

    /// Count bumped by every successful mutation; also carried on events.
    pub fn modification_stamp(&self) -> u64 {
        self.modification_stamp
    }

    // ---- line queries ----------------------------------------------------

    pub fn number_of_lines(&self) -> usize {
        self.tracker.number_of_lines()
    }

    pub fn line_of_offset(&self, offset: usize) -> Result<usize, DocumentError> {
        self.tracker.line_of_offset(offset)
    }

    pub fn line_offset(&self, line: usize) -> Result<usize, DocumentError> {
        self.tracker.line_offset(line)
    }

    pub fn line_length(&self, line: usize) -> Result<usize, DocumentError> {
        self.tracker.line_length(line)
    }

    /// Offset and delimiter-free length of `line`.
    pub fn line_information(&self, line: usize) -> Result<Region, DocumentError> {
        self.tracker.line_information(line)
    }

    pub fn line_delimiter(&self, line: usize) -> Result<Option<&'static str>, DocumentError> {
        self.tracker.line_delimiter(line)
    }

    pub fn compute_number_of_lines(&self, text: &str) -> usize {
        LineTracker::compute_number_of_lines(text)
    }

    pub fn legal_line_delimiters(&self) -> &'static [&'static str] {
        &DELIMITERS
    }

    // ---- mutation --------------------------------------------------------

    /// Replaces the entire content. Equivalent to a whole-document `replace`
    /// and always fires as a full-document event.
    pub fn set(&mut self, text: &str) {
        let length = self.store.len();
        self.do_replace(0, length, text);
    }

    /// Replaces `[offset, offset + length)` with `text`, running the full
    /// notification pipeline.
    pub fn replace(
        &mut self,
        offset: usize,
        length: usize,
        text: &str,
    ) -> Result<(), DocumentError> {
        self.check_range(offset, length)?;
        self.do_replace(offset, length, text);
        Ok(())
    }

    // Pipeline steps in contract order: build event, pre-change hooks and
    // listeners, store and tracker mutation, partition recomputation,
    // position updates, post-change notifications, deferred replace drain.
    fn do_replace(&mut self, offset: usize, length: usize, text: &str) {
        self.modification_stamp += 1;
        let event = DocumentEvent {
            offset,
            length,
            text: text.to_string(),
            modification_stamp: self.modification_stamp,
        };
        log::trace!(
            "replace at {offset}: -{length} +{} bytes (stamp {})",
            text.len(),
            event.modification_stamp
        );

        self.fire_document_about_to_be_changed(&event);

        self.store.replace(offset, length, text);
        if let Err(err) = self.tracker.replace(offset, length, text, self.store.as_ref()) {
            // the range was validated against the store, so the tracker has
            // diverged; rebuild it from the store
            log::warn!("line tracker out of sync, rebuilding: {err}");
            let content = self.store.get();
            self.tracker.set(&content);
        }

        let changed_partitionings = self.update_partitioners(&event);

        if self.positions.has_any() {
            let updaters = self.updaters.clone();
            for updater in updaters {
                updater.update(&mut self.positions, &event);
            }
        }

        self.fire_changed(changed_partitionings, event);
        self.drain_post_replaces();
    }

    fn fire_document_about_to_be_changed(&mut self, event: &DocumentEvent) {
        let mut partitioners = mem::take(&mut self.partitioners);
        for partitioner in partitioners.values_mut() {
            partitioner.document_about_to_be_changed(self, event);
        }
        self.partitioners = partitioners;

        for listener in self.prenotified_listeners.clone() {
            listener.document_about_to_be_changed(self, event);
        }
        for listener in self.listeners.clone() {
            listener.document_about_to_be_changed(self, event);
        }
    }

    fn update_partitioners(&mut self, event: &DocumentEvent) -> Vec<String> {
        let mut partitioners = mem::take(&mut self.partitioners);
        let mut changed = Vec::new();
        for (partitioning, partitioner) in partitioners.iter_mut() {
            if partitioner.document_changed(self, event) {
                changed.push(partitioning.clone());
            }
        }
        self.partitioners = partitioners;
        changed
    }

    fn fire_partitioning_changed(&mut self, changed: &[String]) {
        for listener in self.partitioning_listeners.clone() {
            listener.document_partitioning_changed(self, changed);
        }
    }

    // Fires the partitioning delta (if any) followed by the document-changed
    // notification, or defers both while notification is suspended.
    fn fire_changed(&mut self, changed_partitionings: Vec<String>, event: DocumentEvent) {
        if let NotificationState::Suspended { pending, .. } = &mut self.notification {
            // only the most recent event survives a suspended window;
            // earlier deferred events are discarded, not merged
            *pending = Some((changed_partitionings, event));
            return;
        }
        if !changed_partitionings.is_empty() {
            self.fire_partitioning_changed(&changed_partitionings);
        }
        for listener in self.prenotified_listeners.clone() {
            listener.document_changed(self, &event);
        }
        for listener in self.listeners.clone() {
            listener.document_changed(self, &event);
        }
    }

    // ---- listener management --------------------------------------------

    pub fn add_document_listener(&mut self, listener: Rc<dyn DocumentListener>) {
        if !self.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            self.listeners.push(listener);
        }
    }

    pub fn remove_document_listener(&mut self, listener: &Rc<dyn DocumentListener>) {
        self.listeners.retain(|l| !Rc::ptr_eq(l, listener));
    }

    /// Registers a listener notified ahead of the ordinary listeners, for
    /// adapters that must see changes before other consumers.
    pub fn add_prenotified_document_listener(&mut self, listener: Rc<dyn DocumentListener>) {
        if !self
            .prenotified_listeners
            .iter()
            .any(|l| Rc::ptr_eq(l, &listener))
        {
            self.prenotified_listeners.push(listener);
        }
    }

    pub fn remove_prenotified_document_listener(&mut self, listener: &Rc<dyn DocumentListener>) {
        self.prenotified_listeners
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    pub fn add_partitioning_listener(&mut self, listener: Rc<dyn PartitioningListener>) {
        if !self
            .partitioning_listeners
            .iter()
            .any(|l| Rc::ptr_eq(l, &listener))
        {
            self.partitioning_listeners.push(listener);
        }
    }

    pub fn remove_partitioning_listener(&mut self, listener: &Rc<dyn PartitioningListener>) {
        self.partitioning_listeners
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    // ---- notification suspension -----------------------------------------

    /// Suspends document-changed notification. Calls nest; while suspended
    /// only the most recent event is retained.
    pub fn stop_listener_notification(&mut self) {
        if let NotificationState::Suspended { depth, .. } = &mut self.notification {
            *depth += 1;
        } else {
            self.notification = NotificationState::Suspended {
                depth: 1,
                pending: None,
            };
        }
    }

    /// Unwinds one suspension level; on reaching zero, replays the single
    /// deferred event, if any.
    pub fn resume_listener_notification(&mut self) {
        let resumed = match &mut self.notification {
            NotificationState::Suspended { depth, pending } => {
                *depth -= 1;
                if *depth == 0 {
                    Some(pending.take())
                } else {
                    None
                }
            }
            NotificationState::Active => None,
        };
        if let Some(deferred) = resumed {
            self.notification = NotificationState::Active;
            if let Some((changed_partitionings, event)) = deferred {
                self.fire_changed(changed_partitionings, event);
                self.drain_post_replaces();
            }
        }
    }

    // ---- post-notification replaces --------------------------------------

    /// Queues a replace to run once the current notification round is over.
    /// Returns false when registration is currently disabled (the operation
    /// is dropped).
    pub fn register_post_notification_replace<F>(&mut self, operation: F) -> bool
    where
        F: FnOnce(&mut Document) -> Result<(), DocumentError> + 'static,
    {
        if !self.accepting_post_replaces {
            log::debug!("post-notification replace dropped: registration disabled");
            return false;
        }
        self.post_replaces.push(Box::new(operation));
        true
    }

    /// Suspends the draining of queued post-notification replaces. Calls
    /// nest.
    pub fn stop_post_notification_processing(&mut self) {
        self.post_processing_stopped += 1;
    }

    pub fn resume_post_notification_processing(&mut self) {
        if self.post_processing_stopped > 0 {
            self.post_processing_stopped -= 1;
            if self.post_processing_stopped == 0 {
                self.drain_post_replaces();
            }
        }
    }

    pub fn accept_post_notification_replaces(&mut self) {
        self.accepting_post_replaces = true;
    }

    pub fn ignore_post_notification_replaces(&mut self) {
        self.accepting_post_replaces = false;
    }

    // Runs queued replaces; operations queued while draining are appended
    // and drained before control returns. The `draining` flag keeps nested
    // pipeline runs from re-entering the drain.
    fn drain_post_replaces(&mut self) {
        if self.draining || self.post_processing_stopped > 0 {
            return;
        }
        self.draining = true;
        while !self.post_replaces.is_empty() {
            let queued = mem::take(&mut self.post_replaces);
            for operation in queued {
                if let Err(err) = operation(self) {
                    log::warn!("post-notification replace failed: {err}");
                }
            }
        }
        self.draining = false;
    }

    // ---- positions -------------------------------------------------------

    /// Adds `category` if not yet present.
    pub fn add_position_category(&mut self, category: &str) {
        self.positions.add_category(category);
    }

    pub fn remove_position_category(&mut self, category: &str) -> Result<(), DocumentError> {
        self.positions.remove_category(category)
    }

    pub fn contains_position_category(&self, category: &str) -> bool {
        self.positions.contains_category(category)
    }

    pub fn position_categories(&self) -> Vec<String> {
        self.positions.categories()
    }

    /// Adds a position to the default category.
    pub fn add_position(
        &mut self,
        offset: usize,
        length: usize,
    ) -> Result<PositionHandle, DocumentError> {
        self.add_position_in(DEFAULT_CATEGORY, offset, length)
    }

    pub fn add_position_in(
        &mut self,
        category: &str,
        offset: usize,
        length: usize,
    ) -> Result<PositionHandle, DocumentError> {
        self.check_bounds(offset, length)?;
        self.positions.add(category, offset, length)
    }

    /// Removes the position behind `handle` from its category; stale handles
    /// are ignored.
    pub fn remove_position(&mut self, handle: PositionHandle) {
        self.positions.remove(handle);
    }

    pub fn position(&self, handle: PositionHandle) -> Option<Position> {
        self.positions.position(handle)
    }

    /// Rewrites a position's range; fails when the new range lies outside
    /// the document.
    pub fn set_position_range(
        &mut self,
        handle: PositionHandle,
        offset: usize,
        length: usize,
    ) -> Result<(), DocumentError> {
        self.check_bounds(offset, length)?;
        self.positions.set_range(handle, offset, length);
        Ok(())
    }

    /// Ordered snapshot of the handles in `category`. The positions behind
    /// the handles stay live; they are shared, not copied.
    pub fn positions_in(&self, category: &str) -> Result<Vec<PositionHandle>, DocumentError> {
        self.positions.handles_in(category)
    }

    // ---- position updaters -----------------------------------------------

    /// Appends an updater to the chain; adding the same updater twice has no
    /// effect.
    pub fn add_position_updater(&mut self, updater: Rc<dyn PositionUpdater>) {
        if !self.updaters.iter().any(|u| Rc::ptr_eq(u, &updater)) {
            self.updaters.push(updater);
        }
    }

    pub fn insert_position_updater(&mut self, updater: Rc<dyn PositionUpdater>, index: usize) {
        if self.updaters.iter().any(|u| Rc::ptr_eq(u, &updater)) {
            return;
        }
        let index = index.min(self.updaters.len());
        self.updaters.insert(index, updater);
    }

    pub fn remove_position_updater(&mut self, updater: &Rc<dyn PositionUpdater>) {
        self.updaters.retain(|u| !Rc::ptr_eq(u, updater));
    }

    // ---- partitionings ---------------------------------------------------

    /// Installs or clears the partitioner of `partitioning` and fires a
    /// full-document partitioning-changed notification.
    pub fn set_document_partitioner(
        &mut self,
        partitioning: &str,
        partitioner: Option<Box<dyn DocumentPartitioner>>,
    ) {
        match partitioner {
            Some(mut partitioner) => {
                partitioner.connect(self);
                self.partitioners.insert(partitioning.to_string(), partitioner);
            }
            None => {
                if let Some(mut removed) = self.partitioners.remove(partitioning) {
                    removed.disconnect();
                }
            }
        }
        let changed = vec![partitioning.to_string()];
        self.fire_partitioning_changed(&changed);
    }

    pub fn document_partitioner(&self, partitioning: &str) -> Option<&dyn DocumentPartitioner> {
        self.partitioners.get(partitioning).map(|p| p.as_ref())
    }

    pub fn partitionings(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitioners.keys().cloned().collect();
        names.sort();
        names
    }

    /// Content type at `offset` under `partitioning`. The default
    /// partitioning answers with the default content type when no
    /// partitioner is registered; any other unregistered name fails.
    pub fn content_type(
        &self,
        partitioning: &str,
        offset: usize,
    ) -> Result<String, DocumentError> {
        self.check_bounds(offset, 0)?;
        if let Some(partitioner) = self.partitioners.get(partitioning) {
            return Ok(partitioner.content_type(self, offset));
        }
        if partitioning == DEFAULT_PARTITIONING {
            return Ok(DEFAULT_CONTENT_TYPE.to_string());
        }
        Err(DocumentError::BadPartitioning(partitioning.to_string()))
    }

    /// The partition containing `offset` under `partitioning`.
    pub fn partition(
        &self,
        partitioning: &str,
        offset: usize,
    ) -> Result<TypedRegion, DocumentError> {
        self.check_bounds(offset, 0)?;
        if let Some(partitioner) = self.partitioners.get(partitioning) {
            return Ok(partitioner.partition(self, offset));
        }
        if partitioning == DEFAULT_PARTITIONING {
            return Ok(TypedRegion::new(0, self.length(), DEFAULT_CONTENT_TYPE));
        }
        Err(DocumentError::BadPartitioning(partitioning.to_string()))
    }

    /// Typed coverage of `[offset, offset + length)` under `partitioning`.
    pub fn compute_partitioning(
        &self,
        partitioning: &str,
        offset: usize,
        length: usize,
    ) -> Result<Vec<TypedRegion>, DocumentError> {
        self.check_bounds(offset, length)?;
        if let Some(partitioner) = self.partitioners.get(partitioning) {
            return Ok(partitioner.compute_partitioning(self, offset, length));
        }
        if partitioning == DEFAULT_PARTITIONING {
            return Ok(vec![TypedRegion::new(offset, length, DEFAULT_CONTENT_TYPE)]);
        }
        Err(DocumentError::BadPartitioning(partitioning.to_string()))
    }

    // ---- search ----------------------------------------------------------

    /// Stateless literal search. Unlike the stateful find/replace adapter it
    /// has no state to recover, so every failure is reported as no match.
    pub fn search(
        &self,
        start_offset: usize,
        find_string: &str,
        forward: bool,
        case_sensitive: bool,
        whole_word: bool,
    ) -> Option<Region> {
        crate::find_replace::search_document(
            self,
            start_offset,
            find_string,
            forward,
            case_sensitive,
            whole_word,
        )
    }

    // ---- validation ------------------------------------------------------

    fn check_bounds(&self, offset: usize, length: usize) -> Result<(), DocumentError> {
        let end = offset.checked_add(length).ok_or_else(|| {
            DocumentError::BadLocation(format!("range {offset}+{length} overflows"))
        })?;
        if end > self.store.len() {
            return Err(DocumentError::BadLocation(format!(
                "range [{offset}, {end}) exceeds document length {}",
                self.store.len()
            )));
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<(), DocumentError> {
        self.check_bounds(offset, length)?;
        if !self.store.is_char_boundary(offset) || !self.store.is_char_boundary(offset + length) {
            return Err(DocumentError::BadLocation(format!(
                "range [{offset}, {}) is not aligned to character boundaries",
                offset + length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        events: RefCell<Vec<DocumentEvent>>,
    }

    impl Recorder {
        fn new(label: &'static str, log: Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self {
                label,
                log,
                events: RefCell::new(Vec::new()),
            })
        }
    }

    impl DocumentListener for Recorder {
        fn document_about_to_be_changed(&self, _document: &mut Document, _event: &DocumentEvent) {
            self.log.borrow_mut().push(format!("{}:about", self.label));
        }

        fn document_changed(&self, _document: &mut Document, event: &DocumentEvent) {
            self.log.borrow_mut().push(format!("{}:changed", self.label));
            self.events.borrow_mut().push(event.clone());
        }
    }

    struct TestPartitioner {
        log: Rc<RefCell<Vec<String>>>,
        report_changed: bool,
    }

    impl DocumentPartitioner for TestPartitioner {
        fn document_about_to_be_changed(&mut self, _document: &Document, _event: &DocumentEvent) {
            self.log.borrow_mut().push("partitioner:about".to_string());
        }

        fn document_changed(&mut self, _document: &Document, _event: &DocumentEvent) -> bool {
            self.log.borrow_mut().push("partitioner:changed".to_string());
            self.report_changed
        }

        fn compute_partitioning(
            &self,
            _document: &Document,
            offset: usize,
            length: usize,
        ) -> Vec<TypedRegion> {
            vec![TypedRegion::new(offset, length, "test")]
        }

        fn partition(&self, document: &Document, _offset: usize) -> TypedRegion {
            TypedRegion::new(0, document.length(), "test")
        }

        fn legal_content_types(&self) -> Vec<String> {
            vec!["test".to_string()]
        }
    }

    struct PartitioningRecorder {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl PartitioningListener for PartitioningRecorder {
        fn document_partitioning_changed(&self, _document: &mut Document, changed: &[String]) {
            self.log
                .borrow_mut()
                .push(format!("partitioning:{}", changed.join(",")));
        }
    }

    #[test]
    fn test_replace_splices_content() {
        let mut document = Document::new();
        document.set("hello world");
        document.replace(6, 5, "there").unwrap();
        assert_eq!(document.get(), "hello there");
        assert_eq!(document.get_range(6, 5).unwrap(), "there");
        assert_eq!(document.char_at(0).unwrap(), 'h');
    }

    #[test]
    fn test_replace_matches_string_splice() {
        let mut document = Document::new();
        let mut model = String::new();
        let edits = [
            (0, 0, "line one\nline two\nline three\n"),
            (5, 3, "1"),
            (0, 0, "# "),
            (10, 12, ""),
            (3, 0, "mid\nway"),
        ];
        for (offset, length, text) in edits {
            document.replace(offset, length, text).unwrap();
            model.replace_range(offset..offset + length, text);
            assert_eq!(document.get(), model);
            // line table stays consistent with the content
            let mut sum = 0;
            for line in 0..document.number_of_lines() {
                assert_eq!(document.line_offset(line).unwrap(), sum);
                sum += document.line_length(line).unwrap();
            }
            assert_eq!(sum, document.length());
        }
    }

    #[test]
    fn test_set_round_trip() {
        let mut document = Document::new();
        let text = "alpha\nbeta\r\ngamma";
        document.set(text);
        assert_eq!(document.get(), text);
        assert_eq!(
            document.number_of_lines(),
            document.compute_number_of_lines(text)
        );
    }

    #[test]
    fn test_insert_updates_line_offsets() {
        // "abc\ndef\n" + "X" at offset 1 -> "aXbc\ndef\n"
        let mut document = Document::new();
        document.set("abc\ndef\n");
        document.replace(1, 0, "X").unwrap();
        assert_eq!(document.get(), "aXbc\ndef\n");
        assert_eq!(document.line_offset(1).unwrap(), 5);
    }

    #[test]
    fn test_bad_locations_are_rejected() {
        let mut document = Document::new();
        document.set("abc");
        assert!(matches!(
            document.replace(2, 5, "x"),
            Err(DocumentError::BadLocation(_))
        ));
        assert!(document.get_range(0, 4).is_err());
        assert!(document.char_at(3).is_err());
        document.set("é");
        // offset 1 splits the two-byte character
        assert!(document.replace(1, 0, "x").is_err());
        assert!(document.char_at(1).is_err());
    }

    #[test]
    fn test_modification_stamp_advances() {
        let mut document = Document::new();
        let initial = document.modification_stamp();
        document.set("a");
        document.replace(0, 0, "b").unwrap();
        assert_eq!(document.modification_stamp(), initial + 2);
    }

    #[test]
    fn test_listener_order_pre_then_ordinary() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pre = Recorder::new("pre", log.clone());
        let ordinary = Recorder::new("ord", log.clone());

        let mut document = Document::new();
        document.add_prenotified_document_listener(pre);
        document.add_document_listener(ordinary);
        document.replace(0, 0, "x").unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["pre:about", "ord:about", "pre:changed", "ord:changed"]
        );
    }

    #[test]
    fn test_duplicate_listener_not_added_twice() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = Recorder::new("l", log.clone());
        let mut document = Document::new();
        document.add_document_listener(listener.clone());
        document.add_document_listener(listener.clone());
        document.replace(0, 0, "x").unwrap();
        assert_eq!(listener.events.borrow().len(), 1);
    }

    #[test]
    fn test_listener_can_remove_itself_during_notification() {
        struct SelfRemover {
            this: RefCell<Option<Rc<dyn DocumentListener>>>,
            hits: Cell<usize>,
        }
        impl DocumentListener for SelfRemover {
            fn document_changed(&self, document: &mut Document, _event: &DocumentEvent) {
                self.hits.set(self.hits.get() + 1);
                if let Some(this) = self.this.borrow_mut().take() {
                    document.remove_document_listener(&this);
                }
            }
        }

        let remover = Rc::new(SelfRemover {
            this: RefCell::new(None),
            hits: Cell::new(0),
        });
        let as_listener: Rc<dyn DocumentListener> = remover.clone();
        *remover.this.borrow_mut() = Some(as_listener.clone());

        let mut document = Document::new();
        document.add_document_listener(as_listener);
        document.replace(0, 0, "a").unwrap();
        document.replace(0, 0, "b").unwrap();
        assert_eq!(remover.hits.get(), 1);
    }

    #[test]
    fn test_suspension_keeps_only_most_recent_event() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = Recorder::new("l", log.clone());
        let mut document = Document::new();
        document.add_document_listener(listener.clone());

        document.stop_listener_notification();
        document.replace(0, 0, "first").unwrap();
        document.replace(0, 0, "second").unwrap();
        assert!(listener.events.borrow().is_empty());
        document.resume_listener_notification();

        // the coalescing contract: earlier events of a suspended window are
        // discarded outright, not merged into the replayed one
        let events = listener.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "second");
    }

    #[test]
    fn test_suspension_defers_partitioning_delta() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut document = Document::new();
        document.set_document_partitioner(
            "syntax",
            Some(Box::new(TestPartitioner {
                log: log.clone(),
                report_changed: true,
            })),
        );
        document.add_partitioning_listener(Rc::new(PartitioningRecorder { log: log.clone() }));
        let listener = Recorder::new("doc", log.clone());
        document.add_document_listener(listener);
        log.borrow_mut().clear();

        document.stop_listener_notification();
        document.replace(0, 0, "x").unwrap();
        // the recompute ran, but neither notification went out
        assert_eq!(
            *log.borrow(),
            vec!["partitioner:about", "doc:about", "partitioner:changed"]
        );
        document.resume_listener_notification();
        assert_eq!(
            *log.borrow(),
            vec![
                "partitioner:about",
                "doc:about",
                "partitioner:changed",
                "partitioning:syntax",
                "doc:changed"
            ]
        );
    }

    #[test]
    fn test_suspension_nests() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener = Recorder::new("l", log.clone());
        let mut document = Document::new();
        document.add_document_listener(listener.clone());

        document.stop_listener_notification();
        document.stop_listener_notification();
        document.replace(0, 0, "x").unwrap();
        document.resume_listener_notification();
        assert!(listener.events.borrow().is_empty());
        document.resume_listener_notification();
        assert_eq!(listener.events.borrow().len(), 1);
    }

    #[test]
    fn test_post_notification_replace_runs_after_round() {
        struct Appender {
            registered: Cell<bool>,
        }
        impl DocumentListener for Appender {
            fn document_changed(&self, document: &mut Document, _event: &DocumentEvent) {
                if self.registered.get() {
                    return;
                }
                self.registered.set(true);
                let accepted = document.register_post_notification_replace(|document| {
                    let length = document.length();
                    document.replace(length, 0, "!")
                });
                assert!(accepted);
            }
        }

        let mut document = Document::new();
        document.add_document_listener(Rc::new(Appender {
            registered: Cell::new(false),
        }));
        document.replace(0, 0, "hi").unwrap();
        assert_eq!(document.get(), "hi!");
    }

    #[test]
    fn test_replaces_queued_during_drain_also_run() {
        let mut document = Document::new();
        document.set("x");
        document.register_post_notification_replace(|document| {
            document.register_post_notification_replace(|document| {
                let length = document.length();
                document.replace(length, 0, "c")
            });
            let length = document.length();
            document.replace(length, 0, "b")
        });
        document.replace(0, 0, "a").unwrap();
        assert_eq!(document.get(), "axbc");
    }

    #[test]
    fn test_stopped_post_processing_defers_drain() {
        let mut document = Document::new();
        document.stop_post_notification_processing();
        document.register_post_notification_replace(|document| document.replace(0, 0, "z"));
        document.replace(0, 0, "a").unwrap();
        assert_eq!(document.get(), "a");
        document.resume_post_notification_processing();
        assert_eq!(document.get(), "za");
    }

    #[test]
    fn test_ignored_registrations_are_dropped() {
        let mut document = Document::new();
        document.ignore_post_notification_replaces();
        let accepted =
            document.register_post_notification_replace(|document| document.replace(0, 0, "z"));
        assert!(!accepted);
        document.replace(0, 0, "a").unwrap();
        assert_eq!(document.get(), "a");
        document.accept_post_notification_replaces();
        assert!(document.register_post_notification_replace(|_| Ok(())));
    }

    #[test]
    fn test_position_tracks_insertion() {
        // empty document, position (0,0), insert "hi" -> position (0,2)
        let mut document = Document::new();
        let handle = document.add_position(0, 0).unwrap();
        document.replace(0, 0, "hi").unwrap();
        let position = document.position(handle).unwrap();
        assert_eq!((position.offset, position.length), (0, 2));
    }

    #[test]
    fn test_position_outside_edit_is_untouched() {
        let mut document = Document::new();
        document.set("0123456789");
        let handle = document.add_position(1, 2).unwrap();
        document.replace(6, 2, "xyz").unwrap();
        let position = document.position(handle).unwrap();
        assert_eq!((position.offset, position.length), (1, 2));
    }

    #[test]
    fn test_consumed_position_leaves_category() {
        let mut document = Document::new();
        document.set("0123456789");
        let handle = document.add_position(3, 4).unwrap();
        document.replace(2, 6, "").unwrap();
        assert!(document.positions_in(DEFAULT_CATEGORY).unwrap().is_empty());
        assert!(document.position(handle).unwrap().deleted);
    }

    #[test]
    fn test_custom_category_needs_its_own_updater() {
        let mut document = Document::new();
        document.set("abcdef");
        document.add_position_category("markers");
        let handle = document.add_position_in("markers", 3, 1).unwrap();
        // without an updater the category is left alone
        document.replace(0, 0, "xx").unwrap();
        assert_eq!(document.position(handle).unwrap().offset, 3);

        document.add_position_updater(Rc::new(DefaultPositionUpdater::new("markers")));
        document.replace(0, 0, "yy").unwrap();
        assert_eq!(document.position(handle).unwrap().offset, 5);
    }

    #[test]
    fn test_adding_updater_twice_has_no_duplicate_effect() {
        let mut document = Document::new();
        document.set("abcdef");
        document.add_position_category("markers");
        let handle = document.add_position_in("markers", 3, 1).unwrap();

        let updater: Rc<dyn PositionUpdater> =
            Rc::new(DefaultPositionUpdater::new("markers"));
        document.add_position_updater(updater.clone());
        document.add_position_updater(updater.clone());

        document.replace(0, 0, "zz").unwrap();
        // a duplicate registration would have shifted the position twice
        assert_eq!(document.position(handle).unwrap().offset, 5);

        document.remove_position_updater(&updater);
        document.replace(0, 0, "zz").unwrap();
        assert_eq!(document.position(handle).unwrap().offset, 5);
    }

    #[test]
    fn test_updater_chain_runs_in_insertion_order() {
        struct Tagger {
            label: &'static str,
            log: Rc<RefCell<Vec<&'static str>>>,
        }
        impl PositionUpdater for Tagger {
            fn update(&self, _positions: &mut PositionStore, _event: &DocumentEvent) {
                self.log.borrow_mut().push(self.label);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut document = Document::new();
        // updaters only run while some category holds a position
        document.add_position(0, 0).unwrap();
        document.add_position_updater(Rc::new(Tagger {
            label: "appended",
            log: log.clone(),
        }));
        document.insert_position_updater(
            Rc::new(Tagger {
                label: "inserted",
                log: log.clone(),
            }),
            0,
        );
        document.replace(0, 0, "x").unwrap();
        assert_eq!(*log.borrow(), vec!["inserted", "appended"]);
    }

    #[test]
    fn test_position_category_errors() {
        let mut document = Document::new();
        assert!(matches!(
            document.add_position_in("nope", 0, 0),
            Err(DocumentError::BadPositionCategory(_))
        ));
        assert!(document.remove_position_category("nope").is_err());
        assert!(matches!(
            document.add_position(1, 0),
            Err(DocumentError::BadLocation(_))
        ));
    }

    #[test]
    fn test_default_partitioning_fallback() {
        let mut document = Document::new();
        document.set("abc");
        assert_eq!(
            document.content_type(DEFAULT_PARTITIONING, 1).unwrap(),
            DEFAULT_CONTENT_TYPE
        );
        let partition = document.partition(DEFAULT_PARTITIONING, 0).unwrap();
        assert_eq!((partition.offset, partition.length), (0, 3));
        let regions = document
            .compute_partitioning(DEFAULT_PARTITIONING, 1, 2)
            .unwrap();
        assert_eq!(regions, vec![TypedRegion::new(1, 2, DEFAULT_CONTENT_TYPE)]);
        assert!(matches!(
            document.content_type("syntax", 0),
            Err(DocumentError::BadPartitioning(_))
        ));
    }

    #[test]
    fn test_partitioner_rides_the_pipeline() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut document = Document::new();
        document.add_partitioning_listener(Rc::new(PartitioningRecorder { log: log.clone() }));
        document.set_document_partitioner(
            "syntax",
            Some(Box::new(TestPartitioner {
                log: log.clone(),
                report_changed: true,
            })),
        );
        // registration fires a partitioning-changed notification
        assert_eq!(*log.borrow(), vec!["partitioning:syntax"]);
        log.borrow_mut().clear();

        let listener = Recorder::new("doc", log.clone());
        document.add_document_listener(listener);
        document.replace(0, 0, "fn").unwrap();

        // about-hook before mutation, recompute after, partitioning delta
        // notification ahead of document-changed
        assert_eq!(
            *log.borrow(),
            vec![
                "partitioner:about",
                "doc:about",
                "partitioner:changed",
                "partitioning:syntax",
                "doc:changed"
            ]
        );

        assert_eq!(document.content_type("syntax", 0).unwrap(), "test");
        document.set_document_partitioner("syntax", None);
        assert!(document.content_type("syntax", 0).is_err());
    }

    #[test]
    fn test_quiet_partitioner_fires_no_delta() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut document = Document::new();
        document.set_document_partitioner(
            "syntax",
            Some(Box::new(TestPartitioner {
                log: log.clone(),
                report_changed: false,
            })),
        );
        document.add_partitioning_listener(Rc::new(PartitioningRecorder { log: log.clone() }));
        log.borrow_mut().clear();
        document.replace(0, 0, "x").unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["partitioner:about", "partitioner:changed"]
        );
    }

    #[test]
    fn test_search_convenience_downgrades_failures() {
        let mut document = Document::new();
        document.set("foo bar foo");
        assert_eq!(document.search(0, "foo", true, true, false), Some(Region::new(0, 3)));
        assert_eq!(document.search(1, "foo", true, true, false), Some(Region::new(8, 3)));
        assert_eq!(document.search(11, "foo", false, true, false), Some(Region::new(8, 3)));
        assert_eq!(document.search(0, "baz", true, true, false), None);
        // out-of-range start is no match, not an error
        assert_eq!(document.search(99, "foo", true, true, false), None);
    }

    #[test]
    fn test_piece_table_backed_document() {
        use crate::store::PieceTableStore;
        let mut document =
            Document::with_store(Box::new(PieceTableStore::from_text("one\ntwo")));
        assert_eq!(document.number_of_lines(), 2);
        document.replace(3, 1, " + ").unwrap();
        assert_eq!(document.get(), "one + two");
        assert_eq!(document.number_of_lines(), 1);
    }
}
