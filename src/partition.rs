use crate::document::{Document, DocumentEvent};
use crate::region::TypedRegion;

/// Name of the partitioning every document answers for even when no
/// partitioner is registered.
pub const DEFAULT_PARTITIONING: &str = "default";

/// Content type reported where nothing more specific applies.
pub const DEFAULT_CONTENT_TYPE: &str = "text";

/// Computes and maintains one typed, gap-free region coverage of a
/// document's text.
///
/// A partitioner is registered on a document under a partitioning name and
/// from then on rides the edit pipeline: it sees every change before the
/// buffer mutates and recomputes its coverage afterwards. Regions reported
/// by `compute_partitioning` must be contiguous, non-overlapping and cover
/// the requested range.
pub trait DocumentPartitioner {
    /// Called when the partitioner is registered on `document`.
    fn connect(&mut self, _document: &Document) {}

    /// Called when the partitioner is removed from its document.
    fn disconnect(&mut self) {}

    /// The document is about to change; the buffer still holds the old text.
    fn document_about_to_be_changed(&mut self, _document: &Document, _event: &DocumentEvent) {}

    /// The buffer now holds the new text; recompute affected coverage.
    /// Returns true when the typed regions changed beyond the edited range
    /// itself, so the document can fire a partitioning-changed notification.
    fn document_changed(&mut self, document: &Document, event: &DocumentEvent) -> bool;

    /// Typed coverage of `[offset, offset + length)`, contiguous and
    /// gap-free.
    fn compute_partitioning(
        &self,
        document: &Document,
        offset: usize,
        length: usize,
    ) -> Vec<TypedRegion>;

    /// The partition containing `offset`.
    fn partition(&self, document: &Document, offset: usize) -> TypedRegion;

    /// The content type at `offset`.
    fn content_type(&self, document: &Document, offset: usize) -> String {
        self.partition(document, offset).content_type
    }

    /// Every content type this partitioner may report.
    fn legal_content_types(&self) -> Vec<String>;
}
