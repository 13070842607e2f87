//! Report document model and the title-anchored trim engine.
//!
//! A [`ReportDocument`] is the in-memory paragraph/run form of a generated
//! report. [`trim`] extracts the curated subset: per selected title, the
//! title paragraph, its metadata line, and the leading body paragraphs, in
//! document order.

pub mod document;
pub mod trim;

pub use document::{Alignment, Paragraph, ParagraphFormat, ReportDocument, TextRun};
pub use trim::{TrimOptions, trim};
