//! In-memory paragraph/run model for report documents.
//!
//! The document assembly collaborator produces this model; the trim engine
//! consumes it. Rendering to a concrete file format happens outside this
//! crate. Every formatting field listed here must survive a paragraph copy.

use serde::{Deserialize, Serialize};

/// A contiguous run of text sharing character-level formatting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    /// Font size in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Paragraph-level formatting. Distances in points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_indent: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_indent: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_line_indent: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_before: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_after: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f32>,
    #[serde(default)]
    pub keep_with_next: bool,
    #[serde(default)]
    pub keep_together: bool,
    #[serde(default)]
    pub alignment: Alignment,
}

/// One paragraph: ordered runs, paragraph formatting, and an optional named
/// style reference carried over verbatim on copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
    #[serde(default)]
    pub format: ParagraphFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Paragraph {
    /// An unformatted single-run paragraph.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::plain(text)],
            ..Self::default()
        }
    }

    /// Concatenated run text.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Whitespace-only paragraphs are blank.
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// An ordered sequence of paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub paragraphs: Vec<Paragraph>,
}

impl ReportDocument {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self { paragraphs }
    }

    /// Build a document of plain paragraphs from raw lines.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        Self {
            paragraphs: lines.iter().map(|l| Paragraph::plain(l.as_ref())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Plain text of every paragraph, for assertions and debugging.
    pub fn lines(&self) -> Vec<String> {
        self.paragraphs.iter().map(Paragraph::text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_text_concatenates_runs() {
        let p = Paragraph {
            runs: vec![TextRun::plain("Hello "), TextRun::plain("world")],
            ..Paragraph::default()
        };
        assert_eq!(p.text(), "Hello world");
        assert!(!p.is_blank());
        assert!(Paragraph::plain("   ").is_blank());
    }

    #[test]
    fn document_roundtrip_preserves_formatting() {
        let para = Paragraph {
            runs: vec![TextRun {
                text: "Headline".into(),
                bold: true,
                font: Some("PMingLiU".into()),
                size: Some(14.0),
                ..TextRun::default()
            }],
            format: ParagraphFormat {
                first_line_indent: Some(24.0),
                space_after: Some(6.0),
                keep_with_next: true,
                alignment: Alignment::Center,
                ..ParagraphFormat::default()
            },
            style: Some("Heading2".into()),
        };
        let doc = ReportDocument::new(vec![para.clone()]);

        let json = serde_json::to_string(&doc).expect("serialize");
        let parsed: ReportDocument = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.paragraphs[0], para);
    }
}
