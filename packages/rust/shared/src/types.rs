//! Core domain types for the clipdesk curation pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A string key partitioning articles into logical buckets — one per
/// workflow instance, or ad-hoc sub-buckets for multi-location grouping.
pub type CategoryLabel = String;

/// Checkpoint file names, shared by the session state machine and the CLI.
pub mod checkpoint_files {
    pub const PREVIEW_ARTICLES: &str = "preview_articles.json";
    pub const USER_FINAL_LIST: &str = "user_final_list.json";
    pub const FULL_SCRAPED_ARTICLES: &str = "full_scraped_articles.json";
    pub const FINAL_REPORT: &str = "final_report.docx";
    pub const FINAL_REPORT_TRIMMED: &str = "final_report_trimmed.docx";
    pub const MISSING_ROUND1: &str = "missing_articles_round1.json";
    pub const MISSING_ROUND2: &str = "missing_articles_round2.json";
}

// ---------------------------------------------------------------------------
// PreviewItem
// ---------------------------------------------------------------------------

/// Relevance metadata attached by the external AI scoring collaborator.
///
/// Opaque to the pipeline except for `location`, which is used as an
/// optional grouping sub-bucket during preview ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    /// Relevance score in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Detected topic label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Detected location, used for multi-location grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A scraped candidate article surfaced before full-text retrieval.
///
/// Created by the external scraper collaborator; immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewItem {
    /// Headline as shown in the portal's result list.
    pub title: String,
    /// Short preview text. The first line sometimes duplicates the title;
    /// the second line may hold the source/date metadata.
    pub hover_text: String,
    /// Raw HTML of the preview tooltip — source of the news identifier.
    pub hover_html: String,
    /// Portal news identifier extracted from `hover_html`, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_id: Option<String>,
    /// Article URL, when the portal exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Stable ordinal from the scrape batch.
    pub original_index: usize,
    /// Which search query preset produced this item.
    pub keyword_preset: String,
    /// Optional period marker, e.g. "previous day".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_tag: Option<String>,
    /// Relevance analysis from the external AI collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<AiAnalysis>,
    /// Display-ready metadata line, derived from `hover_text` at ingestion.
    #[serde(default)]
    pub formatted_metadata: String,
}

// ---------------------------------------------------------------------------
// ScrapedArticle
// ---------------------------------------------------------------------------

/// Full-text record produced by final retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedArticle {
    /// Portal news identifier, when resolvable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_id: Option<String>,
    /// Article URL, when resolvable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Headline.
    pub title: String,
    /// Full body text.
    pub content: String,
    /// Source/date metadata line.
    pub metadata_line: String,
    /// SHA-256 of `content`, for audit and change detection.
    #[serde(default)]
    pub content_hash: String,
}

impl ScrapedArticle {
    /// Build an article, computing the content digest.
    pub fn new(
        news_id: Option<String>,
        url: Option<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        metadata_line: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let content_hash = Self::digest(&content);
        Self {
            news_id,
            url,
            title: title.into(),
            content,
            metadata_line: metadata_line.into(),
            content_hash,
        }
    }

    /// SHA-256 hex digest of a content string.
    pub fn digest(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// GroupedPool / CurationSelection
// ---------------------------------------------------------------------------

/// One category bucket: a label and its ordered items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryList {
    pub label: CategoryLabel,
    pub items: Vec<PreviewItem>,
}

/// An ordered mapping from [`CategoryLabel`] to an ordered sequence of
/// [`PreviewItem`]. Category insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedPool {
    pub categories: Vec<CategoryList>,
}

/// The human-approved, ordered final list per category.
///
/// Structurally identical to [`GroupedPool`]; the session state machine
/// enforces the selection-uniqueness invariant (one category per identity).
pub type CurationSelection = GroupedPool;

impl GroupedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items for a category, if it exists.
    pub fn get(&self, label: &str) -> Option<&Vec<PreviewItem>> {
        self.categories
            .iter()
            .find(|c| c.label == label)
            .map(|c| &c.items)
    }

    /// Mutable items for a category, if it exists.
    pub fn get_mut(&mut self, label: &str) -> Option<&mut Vec<PreviewItem>> {
        self.categories
            .iter_mut()
            .find(|c| c.label == label)
            .map(|c| &mut c.items)
    }

    /// Items for a category, creating the category at the end if absent.
    pub fn ensure(&mut self, label: &str) -> &mut Vec<PreviewItem> {
        if let Some(pos) = self.categories.iter().position(|c| c.label == label) {
            return &mut self.categories[pos].items;
        }
        self.categories.push(CategoryList {
            label: label.to_string(),
            items: Vec::new(),
        });
        &mut self
            .categories
            .last_mut()
            .expect("just pushed")
            .items
    }

    /// Category labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.label.as_str())
    }

    /// Total item count across all categories.
    pub fn total_len(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    /// True when no category holds any item.
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// All items flattened in category order, then item order.
    pub fn flattened(&self) -> Vec<PreviewItem> {
        self.categories
            .iter()
            .flat_map(|c| c.items.iter().cloned())
            .collect()
    }
}
