//! Stable article identity and title normalization.
//!
//! Two records with the same [`ArticleIdentity`] are the same article for
//! dedup, selection uniqueness, and reconciliation matching. The key is
//! derived with a fixed priority: portal news id, then normalized URL, then
//! normalized title, then the scrape ordinal as a last resort.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{PreviewItem, ScrapedArticle};

// ---------------------------------------------------------------------------
// Title normalization
// ---------------------------------------------------------------------------

/// Normalize a title for comparison.
///
/// Strips zero-width and non-breaking-space characters, leading/trailing
/// Markdown emphasis markers, and a leading enumeration token (digits
/// optionally wrapped in parentheses followed by `.`, `、`, or `:`), then
/// collapses internal whitespace runs to a single space and trims.
pub fn normalize_title(raw: &str) -> String {
    static ENUM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[(（]?[0-9０-９]+[)）]?\s*[.、:：]\s*").expect("valid regex")
    });
    static WS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let stripped: String = raw
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00A0}'
            )
        })
        .collect();

    let trimmed = stripped
        .trim()
        .trim_matches(|c| matches!(c, '*' | '_' | '~'));
    let no_enum = ENUM_RE.replace(trimmed, "");
    let collapsed = WS_RE.replace_all(&no_enum, " ");
    collapsed.trim().to_string()
}

/// Normalize a URL for identity comparison.
///
/// Parses and re-serializes (lowercasing the host), drops the fragment,
/// and strips a trailing slash.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw.trim()).ok()?;
    parsed.set_fragment(None);
    let s = parsed.to_string();
    Some(s.trim_end_matches('/').to_string())
}

/// Extract the portal news identifier from preview tooltip HTML.
pub fn extract_news_id(hover_html: &str) -> Option<String> {
    static NEWS_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)(?:data-)?(?:news[_-]?id|docid)\s*[=:]\s*["']?([A-Za-z0-9][A-Za-z0-9._-]*)"#)
            .expect("valid regex")
    });
    NEWS_ID_RE
        .captures(hover_html)
        .map(|caps| caps[1].to_string())
}

// ---------------------------------------------------------------------------
// ArticleIdentity
// ---------------------------------------------------------------------------

/// Derived dedup key for an article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleIdentity(String);

impl ArticleIdentity {
    /// Identity of a preview item.
    pub fn of_preview(item: &PreviewItem) -> Self {
        Self::derive(
            item.news_id.as_deref(),
            item.url.as_deref(),
            &item.title,
            Some(item.original_index),
        )
    }

    /// Identity of a full-text article.
    pub fn of_scraped(article: &ScrapedArticle) -> Self {
        Self::derive(
            article.news_id.as_deref(),
            article.url.as_deref(),
            &article.title,
            None,
        )
    }

    fn derive(
        news_id: Option<&str>,
        url: Option<&str>,
        title: &str,
        original_index: Option<usize>,
    ) -> Self {
        if let Some(id) = news_id.map(str::trim).filter(|s| !s.is_empty()) {
            return Self(format!("id:{id}"));
        }
        if let Some(normalized) = url.and_then(normalize_url) {
            return Self(format!("url:{normalized}"));
        }
        let normalized = normalize_title(title);
        if !normalized.is_empty() {
            return Self(format!("title:{normalized}"));
        }
        Self(format!("index:{}", original_index.unwrap_or(0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> PreviewItem {
        PreviewItem {
            title: title.into(),
            hover_text: String::new(),
            hover_html: String::new(),
            news_id: None,
            url: None,
            original_index: 7,
            keyword_preset: "default".into(),
            day_tag: None,
            ai_analysis: None,
            formatted_metadata: String::new(),
        }
    }

    #[test]
    fn normalize_strips_zero_width_and_nbsp() {
        assert_eq!(normalize_title("Rates\u{200B} rise\u{FEFF}"), "Rates rise");
        assert_eq!(normalize_title("a\u{00A0}b"), "ab");
    }

    #[test]
    fn normalize_strips_emphasis_markers() {
        assert_eq!(normalize_title("**Bold headline**"), "Bold headline");
        assert_eq!(normalize_title("_underlined_"), "underlined");
    }

    #[test]
    fn normalize_strips_enumeration_token() {
        assert_eq!(normalize_title("1. Market opens"), "Market opens");
        assert_eq!(normalize_title("（2）、本地新聞"), "本地新聞");
        assert_eq!(normalize_title("(3): Headline"), "Headline");
        assert_eq!(normalize_title("12、總結"), "總結");
    }

    #[test]
    fn normalize_collapses_internal_whitespace() {
        assert_eq!(normalize_title("  a \t b\n c  "), "a b c");
    }

    #[test]
    fn normalize_leaves_plain_titles_alone() {
        assert_eq!(normalize_title("Plain headline"), "Plain headline");
    }

    #[test]
    fn url_normalization_drops_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://Example.com/News/123/#top").as_deref(),
            Some("https://example.com/News/123")
        );
        assert!(normalize_url("not a url").is_none());
    }

    #[test]
    fn extract_news_id_from_attribute() {
        let html = r#"<div class="tip" data-news-id="NWS-20250811-042">…</div>"#;
        assert_eq!(extract_news_id(html).as_deref(), Some("NWS-20250811-042"));
        assert!(extract_news_id("<div>no id here</div>").is_none());
    }

    #[test]
    fn identity_prefers_news_id() {
        let mut it = item("Headline");
        it.news_id = Some("n-1".into());
        it.url = Some("https://example.com/a".into());
        assert_eq!(ArticleIdentity::of_preview(&it).as_str(), "id:n-1");
    }

    #[test]
    fn identity_falls_back_to_url_then_title() {
        let mut it = item("Headline");
        it.url = Some("https://example.com/a/".into());
        assert_eq!(
            ArticleIdentity::of_preview(&it).as_str(),
            "url:https://example.com/a"
        );

        it.url = None;
        assert_eq!(ArticleIdentity::of_preview(&it).as_str(), "title:Headline");
    }

    #[test]
    fn identity_falls_back_to_original_index() {
        let it = item("   ");
        assert_eq!(ArticleIdentity::of_preview(&it).as_str(), "index:7");
    }

    #[test]
    fn preview_and_scraped_identities_agree_on_news_id() {
        let mut it = item("Headline");
        it.news_id = Some("n-9".into());
        let article = ScrapedArticle::new(
            Some("n-9".into()),
            None,
            "Headline (edited)",
            "body",
            "meta",
        );
        assert_eq!(
            ArticleIdentity::of_preview(&it),
            ArticleIdentity::of_scraped(&article)
        );
    }
}
