//! Two-round reconciliation of a curated selection against lossy retrieval.
//!
//! Bulk retrieval silently drops articles. Round 1 detects the gap by
//! identity (with a normalized-title fallback), round 2 retries each miss
//! with a per-title direct search. Two rounds are the ceiling; whatever is
//! still missing afterwards is reported, never fatal.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use clipdesk_shared::{ArticleIdentity, PreviewItem, Result, ScrapedArticle, normalize_title};

// ---------------------------------------------------------------------------
// Retrieval collaborator
// ---------------------------------------------------------------------------

/// Full-text retrieval collaborator. Both calls are lossy: they may omit
/// results without erroring, and no concurrent sessions are supported, so
/// callers await each request to completion before issuing the next.
pub trait RetrievalClient {
    /// Batch keyword retrieval for the whole selection.
    async fn bulk_retrieve(
        &self,
        query: &str,
        items: &[PreviewItem],
    ) -> Result<Vec<ScrapedArticle>>;

    /// Direct per-title retrieval, used for round-2 recovery.
    async fn retrieve_one(&self, title: &str) -> Result<Option<ScrapedArticle>>;
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a full reconciliation pass.
///
/// `missing_round2 ⊆ missing_round1 ⊆ final_list`, and `articles` is a
/// superset of the deduplicated bulk result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub articles: Vec<ScrapedArticle>,
    pub missing_round1: Vec<PreviewItem>,
    pub missing_round2: Vec<PreviewItem>,
}

impl ReconcileOutcome {
    pub fn is_fully_recovered(&self) -> bool {
        self.missing_round2.is_empty()
    }

    /// Titles still unretrieved after both rounds, for operator reporting.
    pub fn still_missing_titles(&self) -> Vec<String> {
        self.missing_round2.iter().map(|i| i.title.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Round 1: gap detection
// ---------------------------------------------------------------------------

/// Selected items with no counterpart in `scraped`.
///
/// An item counts as matched when its identity appears among the scraped
/// identities, or, failing that, when its normalized title does. The title
/// fallback covers identity-extraction misses on either side.
pub fn find_missing(final_list: &[PreviewItem], scraped: &[ScrapedArticle]) -> Vec<PreviewItem> {
    let scraped_keys: HashSet<ArticleIdentity> =
        scraped.iter().map(ArticleIdentity::of_scraped).collect();
    let scraped_titles: HashSet<String> =
        scraped.iter().map(|a| normalize_title(&a.title)).collect();

    final_list
        .iter()
        .filter(|item| {
            let id = ArticleIdentity::of_preview(item);
            if scraped_keys.contains(&id) {
                return false;
            }
            if scraped_titles.contains(&normalize_title(&item.title)) {
                debug!(identity = %id, title = %item.title, "matched via title fallback");
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

/// Drop later duplicates by identity, keeping first occurrences in order.
pub fn dedup_articles(articles: Vec<ScrapedArticle>) -> Vec<ScrapedArticle> {
    let mut seen: HashSet<ArticleIdentity> = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(ArticleIdentity::of_scraped(a)))
        .collect()
}

// ---------------------------------------------------------------------------
// Round 2: per-title recovery
// ---------------------------------------------------------------------------

/// Retry each round-1 miss with a direct per-title search, merging
/// recoveries into `articles` (idempotent by identity). Retrieval errors
/// count as misses; there is no round 3.
pub async fn recover<C: RetrievalClient>(
    mut articles: Vec<ScrapedArticle>,
    missing_round1: &[PreviewItem],
    client: &C,
) -> (Vec<ScrapedArticle>, Vec<PreviewItem>) {
    let mut present: HashSet<ArticleIdentity> =
        articles.iter().map(ArticleIdentity::of_scraped).collect();
    let mut missing_round2 = Vec::new();

    for item in missing_round1 {
        match client.retrieve_one(&item.title).await {
            Ok(Some(article)) => {
                let id = ArticleIdentity::of_scraped(&article);
                if present.insert(id.clone()) {
                    debug!(identity = %id, title = %item.title, "recovered in round 2");
                    articles.push(article);
                } else {
                    debug!(identity = %id, "round-2 result already present, skipped");
                }
            }
            Ok(None) => {
                missing_round2.push(item.clone());
            }
            Err(err) => {
                warn!(title = %item.title, error = %err, "per-title retrieval failed");
                missing_round2.push(item.clone());
            }
        }
    }

    (articles, missing_round2)
}

// ---------------------------------------------------------------------------
// Full pass
// ---------------------------------------------------------------------------

/// Reconcile a flattened selection against a bulk retrieval result.
///
/// The bulk result is deduplicated, the gap is computed, and each miss gets
/// one per-title retry. Gaps never fail the pass.
#[instrument(skip_all, fields(selected = final_list.len(), bulk = bulk.len()))]
pub async fn reconcile<C: RetrievalClient>(
    final_list: &[PreviewItem],
    bulk: Vec<ScrapedArticle>,
    client: &C,
) -> ReconcileOutcome {
    let articles = dedup_articles(bulk);
    let missing_round1 = find_missing(final_list, &articles);

    if missing_round1.is_empty() {
        info!(articles = articles.len(), "bulk retrieval complete, nothing missing");
        return ReconcileOutcome {
            articles,
            missing_round1,
            missing_round2: Vec::new(),
        };
    }

    info!(missing = missing_round1.len(), "round-1 gap detected, retrying per title");
    let (articles, missing_round2) = recover(articles, &missing_round1, client).await;

    if missing_round2.is_empty() {
        info!(articles = articles.len(), "round 2 recovered all missing articles");
    } else {
        warn!(
            still_missing = missing_round2.len(),
            "articles unretrieved after two rounds"
        );
    }

    ReconcileOutcome {
        articles,
        missing_round1,
        missing_round2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
