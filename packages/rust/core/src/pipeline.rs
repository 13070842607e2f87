//! End-to-end `finalize` pipeline: confirmed selection → bulk retrieval →
//! two-round reconciliation → report assembly → trim → checkpointed blobs.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{info, instrument, warn};

use clipdesk_curation::{CurationSession, WorkflowStage};
use clipdesk_reconcile::{RetrievalClient, dedup_articles, find_missing, recover};
use clipdesk_report::{ReportDocument, TrimOptions, trim};
use clipdesk_shared::checkpoint_files::{MISSING_ROUND1, MISSING_ROUND2};
use clipdesk_shared::{ArticleIdentity, ClipdeskError, Result, ScrapedArticle};

/// Result of the `finalize` pipeline.
#[derive(Debug)]
pub struct FinalizeResult {
    /// Articles retrieved across both rounds.
    pub article_count: usize,
    /// Round-1 gap size.
    pub missing_round1: usize,
    /// Articles still unretrieved after round 2.
    pub missing_round2: usize,
    /// Titles of the articles in `missing_round2`, for operator display.
    pub still_missing: Vec<String>,
    /// Rendered size of the full report.
    pub full_doc_bytes: usize,
    /// Rendered size of the trimmed report.
    pub trimmed_doc_bytes: usize,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &FinalizeResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &FinalizeResult) {}
}

/// Document assembly collaborator: turns retrieved articles into the
/// in-memory report model and renders a model to file bytes.
pub trait ReportAssembler {
    fn assemble(&self, report_title: &str, articles: &[ScrapedArticle]) -> Result<ReportDocument>;
    fn render(&self, doc: &ReportDocument) -> Result<Vec<u8>>;
}

/// Run the full finalize pipeline for a session in `final_scraping`.
///
/// 1. Bulk full-text retrieval for the confirmed selection
/// 2. Round-1 gap detection, audit checkpoint
/// 3. Per-title round-2 recovery, audit checkpoint
/// 4. Report assembly and trim
/// 5. Render both documents, checkpoint via `session.finish`
///
/// Retrieval gaps are reported in the result, never fatal. The only fatal
/// trim condition is a curated title missing from the assembled report.
#[instrument(skip_all, fields(instance = %session.instance().name, date = %session.date()))]
pub async fn finalize<C: RetrievalClient, A: ReportAssembler>(
    session: &mut CurationSession,
    client: &C,
    assembler: &A,
    trim_opts: &TrimOptions,
    progress: &dyn ProgressReporter,
) -> Result<FinalizeResult> {
    let start = Instant::now();

    if session.current_stage() != WorkflowStage::FinalScraping {
        return Err(ClipdeskError::InvalidTransition {
            from: session.current_stage().to_string(),
            to: WorkflowStage::Finished.to_string(),
        });
    }

    let final_list = session.selection().flattened();
    if final_list.is_empty() {
        return Err(ClipdeskError::validation(
            "cannot finalize an empty selection",
        ));
    }

    info!(selected = final_list.len(), "starting finalize pipeline");

    // --- Phase 1: bulk retrieval ---
    progress.phase("Retrieving full text");
    let bulk = client
        .bulk_retrieve(&session.instance().query, &final_list)
        .await?;
    let articles = dedup_articles(bulk);

    // --- Phase 2/3: reconciliation, audit checkpoints between rounds ---
    let missing_round1 = find_missing(&final_list, &articles);
    let (articles, missing_round2) = if missing_round1.is_empty() {
        (articles, Vec::new())
    } else {
        warn!(missing = missing_round1.len(), "bulk retrieval left a gap");
        persist_audit(session, MISSING_ROUND1, &missing_round1)?;

        progress.phase("Recovering missing articles");
        let (articles, missing_round2) = recover(articles, &missing_round1, client).await;
        if !missing_round2.is_empty() {
            persist_audit(session, MISSING_ROUND2, &missing_round2)?;
        }
        (articles, missing_round2)
    };

    // --- Phase 4: assemble and trim ---
    progress.phase("Assembling report");
    let full_doc = assembler.assemble(&session.instance().report_title, &articles)?;

    // Articles still missing after round 2 have no paragraphs in the
    // assembled report; trimming against their titles would fail the whole
    // call. The trim runs over the selection minus the unretrieved items.
    progress.phase("Trimming report");
    let mut trim_selection = session.selection().clone();
    if !missing_round2.is_empty() {
        let missing_ids: HashSet<ArticleIdentity> = missing_round2
            .iter()
            .map(ArticleIdentity::of_preview)
            .collect();
        for category in &mut trim_selection.categories {
            category
                .items
                .retain(|item| !missing_ids.contains(&ArticleIdentity::of_preview(item)));
        }
    }
    let trimmed_doc = trim(&full_doc, &trim_selection, trim_opts)?;

    // --- Phase 5: render and checkpoint ---
    progress.phase("Writing report documents");
    let full_bytes = assembler.render(&full_doc)?;
    let trimmed_bytes = assembler.render(&trimmed_doc)?;
    let (full_doc_bytes, trimmed_doc_bytes) = (full_bytes.len(), trimmed_bytes.len());

    let still_missing: Vec<String> = missing_round2.iter().map(|i| i.title.clone()).collect();
    let article_count = articles.len();
    session.finish(articles, full_bytes, trimmed_bytes)?;

    let result = FinalizeResult {
        article_count,
        missing_round1: missing_round1.len(),
        missing_round2: missing_round2.len(),
        still_missing,
        full_doc_bytes,
        trimmed_doc_bytes,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        articles = result.article_count,
        missing_round1 = result.missing_round1,
        missing_round2 = result.missing_round2,
        elapsed_ms = result.elapsed.as_millis(),
        "finalize pipeline complete"
    );

    Ok(result)
}

fn persist_audit<T: serde::Serialize>(
    session: &CurationSession,
    name: &str,
    value: &T,
) -> Result<()> {
    session.store().save_json(
        &session.instance().base_folder,
        session.date(),
        name,
        value,
    )
}
