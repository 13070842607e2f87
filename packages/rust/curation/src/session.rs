//! The per-instance curation session: pool/selection bookkeeping, stage
//! transitions, checkpoint persistence, and restart-safe resumption.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use clipdesk_checkpoint::CheckpointStore;
use clipdesk_shared::checkpoint_files::{
    FINAL_REPORT, FINAL_REPORT_TRIMMED, FULL_SCRAPED_ARTICLES, PREVIEW_ARTICLES, USER_FINAL_LIST,
};
use clipdesk_shared::{
    ArticleIdentity, ClipdeskError, CurationInstance, CurationSelection, GroupedPool, PreviewItem,
    Result, ScrapedArticle, extract_news_id,
};

use crate::stage::WorkflowStage;

// ---------------------------------------------------------------------------
// Metadata extraction
// ---------------------------------------------------------------------------

/// Locale-specific metadata formatting is an external collaborator; the
/// session only extracts the raw line and hands it over.
pub trait MetadataFormatter {
    /// Turn a raw metadata line into a normalized display string.
    fn format(&self, raw: &str) -> String;
}

/// Default formatter: whitespace trim only.
pub struct TrimFormatter;

impl MetadataFormatter for TrimFormatter {
    fn format(&self, raw: &str) -> String {
        raw.trim().to_string()
    }
}

/// Extract the raw metadata line from preview hover text.
///
/// Split on the first newline. With two or more lines, when the first line
/// duplicates the title (after trim) the second line is the metadata;
/// otherwise the first line is. Without a newline there is no metadata.
pub fn raw_metadata_line(hover_text: &str, title: &str) -> String {
    let Some((first, rest)) = hover_text.split_once('\n') else {
        return String::new();
    };
    if first.trim() == title.trim() {
        rest.lines().next().unwrap_or("").to_string()
    } else {
        first.to_string()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Reorder direction for selection entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// One workflow instance's in-memory state, checkpointed after any mutation
/// whose loss would be unacceptable.
///
/// Single-writer by design: one curator edits one instance synchronously,
/// and the checkpoint store is last-writer-wins.
pub struct CurationSession {
    instance: CurationInstance,
    store: CheckpointStore,
    date: NaiveDate,
    stage: WorkflowStage,
    pool: GroupedPool,
    selection: CurationSelection,
    articles: Vec<ScrapedArticle>,
    final_report: Option<Vec<u8>>,
    final_report_trimmed: Option<Vec<u8>>,
}

impl CurationSession {
    /// Create a session for today's partition date.
    pub fn new(instance: CurationInstance, store: CheckpointStore) -> Self {
        let date = store.today();
        Self::for_date(instance, store, date)
    }

    /// Create a session for an explicit partition date.
    pub fn for_date(
        instance: CurationInstance,
        store: CheckpointStore,
        date: NaiveDate,
    ) -> Self {
        Self {
            instance,
            store,
            date,
            stage: WorkflowStage::SmartHome,
            pool: GroupedPool::new(),
            selection: CurationSelection::default(),
            articles: Vec::new(),
            final_report: None,
            final_report_trimmed: None,
        }
    }

    pub fn current_stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn instance(&self) -> &CurationInstance {
        &self.instance
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn pool(&self) -> &GroupedPool {
        &self.pool
    }

    pub fn selection(&self) -> &CurationSelection {
        &self.selection
    }

    pub fn articles(&self) -> &[ScrapedArticle] {
        &self.articles
    }

    // -----------------------------------------------------------------------
    // Stage transitions
    // -----------------------------------------------------------------------

    fn transition(&mut self, to: WorkflowStage) -> Result<()> {
        if !self.stage.can_transition(to) {
            return Err(ClipdeskError::InvalidTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        debug!(from = %self.stage, to = %to, instance = %self.instance.name, "stage transition");
        self.stage = to;
        Ok(())
    }

    fn require_transition(&self, to: WorkflowStage) -> Result<()> {
        if !self.stage.can_transition(to) {
            return Err(ClipdeskError::InvalidTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Clear the in-memory selection and pool and enter `init`.
    ///
    /// Prior checkpoints are untouched; they stay addressable by date.
    pub fn start_new(&mut self) -> Result<()> {
        self.transition(WorkflowStage::Init)?;
        self.pool = GroupedPool::new();
        self.selection = CurationSelection::default();
        self.articles.clear();
        self.final_report = None;
        self.final_report_trimmed = None;
        Ok(())
    }

    /// Enter the checkpoint inspection side stage.
    pub fn open_data_viewer(&mut self) -> Result<()> {
        self.transition(WorkflowStage::DataViewer)
    }

    /// Return from the inspection side stage to the home stage.
    pub fn close_data_viewer(&mut self) -> Result<()> {
        self.transition(WorkflowStage::SmartHome)
    }

    /// Explicit operator action taking `await_sort_confirm` into
    /// `ui_sorting`. Never triggered implicitly on resume.
    pub fn begin_sorting(&mut self) -> Result<()> {
        self.transition(WorkflowStage::UiSorting)
    }

    // -----------------------------------------------------------------------
    // Preview ingestion
    // -----------------------------------------------------------------------

    /// Deduplicate, annotate, and group raw preview items into the pool,
    /// checkpoint them, and enter `await_sort_confirm`.
    ///
    /// First occurrence wins on identity collisions. Items carrying an AI
    /// location are sub-bucketed under it; everything else lands in the
    /// instance category.
    pub fn ingest_preview(
        &mut self,
        raw: Vec<PreviewItem>,
        formatter: &dyn MetadataFormatter,
    ) -> Result<&GroupedPool> {
        self.require_transition(WorkflowStage::AwaitSortConfirm)?;

        let mut seen: HashSet<ArticleIdentity> = HashSet::new();
        let mut pool = GroupedPool::new();
        let mut next_index = 0usize;
        let raw_count = raw.len();

        for mut item in raw {
            item.original_index = next_index;
            if item.news_id.is_none() {
                item.news_id = extract_news_id(&item.hover_html);
            }

            let id = ArticleIdentity::of_preview(&item);
            if !seen.insert(id.clone()) {
                debug!(identity = %id, title = %item.title, "duplicate preview item skipped");
                continue;
            }
            next_index += 1;

            item.formatted_metadata =
                formatter.format(&raw_metadata_line(&item.hover_text, &item.title));

            let label = item
                .ai_analysis
                .as_ref()
                .and_then(|a| a.location.clone())
                .unwrap_or_else(|| self.instance.category.clone());
            pool.ensure(&label).push(item);
        }

        info!(
            instance = %self.instance.name,
            raw = raw_count,
            kept = pool.total_len(),
            categories = pool.categories.len(),
            "preview articles ingested"
        );

        self.pool = pool;
        self.transition(WorkflowStage::AwaitSortConfirm)?;
        self.persist_json(PREVIEW_ARTICLES, &self.pool)?;
        Ok(&self.pool)
    }

    // -----------------------------------------------------------------------
    // Pool / selection mutations (in-memory, durable at confirm)
    // -----------------------------------------------------------------------

    /// Move the pool item at `pool_index` to the end of the category's
    /// selection.
    pub fn add_to_selection(&mut self, category: &str, pool_index: usize) -> Result<()> {
        let items = pool_items_mut(&mut self.pool, category, pool_index)?;
        let item = items.remove(pool_index);

        let id = ArticleIdentity::of_preview(&item);
        remove_identity(&mut self.selection, &id);
        self.selection.ensure(category).push(item);
        Ok(())
    }

    /// Move the selection entry at `sel_index` back to the category's pool.
    pub fn remove_from_selection(&mut self, category: &str, sel_index: usize) -> Result<()> {
        let items = pool_items_mut(&mut self.selection, category, sel_index)?;
        let item = items.remove(sel_index);
        self.pool.ensure(category).push(item);
        Ok(())
    }

    /// Swap a selection entry with its neighbor. No-op at the boundaries.
    pub fn reorder(&mut self, category: &str, index: usize, direction: Direction) -> Result<()> {
        let items = pool_items_mut(&mut self.selection, category, index)?;
        match direction {
            Direction::Up if index > 0 => items.swap(index - 1, index),
            Direction::Down if index + 1 < items.len() => items.swap(index, index + 1),
            _ => {}
        }
        Ok(())
    }

    /// Move a selection entry to the head of its category.
    pub fn move_to_top(&mut self, category: &str, index: usize) -> Result<()> {
        let items = pool_items_mut(&mut self.selection, category, index)?;
        let item = items.remove(index);
        items.insert(0, item);
        Ok(())
    }

    /// Move a selection entry from one category to the end of another,
    /// dropping any entry with the same identity already present there.
    /// Re-adding the same article is therefore idempotent.
    pub fn move_to_category(
        &mut self,
        from_category: &str,
        index: usize,
        to_category: &str,
    ) -> Result<()> {
        let items = pool_items_mut(&mut self.selection, from_category, index)?;
        let item = items.remove(index);

        let id = ArticleIdentity::of_preview(&item);
        remove_identity(&mut self.selection, &id);
        self.selection.ensure(to_category).push(item);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Confirm / finish / rollback
    // -----------------------------------------------------------------------

    /// Persist the current selection as the final list and enter
    /// `final_scraping`.
    ///
    /// On a persistence failure the stage and selection stay valid;
    /// [`CurationSession::retry_persist_confirmed`] re-attempts the write
    /// without repeating the transition.
    pub fn confirm_selection(&mut self) -> Result<()> {
        self.transition(WorkflowStage::FinalScraping)?;
        info!(
            instance = %self.instance.name,
            selected = self.selection.total_len(),
            "selection confirmed"
        );
        self.retry_persist_confirmed()
    }

    /// Re-attempt the `final_scraping`-stage checkpoint write.
    pub fn retry_persist_confirmed(&self) -> Result<()> {
        self.persist_json(USER_FINAL_LIST, &self.selection)
    }

    /// Persist the scraped articles and both report blobs, then enter
    /// `finished`.
    ///
    /// On a persistence failure the in-memory state (including the blobs)
    /// stays valid; [`CurationSession::retry_persist_finished`] re-attempts
    /// the writes without repeating the mutation.
    pub fn finish(
        &mut self,
        articles: Vec<ScrapedArticle>,
        full_doc: Vec<u8>,
        trimmed_doc: Vec<u8>,
    ) -> Result<()> {
        self.transition(WorkflowStage::Finished)?;
        self.articles = articles;
        self.final_report = Some(full_doc);
        self.final_report_trimmed = Some(trimmed_doc);
        self.retry_persist_finished()
    }

    /// Re-attempt the `finished`-stage checkpoint writes.
    pub fn retry_persist_finished(&self) -> Result<()> {
        self.persist_json(FULL_SCRAPED_ARTICLES, &self.articles)?;
        if let Some(doc) = &self.final_report {
            self.store
                .save_bytes(&self.instance.base_folder, self.date, FINAL_REPORT, doc)?;
        }
        if let Some(doc) = &self.final_report_trimmed {
            self.store.save_bytes(
                &self.instance.base_folder,
                self.date,
                FINAL_REPORT_TRIMMED,
                doc,
            )?;
        }
        info!(
            instance = %self.instance.name,
            articles = self.articles.len(),
            "run finished and checkpointed"
        );
        Ok(())
    }

    /// Discard the finished-stage artifacts in memory (not from the store),
    /// reload pool and selection from the last checkpoints, and re-enter
    /// `ui_sorting`.
    pub fn rollback(&mut self) -> Result<()> {
        self.transition(WorkflowStage::UiSorting)?;
        self.articles.clear();
        self.final_report = None;
        self.final_report_trimmed = None;

        let base = self.instance.base_folder.clone();
        self.pool = self
            .store
            .load_json(&base, self.date, PREVIEW_ARTICLES)?
            .unwrap_or_default();
        self.selection = self
            .store
            .load_json(&base, self.date, USER_FINAL_LIST)?
            .unwrap_or_default();

        info!(instance = %self.instance.name, "rolled back to ui_sorting");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resume
    // -----------------------------------------------------------------------

    /// Reconstruct the stage from checkpoint presence on a fresh process
    /// start.
    ///
    /// More complete checkpoints always take precedence, so a half-finished
    /// retry never regresses a completed run: a scraped-articles checkpoint
    /// (even an empty one — a finished run can end with every retrieval
    /// lost) implies `finished`; a non-empty confirmed final list implies
    /// `ui_sorting`; preview articles alone offer the `ui_sorting` entry
    /// point via `await_sort_confirm`; otherwise the home stage.
    pub fn resume(&mut self) -> Result<WorkflowStage> {
        let base = self.instance.base_folder.clone();
        let articles: Option<Vec<ScrapedArticle>> =
            self.store.load_json(&base, self.date, FULL_SCRAPED_ARTICLES)?;
        let selection: Option<CurationSelection> =
            self.store.load_json(&base, self.date, USER_FINAL_LIST)?;
        let pool: Option<GroupedPool> =
            self.store.load_json(&base, self.date, PREVIEW_ARTICLES)?;

        if let Some(articles) = articles {
            self.articles = articles;
            self.selection = selection.unwrap_or_default();
            self.pool = pool.unwrap_or_default();
            self.stage = WorkflowStage::Finished;
        } else if let Some(selection) = selection.filter(|s| !s.is_empty()) {
            self.selection = selection;
            self.pool = pool.unwrap_or_default();
            self.stage = WorkflowStage::UiSorting;
        } else if let Some(pool) = pool.filter(|p| !p.is_empty()) {
            self.pool = pool;
            self.selection = CurationSelection::default();
            self.stage = WorkflowStage::AwaitSortConfirm;
        } else {
            self.stage = WorkflowStage::SmartHome;
        }

        info!(
            instance = %self.instance.name,
            date = %self.date,
            stage = %self.stage,
            "resumed from checkpoints"
        );
        Ok(self.stage)
    }

    fn persist_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.store
            .save_json(&self.instance.base_folder, self.date, name, value)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Index-guarded access to a category's items. Fails fast with no partial
/// mutation on a stale index.
fn pool_items_mut<'a>(
    map: &'a mut GroupedPool,
    category: &str,
    index: usize,
) -> Result<&'a mut Vec<PreviewItem>> {
    let len = map.get(category).map_or(0, Vec::len);
    if index >= len {
        return Err(ClipdeskError::IndexOutOfRange {
            category: category.to_string(),
            index,
            len,
        });
    }
    Ok(map.get_mut(category).expect("category exists"))
}

/// Drop every entry with the given identity from all categories.
fn remove_identity(selection: &mut CurationSelection, id: &ArticleIdentity) {
    for category in &mut selection.categories {
        category
            .items
            .retain(|item| &ArticleIdentity::of_preview(item) != id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
