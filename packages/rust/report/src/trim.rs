//! Title-anchored document segmentation.
//!
//! Locates each curated title inside a fully assembled report and extracts a
//! trimmed derivative: per selected article, the title paragraph, its
//! metadata paragraph, and up to `keep_body_paras` body paragraphs. Output
//! follows document order, never curation order. An unresolvable title fails
//! the whole call; a silently incomplete document is worse than no document.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, instrument, warn};

use clipdesk_shared::{ClipdeskError, CurationSelection, Result, normalize_title};

use crate::document::{Paragraph, ReportDocument};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tuning knobs for the trim pass.
#[derive(Debug, Clone)]
pub struct TrimOptions {
    /// Non-blank body paragraphs kept per article.
    pub keep_body_paras: usize,
    /// Separator/closing literals (matched against trimmed paragraph text)
    /// that pass through uncounted and are never treated as subtitles.
    pub marker_literals: Vec<String>,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            keep_body_paras: 3,
            marker_literals: vec!["***".into(), "＊＊＊".into(), "完".into()],
        }
    }
}

impl TrimOptions {
    fn is_marker(&self, paragraph: &Paragraph) -> bool {
        let raw = paragraph.text();
        let trimmed = raw.trim();
        self.marker_literals.iter().any(|m| m == trimmed)
    }
}

// ---------------------------------------------------------------------------
// Title index
// ---------------------------------------------------------------------------

/// Normalized paragraph text to ordered positions, with per-key occurrence
/// counters so repeated titles consume distinct paragraphs.
struct TitleIndex {
    positions: HashMap<String, Vec<usize>>,
    used: HashMap<String, usize>,
}

impl TitleIndex {
    fn build(paragraphs: &[Paragraph]) -> Self {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, para) in paragraphs.iter().enumerate() {
            let key = normalize_title(&para.text());
            // Separator lines normalize to nothing; indexing them would let
            // the empty key substring-match every title in the fuzzy pass.
            if key.is_empty() {
                continue;
            }
            positions.entry(key).or_default().push(i);
        }
        Self {
            positions,
            used: HashMap::new(),
        }
    }

    fn remaining(&self, key: &str) -> usize {
        let total = self.positions.get(key).map_or(0, Vec::len);
        total - self.used.get(key).copied().unwrap_or(0)
    }

    /// Consume the next unused position for an exactly-matching key.
    fn take_exact(&mut self, key: &str) -> Option<usize> {
        if self.remaining(key) == 0 {
            return None;
        }
        let counter = self.used.entry(key.to_string()).or_insert(0);
        let pos = self.positions[key][*counter];
        *counter += 1;
        Some(pos)
    }

    /// Fuzzy fallback: among keys where either string contains the other,
    /// pick the one closest in length and consume its next unused position.
    /// Ties break toward the earlier document position.
    fn take_fuzzy(&mut self, key: &str) -> Option<(usize, String)> {
        let key_len = key.chars().count();
        let mut candidates: Vec<(usize, usize, String)> = self
            .positions
            .keys()
            .filter(|k| self.remaining(k) > 0)
            .filter(|k| k.contains(key) || key.contains(k.as_str()))
            .map(|k| {
                let diff = k.chars().count().abs_diff(key_len);
                let next_pos = self.positions[k][self.used.get(k).copied().unwrap_or(0)];
                (diff, next_pos, k.clone())
            })
            .collect();
        candidates.sort();

        let (_, _, best) = candidates.into_iter().next()?;
        let pos = self.take_exact(&best)?;
        Some((pos, best))
    }
}

/// Resolve every curated title to a distinct paragraph position.
///
/// Fatal when any title stays unmatched; the error names all of them so the
/// curator can correct the batch in one pass.
fn resolve_positions(titles: &[String], index: &mut TitleIndex) -> Result<Vec<usize>> {
    let mut matched = BTreeSet::new();
    let mut unmatched = Vec::new();

    for title in titles {
        let key = normalize_title(title);
        if key.is_empty() {
            unmatched.push(title.clone());
            continue;
        }
        if let Some(pos) = index.take_exact(&key) {
            matched.insert(pos);
        } else if let Some((pos, via)) = index.take_fuzzy(&key) {
            warn!(title = %title, matched = %via, position = pos, "title resolved via fuzzy match");
            matched.insert(pos);
        } else {
            unmatched.push(title.clone());
        }
    }

    if !unmatched.is_empty() {
        return Err(ClipdeskError::TitleNotFound { titles: unmatched });
    }
    Ok(matched.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Subtitle heuristic
// ---------------------------------------------------------------------------

const SUBTITLE_MAX_CHARS: usize = 20;
const LONG_PARAGRAPH_MIN_CHARS: usize = 40;

/// A short subheading line, skipped from body-paragraph accounting.
///
/// Holds when the normalized text is non-empty and not a marker literal, at
/// most 20 characters, without a trailing full stop, and the paragraph is
/// either sandwiched by blanks or by two long (≥ 40 chars) paragraphs.
/// Neighbors outside the document count as blank.
fn is_subtitle(paragraphs: &[Paragraph], idx: usize, opts: &TrimOptions) -> bool {
    let para = &paragraphs[idx];
    let norm = normalize_title(&para.text());
    if norm.is_empty() || opts.is_marker(para) {
        return false;
    }
    if norm.chars().count() > SUBTITLE_MAX_CHARS {
        return false;
    }
    if norm.ends_with('。') || norm.ends_with('.') {
        return false;
    }

    let prev = idx.checked_sub(1).map(|i| &paragraphs[i]);
    let next = paragraphs.get(idx + 1);
    let blank = |p: Option<&Paragraph>| p.is_none_or(Paragraph::is_blank);
    let long = |p: Option<&Paragraph>| {
        p.is_some_and(|p| !p.is_blank() && p.text().trim().chars().count() >= LONG_PARAGRAPH_MIN_CHARS)
    };

    (blank(prev) && blank(next)) || (long(prev) && long(next))
}

// ---------------------------------------------------------------------------
// Trim
// ---------------------------------------------------------------------------

/// Produce the trimmed derivative of `doc` for the curated `selection`.
///
/// Paragraphs before the first matched title pass through unchanged. Each
/// matched span then contributes its title, a metadata paragraph (the first
/// non-blank, non-subtitle line after the title, when one exists before the
/// next matched title), marker literals uncounted, and up to
/// `keep_body_paras` body paragraphs. Scanning continues past the cap so
/// span boundaries stay correct.
#[instrument(skip_all, fields(paragraphs = doc.len(), selected = selection.total_len()))]
pub fn trim(
    doc: &ReportDocument,
    selection: &CurationSelection,
    opts: &TrimOptions,
) -> Result<ReportDocument> {
    let titles: Vec<String> = selection
        .flattened()
        .into_iter()
        .map(|item| item.title)
        .collect();
    if titles.is_empty() {
        return Ok(doc.clone());
    }

    let mut index = TitleIndex::build(&doc.paragraphs);
    let positions = resolve_positions(&titles, &mut index)?;
    debug!(spans = positions.len(), "titles anchored");

    let mut out: Vec<Paragraph> = doc.paragraphs[..positions[0]].to_vec();

    for (n, &start) in positions.iter().enumerate() {
        let end = positions.get(n + 1).copied().unwrap_or(doc.paragraphs.len());
        out.push(doc.paragraphs[start].clone());

        // Metadata: first non-blank, non-subtitle line; markers pass through.
        let mut cursor = start + 1;
        while cursor < end {
            let para = &doc.paragraphs[cursor];
            if para.is_blank() {
                cursor += 1;
            } else if opts.is_marker(para) {
                out.push(para.clone());
                cursor += 1;
            } else if is_subtitle(&doc.paragraphs, cursor, opts) {
                cursor += 1;
            } else {
                out.push(para.clone());
                cursor += 1;
                break;
            }
        }

        // Body: count non-blank, non-subtitle paragraphs up to the cap.
        let mut emitted = 0usize;
        while cursor < end {
            let para = &doc.paragraphs[cursor];
            cursor += 1;
            if para.is_blank() {
                continue;
            }
            if opts.is_marker(para) {
                out.push(para.clone());
                continue;
            }
            if is_subtitle(&doc.paragraphs, cursor - 1, opts) {
                continue;
            }
            if emitted < opts.keep_body_paras {
                out.push(para.clone());
                emitted += 1;
            }
        }
    }

    Ok(ReportDocument::new(out))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Alignment, ParagraphFormat, TextRun};
    use clipdesk_shared::PreviewItem;

    const LONG_A: &str = "The council approved the harbour redevelopment plan after a lengthy debate on funding.";
    const LONG_B: &str = "Residents voiced concerns over construction noise and the projected five-year timeline.";
    const LONG_C: &str = "Officials promised quarterly progress reviews and an independent environmental audit.";

    fn selection_of(titles: &[&str]) -> CurationSelection {
        let mut sel = CurationSelection::default();
        for (i, title) in titles.iter().enumerate() {
            sel.ensure("本地").push(PreviewItem {
                title: (*title).into(),
                hover_text: String::new(),
                hover_html: String::new(),
                news_id: Some(format!("n-{i}")),
                url: None,
                original_index: i,
                keyword_preset: "smart city".into(),
                day_tag: None,
                ai_analysis: None,
                formatted_metadata: String::new(),
            });
        }
        sel
    }

    fn doc(lines: &[&str]) -> ReportDocument {
        ReportDocument::from_lines(lines)
    }

    #[test]
    fn output_follows_document_order_not_curation_order() {
        let document = doc(&[
            "2025年8月11日",
            "",
            "Alpha headline",
            "Daily Post · A01",
            LONG_A,
            "Beta headline",
            "Daily Post · A02",
            LONG_B,
            "Gamma headline",
            "Daily Post · A03",
            LONG_C,
        ]);
        let selection = selection_of(&["Gamma headline", "Alpha headline", "Beta headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        let lines = trimmed.lines();
        assert_eq!(
            lines,
            vec![
                "2025年8月11日",
                "",
                "Alpha headline",
                "Daily Post · A01",
                LONG_A,
                "Beta headline",
                "Daily Post · A02",
                LONG_B,
                "Gamma headline",
                "Daily Post · A03",
                LONG_C,
            ]
        );
    }

    #[test]
    fn duplicate_titles_consume_distinct_occurrences() {
        let document = doc(&[
            "Repeated headline",
            "Daily Post · A01",
            LONG_A,
            "Repeated headline",
            "Evening Post · B07",
            LONG_B,
        ]);
        let selection = selection_of(&["Repeated headline", "Repeated headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        let lines = trimmed.lines();
        // Both occurrences anchored: both metadata lines survive.
        assert!(lines.contains(&"Daily Post · A01".to_string()));
        assert!(lines.contains(&"Evening Post · B07".to_string()));
        assert_eq!(
            lines.iter().filter(|l| *l == "Repeated headline").count(),
            2
        );
    }

    #[test]
    fn subtitle_does_not_consume_a_body_slot() {
        let document = doc(&["Headline", "", "Short Tag", "", LONG_A, LONG_B]);
        let selection = selection_of(&["Headline"]);
        let opts = TrimOptions {
            keep_body_paras: 2,
            ..TrimOptions::default()
        };

        let trimmed = trim(&document, &selection, &opts).unwrap();
        assert_eq!(trimmed.lines(), vec!["Headline", LONG_A, LONG_B]);
    }

    #[test]
    fn subtitle_between_long_paragraphs_is_skipped() {
        let document = doc(&["Headline", "Daily Post · A01", LONG_A, "Interim tag", LONG_B]);
        let selection = selection_of(&["Headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        assert_eq!(
            trimmed.lines(),
            vec!["Headline", "Daily Post · A01", LONG_A, LONG_B]
        );
    }

    #[test]
    fn short_line_ending_with_full_stop_counts_as_body() {
        let document = doc(&["Headline", "Daily Post · A01", LONG_A, "It passed.", LONG_B]);
        let selection = selection_of(&["Headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        assert_eq!(
            trimmed.lines(),
            vec!["Headline", "Daily Post · A01", LONG_A, "It passed.", LONG_B]
        );
    }

    #[test]
    fn unmatched_title_is_fatal_with_no_partial_output() {
        let document = doc(&["Alpha headline", "Daily Post · A01", LONG_A]);
        let selection = selection_of(&["Alpha headline", "qqqq zzzz never printed"]);

        let err = trim(&document, &selection, &TrimOptions::default()).unwrap_err();
        match err {
            ClipdeskError::TitleNotFound { titles } => {
                assert_eq!(titles, vec!["qqqq zzzz never printed"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fuzzy_fallback_prefers_closest_length() {
        let document = doc(&[
            "Harbour project approved today",
            "Daily Post · A01",
            LONG_A,
            "Harbour",
            "Evening Post · B07",
            LONG_B,
        ]);
        // No exact match; both document keys overlap the title as
        // substrings, the longer one is closer in length.
        let selection = selection_of(&["Harbour project approved"]);
        let opts = TrimOptions {
            keep_body_paras: 1,
            ..TrimOptions::default()
        };

        let trimmed = trim(&document, &selection, &opts).unwrap();
        let lines = trimmed.lines();
        assert!(lines.contains(&"Daily Post · A01".to_string()));
        assert!(!lines.contains(&"Evening Post · B07".to_string()));
    }

    #[test]
    fn normalization_bridges_emphasis_and_enumeration() {
        let document = doc(&["**３、Decorated headline**", "Daily Post · A01", LONG_A]);
        let selection = selection_of(&["Decorated headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        assert_eq!(trimmed.lines()[0], "**３、Decorated headline**");
    }

    #[test]
    fn adjacent_matched_titles_emit_no_metadata() {
        let document = doc(&["First headline", "Second headline", "Daily Post · A02", LONG_A]);
        let selection = selection_of(&["First headline", "Second headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        assert_eq!(
            trimmed.lines(),
            vec!["First headline", "Second headline", "Daily Post · A02", LONG_A]
        );
    }

    #[test]
    fn body_cap_is_enforced_and_blanks_do_not_count() {
        let document = doc(&[
            "Headline",
            "Daily Post · A01",
            "",
            LONG_A,
            "",
            LONG_B,
            LONG_C,
            "A fourth body paragraph that must not appear in the trimmed output at all.",
        ]);
        let selection = selection_of(&["Headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        assert_eq!(
            trimmed.lines(),
            vec!["Headline", "Daily Post · A01", LONG_A, LONG_B, LONG_C]
        );
    }

    #[test]
    fn marker_literals_pass_through_uncounted() {
        let document = doc(&["Headline", "Daily Post · A01", LONG_A, "***", LONG_B, "完"]);
        let selection = selection_of(&["Headline"]);
        let opts = TrimOptions {
            keep_body_paras: 2,
            ..TrimOptions::default()
        };

        let trimmed = trim(&document, &selection, &opts).unwrap();
        assert_eq!(
            trimmed.lines(),
            vec!["Headline", "Daily Post · A01", LONG_A, "***", LONG_B, "完"]
        );
    }

    #[test]
    fn empty_selection_returns_document_unchanged() {
        let document = doc(&["2025年8月11日", "", "Alpha headline", LONG_A]);
        let trimmed = trim(&document, &CurationSelection::default(), &TrimOptions::default())
            .unwrap();
        assert_eq!(trimmed, document);
    }

    #[test]
    fn paragraph_copy_preserves_formatting() {
        let title = Paragraph {
            runs: vec![TextRun {
                text: "Styled headline".into(),
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
        let document = ReportDocument::new(vec![
            title.clone(),
            Paragraph::plain("Daily Post · A01"),
            Paragraph::plain(LONG_A),
        ]);
        let selection = selection_of(&["Styled headline"]);

        let trimmed = trim(&document, &selection, &TrimOptions::default()).unwrap();
        assert_eq!(trimmed.paragraphs[0], title);
    }
}
