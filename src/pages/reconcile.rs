//! Cross-document page-number reconciliation.
//!
//! The reconciler is a fold over the spine. It keeps the last confirmed page
//! number and every content paragraph seen so far, in any document, so that a
//! page number that bled into running text can still be erased once a later
//! page number shows it was skipped.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use super::scan::{Paragraph, scan};
use crate::dom::{Document, NodeId};
use crate::error::Result;
use crate::store::DocumentStore;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid token regex"));
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid digit regex"));

/// How skipped page numbers are found inside running text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize, clap::ValueEnum))]
pub enum GapMatch {
    /// Erase a whitespace-delimited token equal to the number, found in the
    /// paragraph's full text. Surrounding whitespace is kept; `16` never
    /// matches `6`.
    #[default]
    Token,
    /// Erase `\s*N\s*` anywhere, including inside longer numbers and the
    /// surrounding whitespace. Numbers are tried in ascending order, skipping
    /// those that no longer occur in any candidate text.
    Substring,
}

/// Reconciler settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub gap_match: GapMatch,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Report {
    /// Documents fed to the pass.
    pub documents: usize,
    /// Documents that changed and were written back.
    pub documents_modified: usize,
    /// Page-number paragraphs removed.
    pub page_numbers_removed: usize,
    /// Page numbers erased from running text.
    pub gap_numbers_erased: usize,
    /// Paragraphs that could not be classified.
    pub paragraphs_skipped: usize,
    /// Highest page number confirmed.
    pub last_page_number: u64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    doc: usize,
    element: NodeId,
}

/// Sequential page-number pass over documents in reading order.
#[derive(Debug, Default)]
pub struct Reconciler {
    options: Options,
    previous_confirmed: u64,
    candidates: Vec<Candidate>,
    documents: Vec<(String, Document)>,
    report: Report,
}

impl Reconciler {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// The running floor: highest page number confirmed so far.
    pub fn previous_confirmed(&self) -> u64 {
        self.previous_confirmed
    }

    /// Content paragraphs accumulated so far, across all documents.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn documents(&self) -> &[(String, Document)] {
        &self.documents
    }

    /// Process the next document in reading order.
    ///
    /// The reconciler keeps the document: later documents may still edit its
    /// paragraphs.
    pub fn push(&mut self, name: impl Into<String>, doc: Document) {
        let index = self.documents.len();
        let name = name.into();
        let result = scan(&doc);
        self.documents.push((name, doc));
        self.report.documents += 1;

        for paragraph in result.paragraphs() {
            match *paragraph {
                Paragraph::Numeral { value, element, .. } => {
                    if self.documents[index].1.detach(element) {
                        self.report.page_numbers_removed += 1;
                    }
                    debug!(document = %self.documents[index].0, page = value, "removed page number");
                    self.confirm(value);
                }
                Paragraph::Content { element } => {
                    self.candidates.push(Candidate {
                        doc: index,
                        element,
                    });
                }
                Paragraph::Skipped { .. } => self.report.paragraphs_skipped += 1,
            }
        }
    }

    /// End the pass, handing back every document in the order pushed.
    pub fn finish(mut self) -> (Vec<(String, Document)>, Report) {
        self.report.last_page_number = self.previous_confirmed;
        self.report.documents_modified =
            self.documents.iter().filter(|(_, d)| d.is_modified()).count();
        (self.documents, self.report)
    }

    fn confirm(&mut self, value: u64) {
        if value > self.previous_confirmed.saturating_add(1) {
            self.erase_gap(self.previous_confirmed, value);
        }
        self.previous_confirmed = self.previous_confirmed.max(value);
    }

    /// Erase every number strictly between `low` and `high` from candidate text.
    fn erase_gap(&mut self, low: u64, high: u64) {
        debug!(from = low + 1, to = high - 1, "page numbers missing, searching text");
        match self.options.gap_match {
            GapMatch::Token => {
                for &Candidate { doc, element } in &self.candidates {
                    let (name, doc) = &mut self.documents[doc];
                    let erased = erase_tokens_in(doc, element, low, high);
                    if erased > 0 {
                        debug!(document = %name, erased, "erased page numbers from text");
                        self.report.gap_numbers_erased += erased;
                    }
                }
            }
            GapMatch::Substring => {
                // An erasure can join digits into a new number in the gap
                let mut floor = low;
                while let Some(k) = self.smallest_embedded_number(floor, high) {
                    floor = k;
                    let Ok(pattern) = Regex::new(&format!(r"\s*{k}\s*")) else {
                        continue;
                    };
                    for &Candidate { doc, element } in &self.candidates {
                        let doc = &mut self.documents[doc].1;
                        for node in doc.text_nodes(element) {
                            let Some(text) = doc.text(node) else {
                                continue;
                            };
                            let erased = pattern.find_iter(text).count();
                            if erased > 0 {
                                debug!(page = k, erased, "erased page number from text");
                                let edited = pattern.replace_all(text, "").into_owned();
                                doc.set_text(node, edited);
                                self.report.gap_numbers_erased += erased;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Smallest number strictly between `low` and `high` that occurs inside
    /// a digit run of any candidate's text nodes.
    fn smallest_embedded_number(&self, low: u64, high: u64) -> Option<u64> {
        let mut numbers = BTreeSet::new();
        for candidate in &self.candidates {
            let doc = &self.documents[candidate.doc].1;
            for node in doc.text_nodes(candidate.element) {
                if let Some(text) = doc.text(node) {
                    collect_embedded_numbers(text, low, high, &mut numbers);
                }
            }
        }
        numbers.first().copied()
    }
}

/// Every number strictly between `low` and `high` whose decimal form occurs
/// inside a digit run of `text`.
fn collect_embedded_numbers(text: &str, low: u64, high: u64, out: &mut BTreeSet<u64>) {
    for run in DIGITS.find_iter(text) {
        let run = run.as_str();
        for start in 0..run.len() {
            if run.as_bytes()[start] == b'0' {
                continue;
            }
            for end in (start + 1)..=run.len().min(start + 20) {
                if let Ok(n) = run[start..end].parse::<u64>()
                    && n > low
                    && n < high
                {
                    out.insert(n);
                }
            }
        }
    }
}

/// Byte ranges of the whitespace-delimited tokens in `text` that spell a
/// number strictly between `low` and `high`.
fn gap_token_spans(text: &str, low: u64, high: u64) -> Vec<Range<usize>> {
    TOKEN
        .find_iter(text)
        .filter(|token| {
            let s = token.as_str();
            let canonical = s.bytes().all(|b| b.is_ascii_digit()) && !s.starts_with('0');
            canonical && s.parse::<u64>().is_ok_and(|n| n > low && n < high)
        })
        .map(|token| token.range())
        .collect()
}

/// Erase gap tokens from one paragraph and return how many went.
///
/// Tokens are found in the paragraph's full character data, so inline markup
/// splitting `1<b>6</b>` still reads as `16`. A token is erased from every
/// text node it spans; one that overlaps a CDATA section or an entity
/// reference is left alone.
fn erase_tokens_in(doc: &mut Document, element: NodeId, low: u64, high: u64) -> usize {
    let mut full = String::new();
    let mut segments = Vec::new();
    for (node, text, editable) in doc.text_segments(element) {
        let start = full.len();
        full.push_str(text);
        segments.push((node, start..full.len(), editable));
    }

    let spans: Vec<Range<usize>> = gap_token_spans(&full, low, high)
        .into_iter()
        .filter(|span| {
            segments.iter().all(|(_, range, editable)| {
                *editable || range.end <= span.start || span.end <= range.start
            })
        })
        .collect();
    if spans.is_empty() {
        return 0;
    }

    for (node, range, editable) in segments {
        if !editable {
            continue;
        }
        let mut edited = String::with_capacity(range.len());
        let mut pos = range.start;
        for span in &spans {
            let cut_start = span.start.max(range.start);
            let cut_end = span.end.min(range.end);
            if cut_start < cut_end {
                edited.push_str(&full[pos..cut_start]);
                pos = cut_end;
            }
        }
        edited.push_str(&full[pos..range.end]);
        doc.set_text(node, edited);
    }
    spans.len()
}

/// Run the page-number pass over `spine` and write back changed documents.
///
/// Every document is parsed before anything is written, so a document that
/// fails to parse aborts the run with the store untouched. A path listed
/// more than once in the spine is processed only the first time.
pub fn reconcile<S: DocumentStore + ?Sized>(
    store: &mut S,
    spine: &[String],
    options: &Options,
) -> Result<Report> {
    let mut reconciler = Reconciler::new(*options);
    let mut seen = HashSet::new();

    for path in spine {
        if !seen.insert(path.as_str()) {
            debug!(document = %path, "already processed, skipping repeat spine entry");
            continue;
        }
        let doc = store.open(path)?;
        reconciler.push(path.as_str(), doc);
    }

    let (documents, report) = reconciler.finish();
    for (path, doc) in documents.iter().filter(|(_, d)| d.is_modified()) {
        store.save(path, doc)?;
        debug!(document = %path, "written");
    }

    info!(
        documents = report.documents,
        modified = report.documents_modified,
        removed = report.page_numbers_removed,
        erased = report.gap_numbers_erased,
        last_page = report.last_page_number,
        "page numbers reconciled"
    );
    Ok(report)
}
