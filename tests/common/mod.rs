//! In-memory fakes for the four external collaborators, backed by the
//! same A1 range grammar the live clients use.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use meetsync::analysis::{AnalysisModel, AnalysisResult};
use meetsync::docs::{ArchivedDoc, DocumentStore};
use meetsync::sheets::range::{self, ParsedRange};
use meetsync::sheets::{RangeUpdate, SheetsError, SpreadsheetStore};
use meetsync::source::{TranscriptRecord, TranscriptSource, Utterance};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Spreadsheet fake
// ============================================================================

#[derive(Default)]
pub struct FakeSheets {
    grids: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
    batch_calls: Mutex<Vec<usize>>,
    append_calls: AtomicUsize,
}

impl FakeSheets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(self, spreadsheet_id: &str, tab: &str, grid: Vec<Vec<String>>) -> Self {
        self.grids
            .lock()
            .unwrap()
            .insert((spreadsheet_id.to_string(), tab.to_string()), grid);
        self
    }

    /// Seed or overwrite one row directly, bypassing the store trait.
    pub fn set_row(&self, spreadsheet_id: &str, tab: &str, row_number: usize, values: Vec<String>) {
        let mut grids = self.grids.lock().unwrap();
        let grid = grids
            .entry((spreadsheet_id.to_string(), tab.to_string()))
            .or_default();
        while grid.len() < row_number {
            grid.push(Vec::new());
        }
        grid[row_number - 1] = values;
    }

    pub fn grid(&self, spreadsheet_id: &str, tab: &str) -> Vec<Vec<String>> {
        self.grids
            .lock()
            .unwrap()
            .get(&(spreadsheet_id.to_string(), tab.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn cell(&self, spreadsheet_id: &str, tab: &str, col: &str, row: usize) -> String {
        let grid = self.grid(spreadsheet_id, tab);
        let col_index = range::column_index(col);
        grid.get(row - 1)
            .and_then(|r| r.get(col_index - 1))
            .cloned()
            .unwrap_or_default()
    }

    pub fn batch_call_count(&self) -> usize {
        self.batch_calls.lock().unwrap().len()
    }

    pub fn append_call_count(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    fn parse(range_ref: &str) -> Result<ParsedRange, SheetsError> {
        range::parse_range(range_ref).ok_or_else(|| SheetsError::Api {
            status: 400,
            message: format!("unparseable range {}", range_ref),
        })
    }

    fn read(grid: &[Vec<String>], parsed: &ParsedRange) -> Vec<Vec<String>> {
        // Bare tab reference reads the whole grid.
        if parsed.start.col.is_none() && parsed.start.row.is_none() {
            return grid.to_vec();
        }

        let start_row = parsed.start.row.unwrap_or(1);
        let start_col = parsed.start.col.unwrap_or(1);
        let (end_col, end_row) = match &parsed.end {
            None => (start_col, start_row),
            Some(corner) => (
                corner.col.unwrap_or(usize::MAX),
                corner.row.unwrap_or(usize::MAX),
            ),
        };

        let mut out = Vec::new();
        for row_index in (start_row - 1)..grid.len().min(end_row) {
            let row = &grid[row_index];
            let from = (start_col - 1).min(row.len());
            let to = row.len().min(end_col);
            out.push(row[from..to].to_vec());
        }
        out
    }

    fn apply(grid: &mut Vec<Vec<String>>, parsed: &ParsedRange, rows: &[Vec<String>]) {
        let start_row = parsed.start.row.unwrap_or(1);
        let start_col = parsed.start.col.unwrap_or(1);
        for (r, row) in rows.iter().enumerate() {
            let target_row = start_row - 1 + r;
            while grid.len() <= target_row {
                grid.push(Vec::new());
            }
            let grid_row = &mut grid[target_row];
            for (c, value) in row.iter().enumerate() {
                let target_col = start_col - 1 + c;
                while grid_row.len() <= target_col {
                    grid_row.push(String::new());
                }
                grid_row[target_col] = value.clone();
            }
        }
    }
}

#[async_trait]
impl SpreadsheetStore for FakeSheets {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range_ref: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let parsed = Self::parse(range_ref)?;
        let grids = self.grids.lock().unwrap();
        let grid = grids
            .get(&(spreadsheet_id.to_string(), parsed.tab.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(Self::read(&grid, &parsed))
    }

    async fn set_range(
        &self,
        spreadsheet_id: &str,
        update: &RangeUpdate,
    ) -> Result<(), SheetsError> {
        let parsed = Self::parse(&update.range)?;
        let mut grids = self.grids.lock().unwrap();
        let grid = grids
            .entry((spreadsheet_id.to_string(), parsed.tab.clone()))
            .or_default();
        Self::apply(grid, &parsed, &update.rows);
        Ok(())
    }

    async fn batch_set(
        &self,
        spreadsheet_id: &str,
        updates: &[RangeUpdate],
    ) -> Result<(), SheetsError> {
        self.batch_calls.lock().unwrap().push(updates.len());
        for update in updates {
            let parsed = Self::parse(&update.range)?;
            let mut grids = self.grids.lock().unwrap();
            let grid = grids
                .entry((spreadsheet_id.to_string(), parsed.tab.clone()))
                .or_default();
            Self::apply(grid, &parsed, &update.rows);
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range_ref: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let parsed = Self::parse(range_ref)?;
        let mut grids = self.grids.lock().unwrap();
        let grid = grids
            .entry((spreadsheet_id.to_string(), parsed.tab.clone()))
            .or_default();
        for row in rows {
            grid.push(row.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Document store fake
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakeDoc {
    pub transcript_id: Option<String>,
    pub body: String,
    pub processed: bool,
}

#[derive(Default)]
pub struct FakeDocs {
    docs: Mutex<HashMap<String, FakeDoc>>,
    next_id: AtomicUsize,
}

pub fn doc_url(doc_id: &str) -> String {
    format!("https://docs.google.com/document/d/{}", doc_id)
}

impl FakeDocs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc_id: &str, transcript_id: Option<&str>, body: &str, processed: bool) {
        self.docs.lock().unwrap().insert(
            doc_id.to_string(),
            FakeDoc {
                transcript_id: transcript_id.map(str::to_string),
                body: body.to_string(),
                processed,
            },
        );
    }

    pub fn count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn processed(&self, doc_id: &str) -> bool {
        self.docs
            .lock()
            .unwrap()
            .get(doc_id)
            .map(|d| d.processed)
            .unwrap_or(false)
    }
}

#[async_trait]
impl DocumentStore for FakeDocs {
    async fn list_tagged(&self, _folder_id: &str) -> Result<HashMap<String, String>> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(id, doc)| {
                doc.transcript_id
                    .as_ref()
                    .map(|tid| (tid.clone(), doc_url(id)))
            })
            .collect())
    }

    async fn create_document(
        &self,
        _folder_id: &str,
        _name: &str,
        body: &str,
        transcript_id: &str,
    ) -> Result<ArchivedDoc> {
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.insert(&id, Some(transcript_id), body, false);
        Ok(ArchivedDoc {
            url: doc_url(&id),
            id,
        })
    }

    async fn document_text(&self, doc_id: &str) -> Result<String> {
        self.docs
            .lock()
            .unwrap()
            .get(doc_id)
            .map(|d| d.body.clone())
            .ok_or_else(|| anyhow!("no such document {}", doc_id))
    }

    async fn is_processed(&self, doc_id: &str) -> Result<bool> {
        self.docs
            .lock()
            .unwrap()
            .get(doc_id)
            .map(|d| d.processed)
            .ok_or_else(|| anyhow!("no such document {}", doc_id))
    }

    async fn mark_processed(&self, doc_id: &str) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(doc_id)
            .ok_or_else(|| anyhow!("no such document {}", doc_id))?;
        doc.processed = true;
        Ok(())
    }
}

// ============================================================================
// Transcript source fake
// ============================================================================

pub struct FakeSource {
    pub records: Vec<TranscriptRecord>,
}

#[async_trait]
impl TranscriptSource for FakeSource {
    async fn fetch_transcripts(&self) -> Result<Vec<TranscriptRecord>> {
        Ok(self.records.clone())
    }
}

/// A transcript whose meeting ran `minutes` and has substantial text.
pub fn transcript(id: &str, calendar_id: &str, minutes: f64) -> TranscriptRecord {
    TranscriptRecord {
        id: id.to_string(),
        calendar_id: Some(calendar_id.to_string()),
        title: Some(format!("Meeting {}", id)),
        sentences: Some(vec![
            Utterance {
                speaker_name: "Alice".to_string(),
                text: "Thanks everyone for joining today.".to_string(),
                start_time: 0.0,
                end_time: 5.0,
            },
            Utterance {
                speaker_name: "Bob".to_string(),
                text: "Glad to be here.".to_string(),
                start_time: 5.0,
                end_time: minutes * 60.0,
            },
        ]),
    }
}

// ============================================================================
// Analysis model fake
// ============================================================================

pub struct FakeModel {
    fail: AtomicBool,
    result: Mutex<AnalysisResult>,
    calls: AtomicUsize,
}

impl FakeModel {
    pub fn succeeding(result: AnalysisResult) -> Self {
        Self {
            fail: AtomicBool::new(false),
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let model = Self::succeeding(AnalysisResult::default());
        model.fail.store(true, Ordering::SeqCst);
        model
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisModel for FakeModel {
    async fn analyze(&self, _prompt: &str) -> Result<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("response did not match the schema"));
        }
        Ok(self.result.lock().unwrap().clone())
    }
}
