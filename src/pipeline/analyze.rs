//! Analysis stage: run the structured sales analysis over recently
//! archived meetings and write the result blocks back.
//!
//! The processed tag on a document is flipped only after its data
//! write succeeds, so a lost analysis is retried on the next run.

use crate::analysis::{self, AnalysisModel, AUDIT_FIELDS, BUSINESS_FIELDS};
use crate::config::Config;
use crate::docs::{self, DocumentStore};
use crate::pipeline::propagate::ResolvedColumns;
use crate::sheets::{range, writer, RangeUpdate, RateLimiter, SpreadsheetStore};
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

pub async fn run(
    docs: &dyn DocumentStore,
    sheets: &dyn SpreadsheetStore,
    model: &dyn AnalysisModel,
    cfg: &Config,
    columns: &ResolvedColumns,
    limiter: &mut RateLimiter,
) -> Result<usize> {
    let template = fetch_template(sheets, cfg).await?;

    let master_tab = &cfg.sheets.master_tab;
    let urls = sheets
        .get_range(
            &cfg.sheets.master_spreadsheet_id,
            &range::column_from(master_tab, &cfg.columns.master_archive_url, 2),
        )
        .await
        .context("Reading master archive links")?;
    let briefs = match sheets
        .get_range(
            &cfg.sheets.master_spreadsheet_id,
            &range::column_from(master_tab, &cfg.columns.master_brief_url, 2),
        )
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Could not read brief links, continuing without: {}", e);
            Vec::new()
        }
    };

    // Only the most recent window is scanned to bound model cost.
    let start = urls.len().saturating_sub(cfg.pipeline.analysis_window_rows);

    let business_end = block_end(&cfg.columns.business_block_start, BUSINESS_FIELDS.len());
    let audit_end = block_end(&cfg.columns.audit_block_start, AUDIT_FIELDS.len());

    let mut analyzed = 0usize;

    for (offset, row) in urls.iter().enumerate().skip(start) {
        let url = row.first().map(String::as_str).unwrap_or_default();
        if url.is_empty() {
            continue;
        }
        let Some(doc_id) = docs::doc_id_from_url(url) else {
            warn!("Unrecognized archive link '{}', skipping", url);
            continue;
        };

        match docs.is_processed(&doc_id).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                warn!("Could not read processed tag for {}: {:#}", doc_id, e);
                continue;
            }
        }

        let transcript = match docs.document_text(&doc_id).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not read document {}: {:#}", doc_id, e);
                continue;
            }
        };
        if transcript.trim().is_empty() {
            debug!("Document {} is empty, skipping", doc_id);
            continue;
        }

        let brief = brief_text(docs, &briefs, offset).await;

        let prompt = analysis::build_prompt(
            &template,
            &transcript,
            &brief,
            cfg.model.max_transcript_chars,
        );

        let result = match model.analyze(&prompt).await {
            Ok(result) => result,
            Err(e) => {
                // Failed analysis leaves no marker; retried next run.
                warn!("Analysis failed for document {}: {:#}", doc_id, e);
                continue;
            }
        };

        let row_number = offset + 2;
        let updates = vec![
            RangeUpdate::new(
                range::span(
                    master_tab,
                    &cfg.columns.business_block_start,
                    row_number,
                    &business_end,
                    row_number,
                ),
                vec![result.business_values()],
            ),
            RangeUpdate::new(
                range::span(
                    &cfg.sheets.audit_tab,
                    &cfg.columns.audit_block_start,
                    row_number,
                    &audit_end,
                    row_number,
                ),
                vec![result.audit_values()],
            ),
            RangeUpdate::cell(
                range::cell(master_tab, &columns.master_owner_sync, row_number),
                "TRUE",
            ),
            RangeUpdate::cell(
                range::cell(&cfg.sheets.audit_tab, &columns.audit_owner_sync, row_number),
                "TRUE",
            ),
        ];

        limiter.register_call().await;
        let ok = writer::batch_set(
            sheets,
            &cfg.sheets.master_spreadsheet_id,
            &updates,
            cfg.limits.write_retries,
        )
        .await;
        if !ok {
            warn!(
                "Analysis write failed for document {}; tag left unset",
                doc_id
            );
            continue;
        }

        // Data is confirmed written; only now is re-analysis fenced off.
        if let Err(e) = docs.mark_processed(&doc_id).await {
            warn!(
                "Could not mark document {} processed; it will be re-analyzed: {:#}",
                doc_id, e
            );
        }

        analyzed += 1;
        tokio::time::sleep(Duration::from_secs(cfg.pipeline.record_delay_secs)).await;
    }

    info!("Analyzed {} meetings", analyzed);
    Ok(analyzed)
}

async fn fetch_template(sheets: &dyn SpreadsheetStore, cfg: &Config) -> Result<String> {
    let rows = sheets
        .get_range(&cfg.sheets.prompts_spreadsheet_id, &cfg.sheets.prompts_cell)
        .await
        .context("Reading prompt template")?;
    let template = rows
        .first()
        .and_then(|row| row.first())
        .cloned()
        .unwrap_or_default();
    if template.trim().is_empty() {
        bail!(
            "Prompt template cell {} is empty",
            cfg.sheets.prompts_cell
        );
    }
    Ok(template)
}

/// Optional grounding context from the row's brief document.
async fn brief_text(docs: &dyn DocumentStore, briefs: &[Vec<String>], offset: usize) -> String {
    let url = briefs
        .get(offset)
        .and_then(|row| row.first())
        .map(String::as_str)
        .unwrap_or_default();
    if url.is_empty() {
        return String::new();
    }
    let Some(doc_id) = docs::doc_id_from_url(url) else {
        return String::new();
    };
    match docs.document_text(&doc_id).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not read brief document {}: {:#}", doc_id, e);
            String::new()
        }
    }
}

fn block_end(start_col: &str, width: usize) -> String {
    let start = range::column_index(start_col).max(1);
    range::column_letter(start + width - 1)
}
