//! Transcript sync stage: pull new transcripts, archive each as a
//! tagged document, and append one tracking row per new transcript.
//!
//! Re-running is a no-op for anything already tracked; transcripts
//! whose utterances have not landed yet are left untouched so a later
//! run picks them up.

use crate::config::Config;
use crate::docs::DocumentStore;
use crate::sheets::{range, writer, SpreadsheetStore};
use crate::source::{classify, duration_minutes, render_transcript, TranscriptSource};
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

pub async fn run(
    source: &dyn TranscriptSource,
    docs: &dyn DocumentStore,
    sheets: &dyn SpreadsheetStore,
    cfg: &Config,
) -> Result<usize> {
    let transcripts = source
        .fetch_transcripts()
        .await
        .context("Fetching transcripts from source")?;

    let id_range = range::column_from(
        &cfg.sheets.tracking_tab,
        &cfg.columns.tracking_transcript_id,
        2,
    );
    let tracked: HashSet<String> = sheets
        .get_range(&cfg.sheets.tracking_spreadsheet_id, &id_range)
        .await
        .context("Reading tracked transcript ids")?
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .filter(|id| !id.is_empty())
        .collect();

    // One folder listing instead of an existence lookup per transcript.
    let archived = docs
        .list_tagged(&cfg.drive.archive_folder_id)
        .await
        .context("Listing archived documents")?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut pending = 0usize;

    for transcript in &transcripts {
        if tracked.contains(&transcript.id) {
            continue;
        }

        let sentences = match transcript.sentences.as_deref() {
            Some(sentences) if !sentences.is_empty() => sentences,
            _ => {
                // Transcription still in progress upstream; no marker is
                // written so the next run retries it.
                debug!("Transcript {} has no utterances yet", transcript.id);
                pending += 1;
                continue;
            }
        };

        let body = render_transcript(sentences);
        let duration = duration_minutes(sentences);
        let classification = classify(duration, &body);

        let archive_url = match archived.get(&transcript.id) {
            Some(url) => url.clone(),
            None => {
                match docs
                    .create_document(
                        &cfg.drive.archive_folder_id,
                        transcript.title_or_default(),
                        &body,
                        &transcript.id,
                    )
                    .await
                {
                    Ok(doc) => doc.url,
                    Err(e) => {
                        warn!(
                            "Could not archive transcript {}, skipping for this run: {:#}",
                            transcript.id, e
                        );
                        continue;
                    }
                }
            }
        };

        rows.push(vec![
            transcript.calendar_id.clone().unwrap_or_default(),
            transcript.title_or_default().to_string(),
            transcript.id.clone(),
            archive_url,
            format!("{}/{}", cfg.source.view_base_url, transcript.id),
            format!("{:.2}", duration),
            classification.label().to_string(),
        ]);
    }

    if pending > 0 {
        info!("{} transcripts still transcribing, left for next run", pending);
    }

    if rows.is_empty() {
        info!("No new transcripts to track");
        return Ok(0);
    }

    let appended = rows.len();
    let ok = writer::append_rows(
        sheets,
        &cfg.sheets.tracking_spreadsheet_id,
        &cfg.sheets.tracking_tab,
        &rows,
        cfg.limits.write_retries,
    )
    .await;

    if !ok {
        // Documents already created are found again next run via their
        // tags, so dropping the rows here loses nothing.
        error!("Tracking sheet append failed; rows will be rebuilt next run");
        return Ok(0);
    }

    info!("Tracked {} new transcripts", appended);
    Ok(appended)
}
