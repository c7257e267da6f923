//! Cross-sheet propagation stage: copy archive links and durations
//! from the tracking table into the master and audit tabs, exactly
//! once per meeting, and raise the owner-sync dirty bit.

use crate::config::{Config, MatchMode};
use crate::sheets::{range, BatchAccumulator, RangeUpdate, SpreadsheetStore};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// Column letters resolved from header names once per run.
#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    pub master_owner_sync: String,
    pub master_meeting_done: String,
    pub audit_owner_sync: String,
}

/// Resolve the required headers in the master and audit tabs. A
/// missing header is a setup failure that aborts the run.
pub async fn resolve_headers(
    sheets: &dyn SpreadsheetStore,
    cfg: &Config,
) -> Result<ResolvedColumns> {
    let master_headers = header_row(sheets, cfg, &cfg.sheets.master_tab).await?;
    let audit_headers = header_row(sheets, cfg, &cfg.sheets.audit_tab).await?;

    let resolved = ResolvedColumns {
        master_owner_sync: find_header(
            &master_headers,
            &cfg.columns.owner_sync_header,
            &cfg.sheets.master_tab,
        )?,
        master_meeting_done: find_header(
            &master_headers,
            &cfg.columns.meeting_done_header,
            &cfg.sheets.master_tab,
        )?,
        audit_owner_sync: find_header(
            &audit_headers,
            &cfg.columns.owner_sync_header,
            &cfg.sheets.audit_tab,
        )?,
    };

    debug!(
        "Resolved headers: owner sync {}/{}, meeting done {}",
        resolved.master_owner_sync, resolved.audit_owner_sync, resolved.master_meeting_done
    );
    Ok(resolved)
}

async fn header_row(
    sheets: &dyn SpreadsheetStore,
    cfg: &Config,
    tab: &str,
) -> Result<Vec<String>> {
    let rows = sheets
        .get_range(&cfg.sheets.master_spreadsheet_id, &format!("{}!1:1", tab))
        .await
        .with_context(|| format!("Reading header row of {}", tab))?;
    Ok(rows.into_iter().next().unwrap_or_default())
}

fn find_header(headers: &[String], name: &str, tab: &str) -> Result<String> {
    match headers.iter().position(|h| h == name) {
        Some(index) => Ok(range::column_letter(index + 1)),
        None => bail!("Required header '{}' not found in tab '{}'", name, tab),
    }
}

/// Pick the master row for a calendar id. Returns a 0-based offset
/// into the data rows.
fn match_row(calendar_ids: &[String], wanted: &str, mode: MatchMode) -> Option<usize> {
    if wanted.is_empty() {
        return None;
    }
    match mode {
        MatchMode::First => calendar_ids.iter().position(|id| id == wanted),
        MatchMode::Latest => calendar_ids.iter().rposition(|id| id == wanted),
    }
}

pub async fn run(
    sheets: &dyn SpreadsheetStore,
    cfg: &Config,
    columns: &ResolvedColumns,
) -> Result<usize> {
    let tracking_range = format!("{}!A2:G", cfg.sheets.tracking_tab);
    let tracking = sheets
        .get_range(&cfg.sheets.tracking_spreadsheet_id, &tracking_range)
        .await
        .context("Reading tracking table")?;

    let master_tab = &cfg.sheets.master_tab;
    let audit_tab = &cfg.sheets.audit_tab;

    let calendar_ids: Vec<String> = column_values(
        sheets
            .get_range(
                &cfg.sheets.master_spreadsheet_id,
                &range::column_from(master_tab, &cfg.columns.master_calendar_id, 2),
            )
            .await
            .context("Reading master calendar ids")?,
    );
    let master_urls: HashSet<String> = column_values(
        sheets
            .get_range(
                &cfg.sheets.master_spreadsheet_id,
                &range::column_from(master_tab, &cfg.columns.master_archive_url, 2),
            )
            .await
            .context("Reading master archive links")?,
    )
    .into_iter()
    .filter(|url| !url.is_empty())
    .collect();

    let mut batch = BatchAccumulator::new(
        cfg.sheets.master_spreadsheet_id.clone(),
        cfg.pipeline.flush_threshold,
        cfg.limits.write_retries,
    );
    let mut propagated = 0usize;

    for row in &tracking {
        let calendar_id = cell_at(row, 0);
        let title = cell_at(row, 1);
        let archive_url = cell_at(row, 3);
        let duration = cell_at(row, 5);
        let conducted = cell_at(row, 6);

        if archive_url.is_empty() {
            continue;
        }
        // Already propagated on an earlier run.
        if master_urls.contains(archive_url) {
            continue;
        }

        let Some(offset) = match_row(&calendar_ids, calendar_id, cfg.pipeline.master_match)
        else {
            // Meeting not scheduled in the master table yet.
            debug!("No master row for calendar id {}", calendar_id);
            continue;
        };
        let row_number = offset + 2;

        let link_rows = vec![vec![archive_url.to_string(), duration.to_string()]];
        batch
            .queue(
                sheets,
                RangeUpdate::new(
                    range::span(
                        master_tab,
                        &cfg.columns.master_archive_url,
                        row_number,
                        &cfg.columns.master_duration,
                        row_number,
                    ),
                    link_rows.clone(),
                ),
            )
            .await;
        batch
            .queue(
                sheets,
                RangeUpdate::new(
                    range::span(
                        audit_tab,
                        &cfg.columns.audit_archive_url,
                        row_number,
                        &cfg.columns.audit_duration,
                        row_number,
                    ),
                    link_rows,
                ),
            )
            .await;
        batch
            .queue(
                sheets,
                RangeUpdate::cell(
                    range::cell(master_tab, &columns.master_owner_sync, row_number),
                    "TRUE",
                ),
            )
            .await;
        batch
            .queue(
                sheets,
                RangeUpdate::cell(
                    range::cell(audit_tab, &columns.audit_owner_sync, row_number),
                    "TRUE",
                ),
            )
            .await;
        if !conducted.is_empty() {
            batch
                .queue(
                    sheets,
                    RangeUpdate::cell(
                        range::cell(master_tab, &columns.master_meeting_done, row_number),
                        conducted,
                    ),
                )
                .await;
        }

        debug!("Propagated archive link for {}", title);
        propagated += 1;
    }

    batch.flush(sheets).await;

    info!("Propagated {} meetings into the master table", propagated);
    Ok(propagated)
}

fn column_values(rows: Vec<Vec<String>>) -> Vec<String> {
    rows.into_iter()
        .map(|row| row.into_iter().next().unwrap_or_default())
        .collect()
}

fn cell_at(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or_default()
}
