use std::path::Path;

use anyhow::Result;
use chrono::Utc;

use crate::{
    report::{
        aggregate,
        render::{render_markdown, FileSink, ReportSink},
        window::ReportWindow,
    },
    store::history::{HistoryStore, HistoryStoreImpl},
};

use super::{HISTORY_FILE, REPORT_FILE};

/// Command to process `report` command. Aggregates the local interval
/// history over the given trailing window and hands the rendered document
/// to the sink.
pub async fn process_report_command(app_dir: &Path, window: ReportWindow) -> Result<()> {
    let history = HistoryStoreImpl::new(app_dir.join(HISTORY_FILE))
        .load()
        .await?;

    let report = aggregate(&window, &history, Utc::now());
    let document = render_markdown(&report);

    let sink = FileSink::new(app_dir.join(REPORT_FILE));
    sink.display(&document).await?;
    Ok(())
}
