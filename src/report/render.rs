use std::{future::Future, path::PathBuf};

use anyhow::Result;
use tracing::debug;

use super::Report;

/// Renders the report as a Markdown document. The output is stable: the
/// same report always renders to the same bytes. Hours carry one decimal,
/// percentages none, projects of a task are joined with a line break
/// marker.
pub fn render_markdown(report: &Report) -> String {
    let mut document = String::new();

    document.push_str(&format!("#Taskhours {} report\n", report.window.spec()));
    document.push_str("|Task|Projects|Hours|Percentage|\n");
    document.push_str("|:-|:-:|-:|-:|\n");

    for row in &report.rows {
        document.push_str(&format!(
            "|{}|{}|{:.1}|{:.0}%|\n",
            row.name,
            row.projects.join("<br>"),
            row.hours,
            row.percentage,
        ));
    }

    document.push_str("|||||\n");
    document.push_str(&format!("|**Total**||{:.1}|100%|\n", report.total_hours));

    document
}

/// Where the rendered document ends up. The aggregation core hands the
/// finished document over and knows nothing about paths or viewers.
pub trait ReportSink {
    fn display(&self, document: &str) -> impl Future<Output = Result<()>>;
}

/// Writes the document next to the rest of the application data and echoes
/// it to stdout.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportSink for FileSink {
    async fn display(&self, document: &str) -> Result<()> {
        tokio::fs::write(&self.path, document).await?;
        debug!("Wrote report to {:?}", self.path);
        print!("{document}");
        Ok(())
    }
}
