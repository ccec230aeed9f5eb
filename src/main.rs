use anyhow::Result;
use taskhours::cli::run_cli;
use tracing::error;


#[tokio::main]
async fn main() -> Result<()> {

    run_cli().await.inspect_err(|e| {
        error!("Error running cli {e:?}");
    })?;
    Ok(())
}
