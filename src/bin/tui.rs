use anyhow::Result;
use fitcoach::context::{AppContext, StandardContext};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::OpenOptions;

#[tokio::main]
async fn main() -> Result<()> {
    // Log to a file; stderr belongs to the terminal UI.
    let ctx = StandardContext::new(None);
    if let Some(log_path) = ctx.get_log_path()
        && let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path)
    {
        let _ = WriteLogger::init(
            LevelFilter::Info,
            ConfigBuilder::new().set_time_format_rfc3339().build(),
            file,
        );
    }

    fitcoach::tui::run().await
}
