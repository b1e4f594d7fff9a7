//! NavTrail daemon
//!
//! Reads JSON lines on stdin (RPC requests and browser events) and writes RPC
//! responses as JSON lines on stdout. Logs go to stderr.

mod protocol;
mod tabs;

use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use navtrail_core::{dispatch, Config, Tracker};
use protocol::{parse_line, Control, Inbound};
use tabs::TrackedTabs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    navtrail_core::init_logging();

    let config = Config::default();
    let tabs = Arc::new(TrackedTabs::default());
    let tracker = Tracker::new(config, tabs.clone()).context("failed to open tracker")?;
    tracker.initialize().context("failed to initialize tracker")?;
    tracker.start();

    tracing::info!(
        database = %tracker.config().database_path.display(),
        "NavTrail daemon started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match parse_line(&line) {
            None => {}
            Some(Err(e)) => tracing::warn!(error = %e, "Ignoring malformed input line"),
            Some(Ok(Inbound::Event(signal))) => {
                tabs.observe(&signal);
                tracker.handle_signal(signal);
            }
            Some(Ok(Inbound::Control(Control::TabsSnapshot { tabs: snapshot }))) => {
                tabs.replace(snapshot);
            }
            Some(Ok(Inbound::Request(request))) => {
                let response = dispatch(&tracker, &request);
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
    }

    tracker.shutdown();
    tracing::info!(open_tabs = tabs.len(), "NavTrail daemon stopped");
    Ok(())
}
