// src/bridge.rs

//! Line-delimited JSON transport between the front end and the router.
//!
//! Commands are read from `input` one per line; events are written to
//! `output` one per line, in publication order.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::protocol::{parse_command, Event};
use crate::router::Router;

/// Pump commands and events until `input` reaches end of file.
///
/// Events still queued at that point stay in `events`; use [`flush_events`]
/// after shutdown to deliver them.
pub async fn serve<R, W>(
    router: &Router,
    events: &mut mpsc::UnboundedReceiver<Event>,
    input: R,
    output: &mut W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading command stream")? else {
                    info!("command stream closed");
                    return Ok(());
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_command(line) {
                    Ok(command) => router.dispatch(command).await,
                    Err((action, err)) => router.reject(&action, &err),
                }
            }
            Some(event) = events.recv() => {
                write_event(output, &event).await?;
            }
        }
    }
}

/// Write every event that is already queued.
pub async fn flush_events<W>(events: &mut mpsc::UnboundedReceiver<Event>, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Ok(event) = events.try_recv() {
        write_event(output, &event).await?;
    }
    output.flush().await.context("flushing event stream")?;
    Ok(())
}

async fn write_event<W>(output: &mut W, event: &Event) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(event).context("encoding event")?;
    debug!(event = %line, "sending event");
    line.push('\n');
    output
        .write_all(line.as_bytes())
        .await
        .context("writing event")?;
    output.flush().await.context("flushing event stream")?;
    Ok(())
}
