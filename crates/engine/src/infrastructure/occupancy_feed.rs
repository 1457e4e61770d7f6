//! Line-delimited JSON occupancy feed.
//!
//! Each line is one event, `at` being optional:
//!
//! ```json
//! {"event":"became_empty","world":"meadow"}
//! {"event":"gained_occupant","world":"meadow","at":"2025-05-01T08:00:00Z"}
//! ```
//!
//! Events without a timestamp are stamped with the clock on arrival.

use std::io::BufRead;
use std::sync::Arc;

use buildsys_domain::WorldName;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::ClockPort;
use crate::use_cases::OccupancyEvent;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FeedKind {
    BecameEmpty,
    GainedOccupant,
}

#[derive(Debug, Deserialize)]
struct FeedLine {
    event: FeedKind,
    world: WorldName,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
}

/// Parse one feed line. Blank lines yield `Ok(None)`.
pub fn parse_line(
    line: &str,
    now: DateTime<Utc>,
) -> Result<Option<OccupancyEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let FeedLine { event, world, at } = serde_json::from_str(line)?;
    let at = at.unwrap_or(now);
    Ok(Some(match event {
        FeedKind::BecameEmpty => OccupancyEvent::BecameEmpty { world, at },
        FeedKind::GainedOccupant => OccupancyEvent::GainedOccupant { world, at },
    }))
}

/// Read lines from `reader` on a dedicated OS thread.
///
/// A pending stdin read cannot be cancelled, so it must not be owned by the
/// runtime. The thread stops at EOF, on a read error, or once the receiver
/// is dropped.
pub fn read_lines_on_thread<R>(
    reader: R,
    capacity: usize,
) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    std::thread::Builder::new()
        .name("occupancy-feed".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Occupancy feed read failed");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Forward events parsed from `lines` until the input ends, `cancel` fires,
/// or the listener goes away. Malformed lines are logged and skipped.
///
/// Returns the number of events forwarded.
pub async fn forward_lines(
    mut lines: mpsc::Receiver<String>,
    sender: mpsc::Sender<OccupancyEvent>,
    clock: Arc<dyn ClockPort>,
    cancel: CancellationToken,
) -> usize {
    let mut forwarded = 0;
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            tracing::info!("Occupancy feed reached end of input");
            break;
        };
        match parse_line(&line, clock.now()) {
            Ok(Some(event)) => {
                if sender.send(event).await.is_err() {
                    tracing::debug!("Occupancy listener gone, stopping feed");
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "Skipping malformed occupancy line");
            }
        }
    }
    forwarded
}
