//! Operator input read on a dedicated thread.
//!
//! Tokio's stdin reads on the blocking pool and a pending read cannot be
//! cancelled, so an abandoned read would hold up runtime shutdown until the
//! operator pressed Enter. Lines are read on a detached OS thread instead and
//! handed to the runtime through an in-memory pipe.

use std::io::BufRead;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const PIPE_CAPACITY: usize = 64 * 1024;
const PENDING_LINES: usize = 16;

/// Starts reading lines from `source` on a detached thread.
///
/// The returned reader yields the same bytes as `source` and reaches end of
/// input once `source` does. Dropping it leaves the thread blocked in its
/// current read; the thread never delays runtime shutdown.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns the I/O error raised when the reader thread cannot be spawned.
pub fn spawn_line_reader<S>(source: S) -> std::io::Result<BufReader<DuplexStream>>
where
    S: BufRead + Send + 'static,
{
    let (lines_tx, lines_rx) = mpsc::channel(PENDING_LINES);
    std::thread::Builder::new()
        .name("hexpilot-input".to_owned())
        .spawn(move || read_lines(source, &lines_tx))?;

    let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
    tokio::spawn(forward_lines(lines_rx, writer));
    Ok(BufReader::new(reader))
}

fn read_lines<S: BufRead>(mut source: S, lines: &mpsc::Sender<String>) {
    loop {
        let mut line = String::new();
        match source.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if lines.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to read operator input");
                break;
            }
        }
    }
    debug!("operator input closed");
}

async fn forward_lines(mut lines: mpsc::Receiver<String>, mut pipe: DuplexStream) {
    while let Some(line) = lines.recv().await {
        if pipe.write_all(line.as_bytes()).await.is_err() {
            return;
        }
    }
}
