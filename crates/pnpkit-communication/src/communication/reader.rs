//! Response reader
//!
//! A dedicated thread pulls lines from the [`LineTransport`] and publishes
//! every non-empty, trimmed line on an unbounded FIFO channel. A read that
//! times out without data is not an error; the loop re-checks its stop flag
//! and reads again, so a disconnect is noticed even on a silent link. A read
//! error is fatal: the thread records the cause and exits, which closes the
//! channel.

use super::LineTransport;
use crate::firmware::openbuilds::response_parser::ResponseKind;
use parking_lot::Mutex;
use pnpkit_core::{ConnectionError, Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Receiving end of the reader's line stream
pub struct ResponseChannel {
    rx: mpsc::UnboundedReceiver<String>,
    fault: Arc<Mutex<Option<String>>>,
}

impl ResponseChannel {
    /// Move every buffered line into `out` without blocking.
    ///
    /// Returns `true` once the reader has stopped and nothing more will arrive.
    pub fn drain_into(&mut self, out: &mut Vec<String>) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(line) => out.push(line),
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Wait for the next line; `None` once the reader has stopped
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Error describing why the reader stopped
    pub fn closed_error(&self) -> Error {
        match self.fault.lock().as_ref() {
            Some(reason) => Error::transport_fault(reason.clone()),
            None => Error::transport_fault("response reader stopped"),
        }
    }
}

/// Handle to a running response reader thread
pub struct ReaderHandle {
    stop: Arc<AtomicBool>,
    finished: oneshot::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Whether the reader thread is still looping
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the reader to stop and wait up to `timeout` for it to exit.
    ///
    /// Returns `false` if the thread did not exit in time. The thread then
    /// keeps running until its pending read returns, and a line that read
    /// yields is dropped. Keep the handle and join again before reopening
    /// the transport it reads from.
    pub async fn join(&mut self, timeout: Duration) -> bool {
        self.stop.store(true, Ordering::Release);
        if self.thread.is_none() {
            return true;
        }

        match tokio::time::timeout(timeout, &mut self.finished).await {
            Ok(_) => {
                if let Some(thread) = self.thread.take() {
                    if thread.is_finished() && thread.join().is_err() {
                        tracing::warn!("Response reader thread panicked");
                    }
                }
                true
            }
            Err(_) => {
                tracing::warn!("Response reader did not stop within {:?}", timeout);
                false
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Spawns the background line reader
pub struct ResponseReader;

impl ResponseReader {
    /// Start reading from `transport`, bounding each read by `poll`.
    ///
    /// Every reader gets a fresh stop flag, so a previous disconnect never
    /// leaks into the next session.
    pub fn spawn(
        transport: Arc<dyn LineTransport>,
        poll: Duration,
    ) -> Result<(ReaderHandle, ResponseChannel)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = oneshot::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let fault = Arc::new(Mutex::new(None));

        let thread_stop = stop.clone();
        let thread_fault = fault.clone();
        let thread = std::thread::Builder::new()
            .name("pnpkit-reader".to_string())
            .spawn(move || {
                let _finished = finished_tx;
                read_loop(transport.as_ref(), poll, &thread_stop, &thread_fault, &tx);
            })?;

        Ok((
            ReaderHandle {
                stop,
                finished: finished_rx,
                thread: Some(thread),
            },
            ResponseChannel { rx, fault },
        ))
    }
}

fn read_loop(
    transport: &dyn LineTransport,
    poll: Duration,
    stop: &AtomicBool,
    fault: &Mutex<Option<String>>,
    tx: &mpsc::UnboundedSender<String>,
) {
    tracing::debug!("Response reader started");

    while !stop.load(Ordering::Acquire) {
        let line = match transport.read_line(poll) {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("Read error, response reader stopping: {}", e);
                *fault.lock() = Some(match e {
                    Error::Connection(ConnectionError::TransportFault { reason }) => reason,
                    other => other.to_string(),
                });
                return;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        tracing::debug!("<< {}", line);
        if let ResponseKind::Error(reason) = ResponseKind::classify(line) {
            tracing::warn!("Controller reported error: {}", reason);
        }

        if tx.send(line.to_string()).is_err() {
            tracing::debug!("Response channel dropped, reader exiting");
            return;
        }
    }

    tracing::debug!("Response reader stopped");
}
