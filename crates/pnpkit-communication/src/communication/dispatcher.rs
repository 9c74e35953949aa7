//! Command dispatcher
//!
//! Pairs exactly one written command with the response lines that follow it.
//! The dispatcher takes `&mut self`, so whoever owns it (the driver's command
//! lock) guarantees a single command in flight.

use super::{LineTransport, ResponseChannel};
use pnpkit_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for the first response line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTimeout {
    /// Fail with a timeout after this long
    Bounded(Duration),
    /// Wait until a line arrives or the reader stops
    Unbounded,
}

impl From<Duration> for ResponseTimeout {
    fn from(timeout: Duration) -> Self {
        ResponseTimeout::Bounded(timeout)
    }
}

/// Serializes command issuance and collects responses
pub struct CommandDispatcher {
    transport: Arc<dyn LineTransport>,
    channel: ResponseChannel,
}

impl CommandDispatcher {
    /// Create a dispatcher writing to `transport` and reading from `channel`
    pub fn new(transport: Arc<dyn LineTransport>, channel: ResponseChannel) -> Self {
        Self { transport, channel }
    }

    /// Send `command` (if any) and collect its response lines.
    ///
    /// Lines already buffered before the write are drained first and lead
    /// the result, so stale output never masquerades as this command's
    /// reply. After the first awaited line arrives, any lines that are
    /// already queued behind it are appended too.
    ///
    /// With `command = None` this only drains and waits, which is how
    /// startup chatter is flushed.
    ///
    /// A timeout does not retract a written command; the next call's drain
    /// absorbs whatever the controller sends late.
    pub async fn dispatch(
        &mut self,
        command: Option<&str>,
        timeout: impl Into<ResponseTimeout>,
    ) -> Result<Vec<String>> {
        let timeout = timeout.into();
        let mut responses = Vec::new();

        if self.channel.drain_into(&mut responses) {
            return Err(self.channel.closed_error());
        }
        if !responses.is_empty() {
            tracing::debug!("Drained stale responses: {:?}", responses);
        }

        if let Some(command) = command {
            tracing::debug!(">> {}", command);
            self.transport.write_line(command)?;
        }

        let first = match timeout {
            ResponseTimeout::Unbounded => self.channel.recv().await,
            ResponseTimeout::Bounded(limit) => {
                match tokio::time::timeout(limit, self.channel.recv()).await {
                    Ok(line) => line,
                    Err(_) => return Err(Error::timeout(command, limit.as_millis() as u64)),
                }
            }
        };

        match first {
            Some(line) => responses.push(line),
            None => return Err(self.channel.closed_error()),
        }
        self.channel.drain_into(&mut responses);

        tracing::debug!("{} => {:?}", command.unwrap_or("<none>"), responses);
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::{MockTransport, ResponseReader};

    fn start(transport: &Arc<MockTransport>) -> (crate::communication::ReaderHandle, CommandDispatcher) {
        transport.open().unwrap();
        let (reader, channel) =
            ResponseReader::spawn(transport.clone(), Duration::from_millis(10)).unwrap();
        (reader, CommandDispatcher::new(transport.clone(), channel))
    }

    #[tokio::test]
    async fn test_command_returns_reply() {
        let transport = Arc::new(MockTransport::new());
        let (mut reader, mut dispatcher) = start(&transport);

        let lines = dispatcher
            .dispatch(Some("G21"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(lines, vec!["ok".to_string()]);
        assert_eq!(transport.writes(), vec!["G21".to_string()]);

        reader.join(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_timeout_names_command() {
        let transport = Arc::new(MockTransport::silent());
        let (mut reader, mut dispatcher) = start(&transport);

        let err = dispatcher
            .dispatch(Some("M400"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("M400"));

        reader.join(Duration::from_secs(1)).await;
    }
}
