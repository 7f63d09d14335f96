//! The live terminal channel and the transcript it feeds.
//!
//! A pump task owns the WebSocket and forwards what it sees, tagged with the
//! epoch of the session that spawned it, into one ordered channel. The
//! [`TerminalStream`] applies those events on the caller's loop; anything
//! tagged with an older epoch belongs to a channel that is already closed
//! and is dropped.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::{ClientError, Result};
use crate::negotiator::SessionHandle;
use crate::transcript::Transcript;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    /// Transient: teardown moves straight on to `Idle`.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// The operator asked to disconnect.
    Local,
    /// The remote end closed the channel.
    Remote,
    /// The channel failed to open or broke.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Opened,
    Frame(String),
    Closed(CloseCause),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEnvelope {
    pub epoch: u64,
    pub event: StreamEvent,
}

impl StreamEnvelope {
    pub fn new(epoch: u64, event: StreamEvent) -> Self {
        Self { epoch, event }
    }
}

/// What applying an event changed, for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    Opened,
    Appended { line_count: usize },
    Disconnected(CloseCause),
}

pub type EventSender = mpsc::UnboundedSender<StreamEnvelope>;
pub type EventReceiver = mpsc::UnboundedReceiver<StreamEnvelope>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy)]
enum StreamControl {
    Shutdown,
}

pub struct TerminalStream {
    state: StreamState,
    epoch: u64,
    transcript: Transcript,
    handle: Option<SessionHandle>,
    control_tx: Option<mpsc::Sender<StreamControl>>,
}

impl Default for TerminalStream {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalStream {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            epoch: 0,
            transcript: Transcript::new(),
            handle: None,
            control_tx: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn handle(&self) -> Option<&SessionHandle> {
        self.handle.as_ref()
    }

    /// Idle -> Connecting without any I/O. Returns the epoch events for this
    /// session must carry.
    pub fn begin(&mut self, handle: SessionHandle) -> Result<u64> {
        if self.state != StreamState::Idle {
            return Err(ClientError::SessionLive);
        }
        self.epoch += 1;
        self.state = StreamState::Connecting;
        self.handle = Some(handle);
        Ok(self.epoch)
    }

    /// Opens the channel for `handle` and starts forwarding its frames into
    /// `events`.
    pub fn open(&mut self, handle: SessionHandle, events: EventSender) -> Result<()> {
        let url = handle.stream_url.clone();
        let epoch = self.begin(handle)?;
        let (control_tx, control_rx) = mpsc::channel(4);
        self.control_tx = Some(control_tx);

        tracing::debug!(target = "easyshell::stream", epoch, "opening stream");
        tokio::spawn(pump(epoch, url, events, control_rx));
        Ok(())
    }

    /// Applies one event from the pump. Returns `None` when the event was
    /// stale or did not change anything.
    pub fn apply(&mut self, envelope: StreamEnvelope) -> Option<StreamUpdate> {
        if envelope.epoch != self.epoch || self.state == StreamState::Idle {
            tracing::trace!(
                target = "easyshell::stream",
                epoch = envelope.epoch,
                current = self.epoch,
                "dropping event from closed channel"
            );
            return None;
        }

        match envelope.event {
            StreamEvent::Opened if self.state == StreamState::Connecting => {
                self.state = StreamState::Streaming;
                tracing::info!(target = "easyshell::stream", epoch = self.epoch, "streaming");
                Some(StreamUpdate::Opened)
            }
            StreamEvent::Opened => None,
            StreamEvent::Frame(line) if self.state == StreamState::Streaming => {
                let line_count = self.transcript.push(line);
                Some(StreamUpdate::Appended { line_count })
            }
            StreamEvent::Frame(_) => None,
            StreamEvent::Closed(cause) => {
                tracing::info!(
                    target = "easyshell::stream",
                    epoch = self.epoch,
                    cause = ?cause,
                    "stream closed"
                );
                self.teardown();
                Some(StreamUpdate::Disconnected(cause))
            }
        }
    }

    /// Local disconnect. Closes the channel and tears down immediately; the
    /// pump's own close report arrives later and is ignored. Returns false
    /// when there was nothing to disconnect.
    pub fn disconnect(&mut self) -> bool {
        if self.state == StreamState::Idle {
            return false;
        }
        if let Some(control_tx) = self.control_tx.take() {
            let _ = control_tx.try_send(StreamControl::Shutdown);
        }
        tracing::info!(target = "easyshell::stream", epoch = self.epoch, "disconnect requested");
        self.teardown();
        true
    }

    fn teardown(&mut self) {
        self.state = StreamState::Closed;
        self.transcript.clear();
        self.handle = None;
        self.control_tx = None;
        self.epoch += 1;
        self.state = StreamState::Idle;
    }
}

async fn pump(
    epoch: u64,
    url: Url,
    events: EventSender,
    mut control_rx: mpsc::Receiver<StreamControl>,
) {
    let emit = |event| {
        let _ = events.send(StreamEnvelope::new(epoch, event));
    };

    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = control_rx.recv() => {
            tracing::debug!(target = "easyshell::stream", epoch, "connect abandoned");
            return;
        }
    };

    let ws = match connected {
        Ok((ws, _)) => ws,
        Err(error) => {
            tracing::warn!(
                target = "easyshell::stream",
                epoch,
                host = %url.host_str().unwrap_or_default(),
                error = %error,
                "ws connect failed"
            );
            emit(StreamEvent::Closed(CloseCause::Error(error.to_string())));
            return;
        }
    };
    emit(StreamEvent::Opened);

    let (mut write, mut read) = ws.split();
    let cause = loop {
        tokio::select! {
            ctrl = control_rx.recv() => {
                match ctrl {
                    Some(StreamControl::Shutdown) | None => {
                        let _ = write.close().await;
                        break CloseCause::Local;
                    }
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => emit(StreamEvent::Frame(text)),
                    Some(Ok(Message::Binary(bytes))) => {
                        emit(StreamEvent::Frame(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseCause::Remote,
                    Some(Err(error)) => {
                        tracing::warn!(target = "easyshell::stream", epoch, error = %error, "ws read error");
                        break CloseCause::Error(error.to_string());
                    }
                    _ => {}
                }
            }
        }
    };

    emit(StreamEvent::Closed(cause));
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn handle() -> SessionHandle {
        SessionHandle {
            remote_id: Uuid::nil(),
            stream_url: Url::parse("ws://127.0.0.1:1/ws/test").unwrap(),
            session_secret: Some("test".into()),
        }
    }

    fn streaming() -> (TerminalStream, u64) {
        let mut stream = TerminalStream::new();
        let epoch = stream.begin(handle()).unwrap();
        assert_eq!(
            stream.apply(StreamEnvelope::new(epoch, StreamEvent::Opened)),
            Some(StreamUpdate::Opened)
        );
        (stream, epoch)
    }

    fn frame(epoch: u64, text: &str) -> StreamEnvelope {
        StreamEnvelope::new(epoch, StreamEvent::Frame(text.into()))
    }

    #[test]
    fn follows_idle_connecting_streaming() {
        let mut stream = TerminalStream::new();
        assert_eq!(stream.state(), StreamState::Idle);
        let epoch = stream.begin(handle()).unwrap();
        assert_eq!(stream.state(), StreamState::Connecting);
        assert!(stream.handle().is_some());
        stream.apply(StreamEnvelope::new(epoch, StreamEvent::Opened));
        assert_eq!(stream.state(), StreamState::Streaming);
    }

    #[test]
    fn frames_append_in_arrival_order() {
        let (mut stream, epoch) = streaming();
        for (i, text) in ["m1", "m2", "m3"].iter().enumerate() {
            assert_eq!(
                stream.apply(frame(epoch, text)),
                Some(StreamUpdate::Appended { line_count: i + 1 })
            );
        }
        assert_eq!(stream.transcript().lines(), ["m1", "m2", "m3"]);
    }

    #[test]
    fn only_one_session_at_a_time() {
        let (mut stream, _) = streaming();
        assert!(matches!(stream.begin(handle()), Err(ClientError::SessionLive)));
    }

    #[test]
    fn remote_close_clears_and_returns_to_idle() {
        let (mut stream, epoch) = streaming();
        stream.apply(frame(epoch, "$ ls"));
        let update = stream.apply(StreamEnvelope::new(
            epoch,
            StreamEvent::Closed(CloseCause::Remote),
        ));
        assert_eq!(update, Some(StreamUpdate::Disconnected(CloseCause::Remote)));
        assert_eq!(stream.state(), StreamState::Idle);
        assert!(stream.transcript().is_empty());
        assert!(stream.handle().is_none());
    }

    #[test]
    fn frames_queued_on_a_closed_channel_are_discarded() {
        let (mut stream, epoch) = streaming();
        stream.apply(StreamEnvelope::new(
            epoch,
            StreamEvent::Closed(CloseCause::Remote),
        ));
        assert_eq!(stream.apply(frame(epoch, "late")), None);
        assert!(stream.transcript().is_empty());

        let next = stream.begin(handle()).unwrap();
        assert_ne!(next, epoch);
        stream.apply(StreamEnvelope::new(next, StreamEvent::Opened));
        assert_eq!(stream.apply(frame(epoch, "stale")), None);
        stream.apply(frame(next, "fresh"));
        assert_eq!(stream.transcript().lines(), ["fresh"]);
    }

    #[test]
    fn local_disconnect_ignores_the_pumps_late_close() {
        let (mut stream, epoch) = streaming();
        stream.apply(frame(epoch, "m1"));
        assert!(stream.disconnect());
        assert_eq!(stream.state(), StreamState::Idle);
        assert!(stream.transcript().is_empty());
        assert_eq!(
            stream.apply(StreamEnvelope::new(
                epoch,
                StreamEvent::Closed(CloseCause::Local)
            )),
            None
        );
        assert!(!stream.disconnect());
    }

    #[test]
    fn connect_failure_collapses_to_idle() {
        let mut stream = TerminalStream::new();
        let epoch = stream.begin(handle()).unwrap();
        let update = stream.apply(StreamEnvelope::new(
            epoch,
            StreamEvent::Closed(CloseCause::Error("refused".into())),
        ));
        assert!(matches!(update, Some(StreamUpdate::Disconnected(CloseCause::Error(_)))));
        assert_eq!(stream.state(), StreamState::Idle);
    }

    #[test]
    fn frames_before_open_are_not_recorded() {
        let mut stream = TerminalStream::new();
        let epoch = stream.begin(handle()).unwrap();
        assert_eq!(stream.apply(frame(epoch, "early")), None);
        assert!(stream.transcript().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_closed() {
        let (tx, mut rx) = event_channel();
        let mut stream = TerminalStream::new();
        stream.open(handle(), tx).unwrap();

        let envelope = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("pump should report")
            .expect("channel open");
        assert!(matches!(
            envelope.event,
            StreamEvent::Closed(CloseCause::Error(_))
        ));
        stream.apply(envelope);
        assert_eq!(stream.state(), StreamState::Idle);
    }
}
