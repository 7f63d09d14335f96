//! The session controller: one owner for everything a single connect /
//! stream / disconnect cycle touches.
//!
//! All mutation happens through `&mut self` on the caller's loop. The pump
//! task only ever writes into the event channel, so the transcript has a
//! single writer.

use crate::broker::{BrokerClient, RemoteDescriptor};
use crate::context::ClientContext;
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventEmitter};
use crate::negotiator::{SessionHandle, SessionNegotiator};
use crate::registry::RegistryClient;
use crate::request::SessionRequestBuilder;
use crate::scroll::Viewport;
use crate::stream::{
    event_channel, CloseCause, EventReceiver, EventSender, StreamState, StreamUpdate,
    TerminalStream,
};
use crate::transcript::Transcript;

/// Viewport height used until the renderer reports its own, in rows.
pub const DEFAULT_VIEWPORT_ROWS: f64 = 24.0;

/// Each transcript line occupies one row.
const LINE_HEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Negotiating,
    Connecting,
    Streaming,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Negotiating => "negotiating",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
        }
    }
}

pub struct SessionController {
    ctx: ClientContext,
    registry: RegistryClient,
    negotiator: SessionNegotiator,
    stream: TerminalStream,
    viewport: Viewport,
    form: SessionRequestBuilder,
    notice: Option<String>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    emitter: EventEmitter,
}

impl SessionController {
    pub fn new(ctx: ClientContext, emitter: EventEmitter) -> Result<Self> {
        let broker = BrokerClient::new(&ctx)?;
        let (events_tx, events_rx) = event_channel();
        Ok(Self {
            registry: RegistryClient::new(broker.clone()),
            negotiator: SessionNegotiator::new(broker),
            stream: TerminalStream::new(),
            viewport: Viewport::new(DEFAULT_VIEWPORT_ROWS),
            form: SessionRequestBuilder::new(),
            notice: None,
            events_tx,
            events_rx,
            emitter,
            ctx,
        })
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    pub fn status(&self) -> SessionStatus {
        if self.negotiator.is_in_flight() {
            return SessionStatus::Negotiating;
        }
        match self.stream.state() {
            StreamState::Idle | StreamState::Closed => SessionStatus::Disconnected,
            StreamState::Connecting => SessionStatus::Connecting,
            StreamState::Streaming => SessionStatus::Streaming,
        }
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream.state()
    }

    pub fn session_handle(&self) -> Option<&SessionHandle> {
        self.stream.handle()
    }

    pub fn transcript(&self) -> &Transcript {
        self.stream.transcript()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Last message meant for the operator, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Bound to the connect form's inputs; update on every edit.
    pub fn form_mut(&mut self) -> &mut SessionRequestBuilder {
        &mut self.form
    }

    pub fn remotes(&self) -> Vec<RemoteDescriptor> {
        self.registry.remotes()
    }

    pub async fn refresh_remotes(&self) -> bool {
        self.registry.refresh().await
    }

    fn emit_status(&self, status: SessionStatus) {
        self.emitter.emit(&ClientEvent::Session {
            status: status.as_str(),
        });
    }

    fn report(&mut self, error: ClientError) -> ClientError {
        let message = error.to_string();
        self.emitter.emit(&ClientEvent::Notice {
            message: message.clone(),
        });
        self.notice = Some(message);
        error
    }

    /// The "connect" gesture. Validation failures never reach the network;
    /// every failure leaves the session disconnected with a notice set.
    pub async fn submit_connect(&mut self) -> Result<()> {
        if self.stream.state() != StreamState::Idle {
            return Err(self.report(ClientError::SessionLive));
        }

        let request = match self.form.build(self.ctx.identity()) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(target = "easyshell::session", error = %error, "connect form rejected");
                return Err(self.report(error.into()));
            }
        };
        self.notice = None;

        // `status()` cannot be observed while `&mut self` is held, so the
        // negotiating phase is only visible through the event stream.
        self.emit_status(SessionStatus::Negotiating);
        let handle = match self.negotiator.connect(&request).await {
            Ok(handle) => handle,
            Err(error) => {
                self.emit_status(self.status());
                return Err(self.report(error));
            }
        };

        if let Err(error) = self.stream.open(handle, self.events_tx.clone()) {
            return Err(self.report(error));
        }
        self.emit_status(self.status());
        Ok(())
    }

    /// The "disconnect" gesture. Returns false when nothing was live.
    pub fn request_disconnect(&mut self) -> bool {
        if !self.stream.disconnect() {
            return false;
        }
        self.after_disconnect();
        true
    }

    fn after_disconnect(&mut self) {
        self.viewport.reset();
        self.form.clear();
        self.emit_status(self.status());
    }

    /// Waits for the next event from the live channel and applies it.
    /// Events from channels that have already closed are skipped.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        loop {
            let envelope = self.events_rx.recv().await?;
            let Some(update) = self.stream.apply(envelope) else {
                continue;
            };

            match &update {
                StreamUpdate::Opened => self.emit_status(self.status()),
                StreamUpdate::Appended { line_count } => {
                    self.viewport.on_content_grow(*line_count as f64 * LINE_HEIGHT);
                }
                StreamUpdate::Disconnected(cause) => {
                    if let CloseCause::Error(reason) = cause {
                        self.notice = Some(format!("connection lost: {reason}"));
                    }
                    self.after_disconnect();
                }
            }
            return Some(update);
        }
    }

    pub fn scroll_to(&mut self, scroll_top: f64) {
        self.viewport.on_user_scroll(scroll_top);
    }

    pub fn jump_to_bottom(&mut self) {
        self.viewport.jump_to_bottom();
    }

    pub fn set_viewport_height(&mut self, rows: f64) {
        self.viewport.set_viewport_height(rows);
    }
}
