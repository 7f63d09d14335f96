use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

use crate::config::Config;

/// Logs go to stderr; stdout is reserved for transcript lines.
pub fn init_logging(cfg: &Config) -> Result<()> {
    let filter =
        EnvFilter::try_new(cfg.log_level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Lifecycle events a front end can follow when `--json-output` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The session moved to a new status (`negotiating`, `streaming`, ...).
    Session { status: &'static str },
    /// A message for the operator, usually a rejected connect.
    Notice { message: String },
}

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes one JSON object per line for every [`ClientEvent`].
#[derive(Clone)]
pub struct EventEmitter {
    sink: Option<Sink>,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl EventEmitter {
    /// Emits to stderr when `json_output` is set, otherwise drops every event.
    pub fn new(json_output: bool) -> Self {
        if json_output {
            Self::with_writer(io::stderr())
        } else {
            Self { sink: None }
        }
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, event: &ClientEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        match serde_json::to_value(event) {
            Ok(mut line) => {
                line["ts"] = Utc::now().to_rfc3339().into();
                let _ = writeln!(sink.lock(), "{line}");
            }
            Err(error) => {
                tracing::warn!(target = "easyshell::events", error = %error, "event not serializable");
            }
        }
    }
}
