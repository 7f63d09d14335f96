//! Client for opening broker-authenticated terminal sessions on remote hosts
//! and following their output live.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use easyshell_client::{BrokerEndpoint, ClientContext, EventEmitter, SessionController};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ClientContext::new(BrokerEndpoint::new("localhost", 7843), Duration::from_secs(10));
//!     let mut session = SessionController::new(ctx, EventEmitter::new(false))?;
//!
//!     session
//!         .form_mut()
//!         .set_remote_id("3fa85f64-5717-4562-b3fc-2c963f66afa6")
//!         .set_otp("482913");
//!     session.submit_connect().await?;
//!
//!     while let Some(update) = session.next_update().await {
//!         println!("{update:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod identity;
pub mod negotiator;
pub mod registry;
pub mod request;
pub mod scroll;
pub mod session;
pub mod stream;
pub mod transcript;
pub mod validate;

pub use broker::{BrokerClient, BrokerEndpoint, RemoteDescriptor};
pub use context::ClientContext;
pub use error::{ClientError, Result, ValidationError};
pub use events::{ClientEvent, EventEmitter};
pub use identity::ClientIdentity;
pub use negotiator::{SessionHandle, SessionNegotiator};
pub use registry::RegistryClient;
pub use request::{AuthType, SessionRequest, SessionRequestBuilder};
pub use scroll::{FollowAction, Viewport, FOLLOW_THRESHOLD};
pub use session::{SessionController, SessionStatus};
pub use stream::{CloseCause, StreamState, StreamUpdate, TerminalStream};
pub use transcript::Transcript;
pub use validate::{is_valid_otp, is_valid_remote_id};
