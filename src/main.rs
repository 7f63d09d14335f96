use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use easyshell_client::{
    config::Config,
    events::{init_logging, EventEmitter},
    ClientContext, CloseCause, SessionController, StreamUpdate,
};

#[derive(Debug, Parser)]
#[command(name = "easyshell")]
#[command(about = "Open a broker-authenticated terminal session and follow its output")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the remotes the broker currently knows about.
    Devices,
    /// Connect to a remote and stream its terminal output to stdout.
    /// Ctrl-C disconnects.
    Connect {
        /// Remote id (hyphenated UUID).
        remote_id: String,
        /// Six-digit one-time code.
        code: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config)?;

    let ctx = ClientContext::new(cli.config.broker(), cli.config.request_timeout());
    let emitter = EventEmitter::new(cli.config.json_output);
    let mut session =
        SessionController::new(ctx, emitter).context("failed to build broker client")?;

    let mut stdout = io::stdout();
    match cli.command {
        Commands::Devices => run_devices(&session, &mut stdout).await,
        Commands::Connect { remote_id, code } => {
            run_connect(&mut session, remote_id, code, &mut stdout).await
        }
    }
}

async fn run_devices<W: Write>(session: &SessionController, out: &mut W) -> Result<()> {
    session.refresh_remotes().await;

    for remote in session.remotes() {
        writeln!(out, "{}\t{}", remote.id, remote.display_name())?;
    }
    out.flush()?;
    Ok(())
}

async fn run_connect<W: Write>(
    session: &mut SessionController,
    remote_id: String,
    code: String,
    out: &mut W,
) -> Result<()> {
    session.form_mut().set_remote_id(remote_id).set_otp(code);
    if let Err(error) = session.submit_connect().await {
        let message = session
            .notice()
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        bail!("{message}");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    loop {
        tokio::select! {
            update = session.next_update() => {
                match update {
                    Some(StreamUpdate::Appended { .. }) => {
                        for line in &session.transcript().lines()[printed..] {
                            writeln!(out, "{line}")?;
                        }
                        out.flush()?;
                        printed = session.transcript().len();
                    }
                    Some(StreamUpdate::Opened) => {
                        tracing::info!(target = "easyshell::cli", "connected");
                    }
                    Some(StreamUpdate::Disconnected(cause)) => {
                        if matches!(cause, CloseCause::Error(_)) {
                            if let Some(notice) = session.notice() {
                                eprintln!("{notice}");
                            }
                        }
                        break;
                    }
                    None => break,
                }
            }
            signal = &mut ctrl_c => {
                signal.context("failed to listen for ctrl-c")?;
                session.request_disconnect();
                break;
            }
        }
    }

    tracing::info!(target = "easyshell::cli", "disconnected");
    Ok(())
}
