//! `listen`: hold the channel open and print what arrives.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use pushline_core::{
    BroadcastSink, ChannelController, ChannelError, ConnectionState, EventRecord,
    StaticCredentials,
};

use crate::cli::{GlobalOpts, ListenArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: &ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let Some(token) = resolved.token else {
        return Err(CliError::NoCredentials {
            profile: resolved.profile_name,
        });
    };

    let sink = Arc::new(BroadcastSink::new());
    let mut events = sink.events();
    let mut errors = sink.errors();
    let mut state = sink.connection_state();

    let credentials = Arc::new(StaticCredentials::new(Some(token)));
    let controller = ChannelController::from_config(&resolved.channel, credentials, sink.clone())?;
    controller.connect(args.identity.clone());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("interrupted, closing channel");
                controller.disconnect();
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event, args.json)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => return Ok(()),
            },
            error = errors.recv() => match error {
                Ok(error) => {
                    if let Some(failure) = fatal(&error) {
                        controller.disconnect();
                        return Err(failure);
                    }
                    warn!(error = %error, "push channel error");
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "error output fell behind"),
                Err(RecvError::Closed) => return Ok(()),
            },
            changed = state.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                report_state(&state.borrow_and_update());
            }
        }
    }
}

/// Errors the controller will not recover from on its own end `listen`.
fn fatal(error: &ChannelError) -> Option<CliError> {
    error
        .requires_reconnect()
        .then(|| CliError::from(error.clone()))
}

fn report_state(state: &ConnectionState) {
    match state {
        ConnectionState::Connecting { identity } => eprintln!("connecting as {identity}"),
        ConnectionState::Connected {
            connection_id,
            identity,
        } => eprintln!("connected as {identity} ({connection_id})"),
        ConnectionState::Reconnecting { attempt, delay } => {
            eprintln!("reconnecting in {}ms (attempt {attempt})", delay.as_millis());
        }
        ConnectionState::Disconnected => eprintln!("disconnected"),
    }
}

fn print_event(event: &EventRecord, json: bool) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    if json {
        let line = serde_json::json!({
            "received_at": chrono::Utc::now().to_rfc3339(),
            "type": event.event_type,
            "data": event.data,
            "id": event.id,
        });
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    } else {
        writeln!(out, "{}: {}", event.event_type, event.data)?;
    }
    out.flush()?;
    Ok(())
}
