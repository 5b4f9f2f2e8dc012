// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Signal control surface
//!
//! | Signal             | Action                 |
//! |--------------------|------------------------|
//! | `SIGUSR1`          | start a session        |
//! | `SIGUSR2`, `SIGHUP`| stop the session       |
//! | `SIGINT`, `SIGTERM`, `SIGQUIT` | stop, then exit with status 0 |
//!
//! The dispatcher is a single long-lived task that keeps listening after
//! each signal. Lifecycle transitions run on the blocking pool.

use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::tracer::Tracer;

/// Signals the dispatcher listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceSignal {
    User1,
    User2,
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

/// What a signal asks the tracer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Start,
    Stop,
    /// Stop, then terminate the process
    Exit,
}

impl TraceSignal {
    pub fn action(self) -> SignalAction {
        match self {
            TraceSignal::User1 => SignalAction::Start,
            TraceSignal::User2 | TraceSignal::Hangup => SignalAction::Stop,
            TraceSignal::Interrupt | TraceSignal::Terminate | TraceSignal::Quit => {
                SignalAction::Exit
            }
        }
    }
}

impl fmt::Display for TraceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraceSignal::User1 => "SIGUSR1",
            TraceSignal::User2 => "SIGUSR2",
            TraceSignal::Hangup => "SIGHUP",
            TraceSignal::Interrupt => "SIGINT",
            TraceSignal::Terminate => "SIGTERM",
            TraceSignal::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

/// Run `action` against `tracer` off the async worker threads
///
/// Returns `Break` when the process should exit.
pub async fn apply(tracer: &Arc<Tracer>, action: SignalAction) -> ControlFlow<()> {
    let tracer = tracer.clone();
    let joined = tokio::task::spawn_blocking(move || match action {
        SignalAction::Start => {
            tracer.start();
        }
        SignalAction::Stop | SignalAction::Exit => tracer.stop(),
    })
    .await;

    if let Err(e) = joined {
        error!(?action, error = %e, "Lifecycle transition panicked");
    }

    match action {
        SignalAction::Exit => ControlFlow::Break(()),
        SignalAction::Start | SignalAction::Stop => ControlFlow::Continue(()),
    }
}

async fn dispatch(tracer: &Arc<Tracer>, received: TraceSignal) {
    let action = received.action();
    info!(signal = %received, ?action, "Received signal");

    if apply(tracer, action).await.is_break() {
        info!(signal = %received, "Exiting after signal");
        std::process::exit(0);
    }
}

/// Spawn the signal listener on the current tokio runtime
///
/// Signal streams are installed before this returns, so a failure to
/// install one is reported here rather than inside the task.
///
/// # Panics
///
/// Panics when called outside a tokio runtime.
#[cfg(unix)]
pub fn spawn_signal_dispatcher(tracer: Arc<Tracer>) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut hup = signal(SignalKind::hangup())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = usr1.recv() => TraceSignal::User1,
                Some(()) = usr2.recv() => TraceSignal::User2,
                Some(()) = hup.recv() => TraceSignal::Hangup,
                Some(()) = int.recv() => TraceSignal::Interrupt,
                Some(()) = term.recv() => TraceSignal::Terminate,
                Some(()) = quit.recv() => TraceSignal::Quit,
                else => break,
            };
            dispatch(&tracer, received).await;
        }
    }))
}

/// Spawn the signal listener on the current tokio runtime
///
/// Only Ctrl+C is available here; it maps to [`TraceSignal::Interrupt`].
#[cfg(not(unix))]
pub fn spawn_signal_dispatcher(tracer: Arc<Tracer>) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                break;
            }
            dispatch(&tracer, TraceSignal::Interrupt).await;
        }
    }))
}
