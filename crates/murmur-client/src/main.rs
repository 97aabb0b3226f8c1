mod commands;
mod config;
mod render;

use std::io::BufRead;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use murmur_api::HttpChatApi;
use murmur_gateway::Connection;
use murmur_sync::{SessionHandle, SyncSession, ViewSnapshot};

use crate::commands::{Command, HELP, resolve_peer};
use crate::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout belongs to the view
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=info,murmur_api=info,murmur_gateway=info,murmur_sync=info".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;
    info!(
        "Starting murmur for {} (user {})",
        if config.username.is_empty() { "<unnamed>" } else { config.username.as_str() },
        config.user_id
    );

    let api = HttpChatApi::new(config.api())?;
    let connection = Connection::connect(&config.gateway(), config.user_id).await?;
    let session = SyncSession::start(api, connection, config.user_id, config.sync());

    let mut view = session.subscribe();
    let renderer = tokio::spawn(async move {
        while view.changed().await.is_ok() {
            let text = render::render(&view.borrow_and_update());
            println!("{}", text);
        }
    });

    let handle = session.handle();
    let input_view = session.subscribe();
    tokio::select! {
        _ = read_commands(spawn_stdin_reader(), handle, input_view) => {}
        _ = shutdown_signal() => {}
    }

    session.shutdown().await;
    renderer.abort();
    info!("Bye");
    Ok(())
}

/// Stdin is read on a plain thread so a pending read never holds up exit.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Handle commands until `/quit` or end of input.
async fn read_commands(mut lines: mpsc::Receiver<String>, handle: SessionHandle, view: watch::Receiver<ViewSnapshot>) {
    while let Some(line) = lines.recv().await {
        let Some(command) = Command::parse(&line) else {
            if !line.trim().is_empty() {
                println!("Unknown command. /help lists them.");
            }
            continue;
        };

        let result = match command {
            Command::Open(target) => {
                let peer = resolve_peer(&view.borrow(), &target);
                match peer {
                    Some(peer) => handle.focus(peer).await,
                    None => {
                        println!("No conversation or contact named {}", target);
                        Ok(())
                    }
                }
            }
            Command::Close => handle.unfocus().await,
            Command::Send(text) => handle.send_message(text).await,
            Command::Notifications => handle.open_notifications().await,
            Command::Previous => handle.show_previous_notifications().await,
            Command::Done => handle.close_notifications().await,
            Command::Refresh => handle.refresh().await,
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => return,
        };
        if let Err(e) = result {
            println!("{}", e);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
