use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_client::{ClientConfig, HttpTransport};
use parley_core::events::SessionEvent;
use parley_session::{ChatController, SendOutcome};

/// Terminal client for a streaming chat service.
#[derive(Parser)]
#[command(name = "parley", version)]
struct Args {
    /// Base URL of the chat API.
    #[arg(long, default_value = "http://127.0.0.1:8000/api/chat")]
    base_url: String,

    /// Request a fresh server session before the first message.
    #[arg(long)]
    new_session: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(base_url = %args.base_url, "starting parley");

    let transport = Arc::new(HttpTransport::new(ClientConfig {
        base_url: args.base_url,
        ..Default::default()
    }));
    let controller = Arc::new(ChatController::new(transport));

    if args.new_session {
        match controller.start_session().await {
            Ok(id) => println!("session: {id}"),
            Err(error) => eprintln!("could not start session: {error}"),
        }
    }

    // Printer task: renders stream progress as it arrives.
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::TextDelta { delta, .. } => {
                    print!("{delta}");
                    std::io::stdout().flush().ok();
                }
                SessionEvent::ToolCallStarted { tool, .. } => {
                    print!("\n[{tool} …]");
                    std::io::stdout().flush().ok();
                }
                SessionEvent::ToolCallResolved { tool, .. } => {
                    print!("\n[{tool} done]\n");
                    std::io::stdout().flush().ok();
                }
                _ => {}
            }
        }
    });

    println!("parley ready. /new starts a session, /clear wipes the transcript, /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(error = %error, "stdin closed");
                break;
            }
        };

        match line.trim() {
            "/quit" => break,
            "/new" => match controller.start_session().await {
                Ok(id) => println!("session: {id}"),
                Err(error) => eprintln!("could not start session: {error}"),
            },
            "/clear" => {
                controller.clear();
                println!("transcript cleared");
            }
            text => match controller.send(text).await {
                SendOutcome::Completed => println!(),
                SendOutcome::Cancelled => println!("(cancelled)"),
                SendOutcome::Failed(error) => eprintln!("\nsend failed: {error}"),
                SendOutcome::RejectedEmpty => {}
                SendOutcome::RejectedBusy => eprintln!("a reply is still streaming"),
            },
        }
    }

    tracing::info!("shutting down");
}
