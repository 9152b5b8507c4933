//! greeter-cli - Command-line client for the greeter service
//!
//! Plays the part of the chat adapter: each invocation sends one request and prints the reply.

mod client;
mod commands;

use clap::{Parser, Subcommand};
use client::Client;
use colored::Colorize;
use greeter_server::{Request, Response};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "greeter-cli")]
#[command(about = "Command-line client for the greeter membership tracker")]
#[command(version)]
struct Cli {
    /// Service address
    #[arg(short, long, env = "GREETER_BIND", default_value = "127.0.0.1:7410")]
    server: SocketAddr,

    /// Chat the requests claim to come from
    #[arg(short, long, env = "GREETER_CHAT_ID", allow_negative_numbers = true)]
    chat: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Ping the service
    Ping,

    /// Report that a user joined the chat
    Join {
        /// Platform user id
        #[arg(allow_negative_numbers = true)]
        id: i64,

        /// Display name
        name: String,

        /// Handle, without the leading @
        #[arg(long)]
        handle: Option<String>,
    },

    /// Report that a user wrote in the chat
    Message {
        /// Platform user id
        #[arg(allow_negative_numbers = true)]
        user_id: i64,
    },

    /// Show members who have not introduced themselves yet
    ShowActive,

    /// Show members who ignored the reminder
    ShowPenalized,

    /// Forget every tracked member
    ClearActive,

    /// Empty the penalty list
    ClearPenalized,

    /// Start the daily sweep
    StartTracking,

    /// Stop the daily sweep
    StopTracking,

    /// Run a sweep shortly, outside the daily schedule
    TestNotification,

    /// Print reminders as the service pushes them
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut client = Client::connect(cli.server).await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;
    tracing::debug!("Connected to {}", cli.server);

    match cli.command {
        Commands::Watch => {
            match client.request(&Request::Subscribe).await? {
                Response::Subscribed => {}
                other => {
                    eprintln!("{}: {}", "Error".red(), commands::format_response(&other));
                    std::process::exit(1);
                }
            }
            eprintln!("{} for reminders", "Watching".green());
            eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

            loop {
                tokio::select! {
                    response = client.next_response() => {
                        match response {
                            Ok(response) => println!("{}", commands::format_response(&response)),
                            Err(e) => {
                                eprintln!("{}: {}", "Connection closed".red(), e);
                                break;
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        eprintln!("\n{}", "Stopping watch...".dimmed());
                        break;
                    }
                }
            }
        }
        cmd => match commands::execute(&mut client, cmd, cli.chat).await {
            Ok(output) => {
                println!("{}", output);
            }
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
