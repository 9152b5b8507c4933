//! Command execution.

use crate::client::Client;
use crate::Commands;
use colored::Colorize;
use greeter_core::MemberId;
use greeter_server::{AdminCommand, MemberStatus, Request, Response, UserInfo};

/// Builds the request for a one-shot command. `watch` has none.
pub fn to_request(cmd: Commands, chat_id: i64) -> Option<Request> {
    let command = |command| Request::Command { chat_id, command };

    let request = match cmd {
        Commands::Ping => Request::Ping,
        Commands::Join { id, name, handle } => Request::MemberUpdated {
            chat_id,
            user: UserInfo {
                id: MemberId::new(id),
                display_name: name,
                handle,
            },
            old_status: MemberStatus::Left,
            new_status: MemberStatus::Member,
            old_is_member: None,
            new_is_member: None,
        },
        Commands::Message { user_id } => Request::Message {
            chat_id,
            user_id: MemberId::new(user_id),
        },
        Commands::ShowActive => command(AdminCommand::ShowActive),
        Commands::ShowPenalized => command(AdminCommand::ShowPenalized),
        Commands::ClearActive => command(AdminCommand::ClearActive),
        Commands::ClearPenalized => command(AdminCommand::ClearPenalized),
        Commands::StartTracking => command(AdminCommand::StartTracking),
        Commands::StopTracking => command(AdminCommand::StopTracking),
        Commands::TestNotification => command(AdminCommand::SendTestNotification),
        Commands::Watch => return None,
    };
    Some(request)
}

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
    chat_id: i64,
) -> Result<String, Box<dyn std::error::Error>> {
    let Some(request) = to_request(cmd, chat_id) else {
        return Err("watch is not a one-shot command".into());
    };

    match client.request(&request).await? {
        Response::Error { code, message } => Err(format!("{} ({})", message, code).into()),
        response => Ok(format_response(&response)),
    }
}

/// Renders a response for the terminal.
pub fn format_response(response: &Response) -> String {
    match response {
        Response::Pong => "PONG".green().to_string(),
        Response::Welcome { member, .. } => format!(
            "{} {} ({})",
            "Welcomed".green(),
            member.display_name.cyan(),
            member.id
        ),
        Response::Ignored => "Ignored".yellow().to_string(),
        Response::Acknowledged { removed: true } => {
            "Acknowledged, no longer tracked".green().to_string()
        }
        Response::Acknowledged { removed: false } => {
            "Not tracked, nothing to acknowledge".yellow().to_string()
        }
        Response::Reply { lines, .. } => lines.join("\n"),
        Response::Subscribed => "Subscribed".green().to_string(),
        Response::Notify { chat_id, members } => {
            let names: Vec<String> = members
                .iter()
                .map(|m| format!("{} ({})", m.display_name, m.id))
                .collect();
            format!(
                "{} in chat {}: {}",
                "Reminder".bold(),
                chat_id,
                names.join(", ")
            )
        }
        Response::Error { code, message } => {
            format!("{}: {} ({})", "Error".red(), message, code)
        }
    }
}
