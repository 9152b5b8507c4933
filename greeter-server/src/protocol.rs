//! Line-delimited JSON messages exchanged with the chat adapter.
//!
//! Every line is one JSON object with a `type` tag. The adapter sends [`Request`]s and gets
//! exactly one [`Response`] per request, in order. Connections that sent `subscribe` also
//! receive unsolicited [`Response::Notify`] lines.

use crate::status::MemberStatus;
use greeter_core::{MemberId, MemberRecord};
use serde::{Deserialize, Serialize};

/// User as described by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: MemberId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

/// A user the adapter should address by a platform mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: MemberId,
    pub display_name: String,
}

impl Mention {
    pub fn from_record(id: MemberId, record: &MemberRecord) -> Self {
        Self {
            id,
            display_name: record.display_name.clone(),
        }
    }
}

impl From<&UserInfo> for Mention {
    fn from(user: &UserInfo) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
        }
    }
}

/// Moderation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminCommand {
    ShowPenalized,
    ShowActive,
    ClearActive,
    ClearPenalized,
    StartTracking,
    StopTracking,
    SendTestNotification,
}

impl AdminCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminCommand::ShowPenalized => "show-penalized",
            AdminCommand::ShowActive => "show-active",
            AdminCommand::ClearActive => "clear-active",
            AdminCommand::ClearPenalized => "clear-penalized",
            AdminCommand::StartTracking => "start-tracking",
            AdminCommand::StopTracking => "stop-tracking",
            AdminCommand::SendTestNotification => "send-test-notification",
        }
    }
}

impl std::fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter to service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    MemberUpdated {
        chat_id: i64,
        user: UserInfo,
        old_status: MemberStatus,
        new_status: MemberStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_is_member: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_is_member: Option<bool>,
    },
    Message {
        chat_id: i64,
        user_id: MemberId,
    },
    Command {
        chat_id: i64,
        command: AdminCommand,
    },
    Subscribe,
    Ping,
}

/// Service to adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Greet `member` in `chat_id`.
    Welcome { chat_id: i64, member: Mention },
    /// Nothing to do.
    Ignored,
    Acknowledged { removed: bool },
    /// Post `lines` to `chat_id`.
    Reply { chat_id: i64, lines: Vec<String> },
    Subscribed,
    /// Remind `members` in `chat_id` to introduce themselves.
    Notify { chat_id: i64, members: Vec<Mention> },
    Pong,
    Error { code: String, message: String },
}

impl Response {
    pub fn reply(chat_id: i64, line: impl Into<String>) -> Self {
        Response::Reply {
            chat_id,
            lines: vec![line.into()],
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Encodes as one line, newline included.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl Request {
    /// Encodes as one line, newline included.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member_updated() {
        let line = r#"{"type":"member_updated","chat_id":-100,"user":{"id":7,"display_name":"Ann","handle":"ann"},"old_status":"left","new_status":"member"}"#;
        let request: Request = serde_json::from_str(line).unwrap();
        match request {
            Request::MemberUpdated {
                chat_id,
                user,
                new_status,
                new_is_member,
                ..
            } => {
                assert_eq!(chat_id, -100);
                assert_eq!(user.id, MemberId::new(7));
                assert_eq!(user.handle.as_deref(), Some("ann"));
                assert_eq!(new_status, MemberStatus::Member);
                assert_eq!(new_is_member, None);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_parse_command() {
        let line = r#"{"type":"command","chat_id":5,"command":"send-test-notification"}"#;
        let request: Request = serde_json::from_str(line).unwrap();
        assert_eq!(
            request,
            Request::Command {
                chat_id: 5,
                command: AdminCommand::SendTestNotification
            }
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        let line = r#"{"type":"command","chat_id":5,"command":"ban-everyone"}"#;
        assert!(serde_json::from_str::<Request>(line).is_err());
    }

    #[test]
    fn test_command_names_match_serde() {
        for command in [
            AdminCommand::ShowPenalized,
            AdminCommand::ShowActive,
            AdminCommand::ClearActive,
            AdminCommand::ClearPenalized,
            AdminCommand::StartTracking,
            AdminCommand::StopTracking,
            AdminCommand::SendTestNotification,
        ] {
            let json = serde_json::to_string(&command).unwrap();
            assert_eq!(json, format!("\"{}\"", command.as_str()));
        }
    }

    #[test]
    fn test_response_line_format() {
        let line = Response::Pong.to_line().unwrap();
        assert_eq!(line, b"{\"type\":\"pong\"}\n");

        let notify = Response::Notify {
            chat_id: 1,
            members: vec![Mention {
                id: MemberId::new(2),
                display_name: "Bo".to_string(),
            }],
        };
        let json = serde_json::to_value(&notify).unwrap();
        assert_eq!(json["type"], "notify");
        assert_eq!(json["members"][0]["id"], 2);
    }
}
