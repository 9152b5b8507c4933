//! Request handlers.

use crate::broadcast::{Notification, NotificationBroadcaster};
use crate::error::ServerError;
use crate::protocol::{AdminCommand, Mention, Request, Response, UserInfo};
use crate::scheduler::SweepScheduler;
use crate::status::{MemberStatus, StatusChange};
use crate::SharedStore;
use greeter_core::{render_listing, Clock, ListKind, MemberId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Handles adapter requests for the tracked chat.
pub struct CommandHandler {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    scheduler: Arc<SweepScheduler>,
    broadcaster: Arc<NotificationBroadcaster>,
    chat_id: i64,
    test_delay: Duration,
}

impl CommandHandler {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        scheduler: Arc<SweepScheduler>,
        broadcaster: Arc<NotificationBroadcaster>,
        chat_id: i64,
    ) -> Self {
        Self {
            store,
            clock,
            scheduler,
            broadcaster,
            chat_id,
            test_delay: Duration::from_secs(2),
        }
    }

    /// Sets the delay before the sweep triggered by `send-test-notification`.
    pub fn with_test_delay(mut self, delay: Duration) -> Self {
        self.test_delay = delay;
        self
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Handles a request. Failures become `error` responses.
    pub fn handle(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Request failed: {}", e);
                Response::error(e.error_code(), e.to_string())
            }
        }
    }

    /// Subscribes to reminder notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.broadcaster.subscribe()
    }

    fn dispatch(&self, request: &Request) -> Result<Response, ServerError> {
        match request {
            Request::MemberUpdated {
                chat_id,
                user,
                old_status,
                new_status,
                old_is_member,
                new_is_member,
            } => self.handle_member_updated(
                *chat_id,
                user,
                *old_status,
                *new_status,
                *old_is_member,
                *new_is_member,
            ),
            Request::Message { chat_id, user_id } => self.handle_message(*chat_id, *user_id),
            Request::Command { chat_id, command } => self.handle_command(*chat_id, *command),
            Request::Subscribe => Err(ServerError::InvalidRequest(
                "subscribe is only available on a connection".to_string(),
            )),
            Request::Ping => Ok(Response::Pong),
        }
    }

    fn handle_member_updated(
        &self,
        chat_id: i64,
        user: &UserInfo,
        old_status: MemberStatus,
        new_status: MemberStatus,
        old_is_member: Option<bool>,
        new_is_member: Option<bool>,
    ) -> Result<Response, ServerError> {
        if chat_id != self.chat_id {
            return Ok(Response::Ignored);
        }

        let change =
            StatusChange::from_update(old_status, new_status, old_is_member, new_is_member);
        if !change.is_some_and(|c| c.is_join()) {
            return Ok(Response::Ignored);
        }

        let now = self.clock.now();
        self.store
            .lock()
            .record_join(user.id, user.display_name.clone(), user.handle.clone(), now)?;
        tracing::info!(
            "Member {} ({}) joined, tracking started",
            user.id,
            user.handle.as_deref().unwrap_or("no handle")
        );

        Ok(Response::Welcome {
            chat_id,
            member: Mention::from(user),
        })
    }

    fn handle_message(&self, chat_id: i64, user_id: MemberId) -> Result<Response, ServerError> {
        if chat_id != self.chat_id {
            return Ok(Response::Ignored);
        }

        let removed = self.store.lock().acknowledge(user_id)?;
        if removed {
            tracing::info!("Member {} wrote a message, no longer tracked", user_id);
        }
        Ok(Response::Acknowledged { removed })
    }

    fn handle_command(
        &self,
        chat_id: i64,
        command: AdminCommand,
    ) -> Result<Response, ServerError> {
        tracing::info!("Command {} from chat {}", command, chat_id);

        let response = match command {
            AdminCommand::ShowActive => Response::Reply {
                chat_id,
                lines: render_listing(ListKind::Active, self.store.lock().active()),
            },
            AdminCommand::ShowPenalized => Response::Reply {
                chat_id,
                lines: render_listing(ListKind::Penalized, self.store.lock().penalized()),
            },
            AdminCommand::ClearActive => {
                let count = self.store.lock().clear_active()?;
                tracing::info!("Cleared {} active member(s)", count);
                Response::reply(chat_id, "Active list cleared")
            }
            AdminCommand::ClearPenalized => {
                let count = self.store.lock().clear_penalized()?;
                tracing::info!("Cleared {} penalized member(s)", count);
                Response::reply(chat_id, "Penalty list cleared")
            }
            AdminCommand::StartTracking => {
                if self.scheduler.start_tracking() {
                    Response::reply(chat_id, "Started tracking new members")
                } else {
                    Response::reply(chat_id, "Already tracking new members")
                }
            }
            AdminCommand::StopTracking => {
                if self.scheduler.stop_tracking() {
                    Response::reply(chat_id, "Stopped tracking new members")
                } else {
                    Response::reply(chat_id, "Tracking was never started")
                }
            }
            AdminCommand::SendTestNotification => {
                self.scheduler.run_once_after(self.test_delay);
                Response::reply(chat_id, "Sending a test notification")
            }
        };

        Ok(response)
    }
}
