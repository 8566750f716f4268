//! Chat commands: `status`, `check_now` and `reset_db`.

use std::collections::HashSet;
use std::sync::Arc;

use storewatch_core::config::DiscordConfig;
use storewatch_core::error::{Result, WatchError};
use storewatch_core::traits::Channel;
use storewatch_core::types::{IncomingMessage, Notification, OutgoingMessage};

use crate::engine::{SchedulerEngine, SchedulerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    CheckNow,
    Reset,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "status" => Some(Self::Status),
            "check_now" => Some(Self::CheckNow),
            "reset_db" => Some(Self::Reset),
            _ => None,
        }
    }

    pub fn privileged(self) -> bool {
        !matches!(self, Self::Status)
    }
}

/// Routes prefixed chat messages to the engine and replies in the
/// channel the command came from.
#[derive(Clone)]
pub struct CommandRouter {
    engine: Arc<SchedulerEngine>,
    channel: Arc<dyn Channel>,
    prefix: String,
    admins: Arc<HashSet<String>>,
}

impl CommandRouter {
    pub fn new(engine: Arc<SchedulerEngine>, channel: Arc<dyn Channel>, config: &DiscordConfig) -> Self {
        Self {
            engine,
            channel,
            prefix: config.command_prefix.clone(),
            admins: Arc::new(config.admin_user_ids.iter().cloned().collect()),
        }
    }

    /// Handle one incoming message. Returns the command that ran, if any.
    /// Non-commands, unknown commands and bot messages are ignored.
    pub async fn handle(&self, msg: &IncomingMessage) -> Result<Option<Command>> {
        if msg.author_is_bot {
            return Ok(None);
        }
        let Some(command) = msg.command(&self.prefix).and_then(|(name, _)| Command::parse(name)) else {
            return Ok(None);
        };
        tracing::debug!("Command {command:?} from {} in {}", msg.author_id, msg.channel_id);

        if let Err(e) = self.authorize(command, msg) {
            tracing::warn!("{e}");
            self.reply(msg, "❌ You do not have permission to run this command.").await?;
            return Ok(Some(command));
        }

        match command {
            Command::Status => self.status(msg).await?,
            Command::CheckNow => self.check_now(msg).await?,
            Command::Reset => self.reset(msg).await?,
        }
        Ok(Some(command))
    }

    fn authorize(&self, command: Command, msg: &IncomingMessage) -> Result<()> {
        if !command.privileged() || self.admins.contains(&msg.author_id) {
            return Ok(());
        }
        Err(WatchError::PermissionDenied(format!(
            "user {} may not run {command:?}",
            msg.author_id
        )))
    }

    async fn status(&self, msg: &IncomingMessage) -> Result<()> {
        let status = self.engine.status();
        let schedule = self.engine.schedule();
        let watching = match status.state {
            SchedulerState::Idle => "🔴 Inactive",
            SchedulerState::Waiting => "🟢 Active",
            SchedulerState::Running => "🟡 Checking now",
        };

        let mut body = format!(
            "**Tracked entries | Watch status**\n{} | {watching}\n\n**Next check**\n",
            status.known_keys
        );
        match status.next_run {
            Some(next) => body.push_str(&format!(
                "{} ({})",
                next.with_timezone(&schedule.timezone()).format("%Y-%m-%d %H:%M %Z"),
                schedule.describe()
            )),
            None => body.push_str(&schedule.describe()),
        }
        if let Some(last) = &status.last_cycle {
            body.push_str(&format!(
                "\n\n**Last check**\n{} {} at {}: {}",
                if last.ok { "✅" } else { "❌" },
                last.trigger,
                last.at.format("%Y-%m-%d %H:%M UTC"),
                last.outcome
            ));
        }

        let card = Notification {
            title: "📊 Bot status".into(),
            body,
            image: None,
            footer: format!("{} checks since start", status.cycles),
            color: 0x0099ff,
        };
        self.channel.send_notification(&msg.channel_id, &card).await
    }

    async fn check_now(&self, msg: &IncomingMessage) -> Result<()> {
        self.reply(msg, "🔍 Manual check in progress...").await?;

        match self.engine.trigger_now(&msg.channel_id).await {
            Ok(report) if report.new_records == 0 => {
                self.reply(msg, "ℹ️ No new entries detected.").await
            }
            Ok(report) if !report.render_skipped.is_empty() || !report.dispatch.failed.is_empty() => {
                self.reply(msg, &format!("⚠️ Check finished with problems: {}", report.summary())).await
            }
            Ok(_) => Ok(()),
            Err(e) => self.reply(msg, &format!("❌ Check failed: {e}")).await,
        }
    }

    async fn reset(&self, msg: &IncomingMessage) -> Result<()> {
        self.engine.reset().await;
        self.reply(
            msg,
            "🔄 Local state cleared. The next check will announce every entry again.",
        )
        .await
    }

    async fn reply(&self, msg: &IncomingMessage, content: &str) -> Result<()> {
        self.channel.send(OutgoingMessage::new(&msg.channel_id, content)).await
    }
}
