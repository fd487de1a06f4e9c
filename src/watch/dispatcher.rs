use crate::core::chat::{ChatError, ChatTransport, InlineButton, OutgoingMessage, ReplyMarkup};
use crate::core::dictionary::Dictionary;
use crate::core::table::User;
use crate::core::types::Transaction;
use crate::utils::format::truncate_amount;
use crate::utils::metrics::{NotificationKind, WatcherMetrics};
use crate::watch::state::{GovernanceCandidate, StabilityDrop};
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationKind {
    Vote,
    CancelVote,
}

impl DelegationKind {
    fn template(&self) -> &'static str {
        match self {
            DelegationKind::Vote => "t.new_delegation",
            DelegationKind::CancelVote => "t.new_undelegation",
        }
    }

    fn metric(&self) -> NotificationKind {
        match self {
            DelegationKind::Vote => NotificationKind::Delegation,
            DelegationKind::CancelVote => NotificationKind::Undelegation,
        }
    }
}

/// Formats events per recipient and pushes them through the chat transport.
///
/// Muted users are always skipped. Value thresholds apply to native transfers
/// only.
pub struct Notifier {
    chat: Arc<dyn ChatTransport>,
    dictionary: Arc<Dictionary>,
    explorer_url: String,
    metrics: Arc<dyn WatcherMetrics>,
}

impl Notifier {
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        dictionary: Arc<Dictionary>,
        explorer_url: impl Into<String>,
        metrics: Arc<dyn WatcherMetrics>,
    ) -> Self {
        Self {
            chat,
            dictionary,
            explorer_url: explorer_url.into().trim_end_matches('/').to_string(),
            metrics,
        }
    }

    pub fn tx_url(&self, hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, hash)
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_url, address)
    }

    /// Native transfer. `value` is already scaled to whole units.
    pub async fn notify_transfer(
        &self,
        recipients: &[User],
        tx: &Transaction,
        value: Decimal,
    ) -> Result<usize> {
        let status = if tx.is_success() { "success" } else { "failed" };
        let shown = truncate_amount(value, 4);
        debug!(tx = %tx.hash, %value, recipients = recipients.len(), "Dispatching transfer");

        let messages = recipients
            .iter()
            .filter(|user| !user.mute && user.accepts_value(value))
            .map(|user| {
                let text = self.dictionary.render(
                    "t.transaction",
                    &user.lang,
                    &[&tx.hash, &tx.from, &tx.to, &shown, &tx.block_height, &status],
                );
                OutgoingMessage::text(user.chat_id, text).with_markup(ReplyMarkup::Inline(vec![
                    vec![InlineButton::Url {
                        text: self.dictionary.get("b.link", &user.lang).to_string(),
                        url: self.tx_url(&tx.hash),
                    }],
                ]))
            })
            .collect();

        self.send_all(NotificationKind::Transfer, messages).await
    }

    pub async fn notify_delegation(
        &self,
        recipients: &[User],
        kind: DelegationKind,
        sender: &str,
        node_id: &str,
        amount: Decimal,
    ) -> Result<usize> {
        let amount = amount.normalize();
        let messages = recipients
            .iter()
            .filter(|user| !user.mute)
            .map(|user| {
                let text = self.dictionary.render(
                    kind.template(),
                    &user.lang,
                    &[&sender, &node_id, &amount],
                );
                OutgoingMessage::text(user.chat_id, text)
            })
            .collect();

        self.send_all(kind.metric(), messages).await
    }

    /// Staking-token transfer made through the staking contract
    pub async fn notify_token_transfer(
        &self,
        recipients: &[User],
        sender: &str,
        receiver: &str,
        amount: Decimal,
    ) -> Result<usize> {
        let amount = amount.normalize();
        let messages = recipients
            .iter()
            .filter(|user| !user.mute)
            .map(|user| {
                let text = self.dictionary.render(
                    "t.transfer_nax",
                    &user.lang,
                    &[&sender, &receiver, &amount],
                );
                OutgoingMessage::text(user.chat_id, text)
            })
            .collect();

        self.send_all(NotificationKind::TokenTransfer, messages).await
    }

    pub async fn notify_stability(&self, drop: &StabilityDrop) -> Result<usize> {
        let messages = drop
            .recipients
            .iter()
            .filter(|user| !user.mute)
            .map(|user| {
                let text = self.dictionary.render(
                    "t.changed_stability_index",
                    &user.lang,
                    &[&drop.node.id, &drop.node.stability_index],
                );
                OutgoingMessage::text(user.chat_id, text)
            })
            .collect();

        self.send_all(NotificationKind::Stability, messages).await
    }

    pub async fn notify_governance(&self, candidate: &GovernanceCandidate) -> Result<usize> {
        let messages = candidate
            .recipients
            .iter()
            .filter(|user| !user.mute)
            .map(|user| {
                let text =
                    self.dictionary
                        .render("t.inclusion_governance", &user.lang, &[&candidate.node.id]);
                OutgoingMessage::text(user.chat_id, text)
            })
            .collect();

        self.send_all(NotificationKind::Governance, messages).await
    }

    /// Attempt every message. Blocked recipients count as handled; any other
    /// failure is logged and the first one is returned after all attempts.
    async fn send_all(
        &self,
        kind: NotificationKind,
        messages: Vec<OutgoingMessage>,
    ) -> Result<usize> {
        let mut sent = 0;
        let mut first_error: Option<ChatError> = None;

        for message in messages {
            let chat_id = message.chat_id;
            match self.chat.send_message(message).await {
                Ok(()) => {
                    sent += 1;
                    self.metrics.record_notification(kind);
                }
                Err(ChatError::BlockedByUser) => {
                    debug!(chat_id, "Recipient blocked the bot, skipping");
                }
                Err(e) => {
                    warn!(chat_id, kind = kind.as_str(), "⚠️ Failed to send notification: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(anyhow::Error::new(e).context("Notification delivery failed")),
            None => Ok(sent),
        }
    }
}
