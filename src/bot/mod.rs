pub mod routes;

use crate::core::chat::{
    ChatTransport, InlineButton, OutgoingMessage, ReplyMarkup, Update, UpdateKind, deliver,
};
use crate::core::dictionary::Dictionary;
use crate::core::table::{NewUser, SubscriptionRole, User};
use crate::market::feed::PriceFeed;
use crate::storage::manager::{SubscribeOutcome, WatcherStorageManager};
use crate::utils::format::{truncate_amount, usd_value};
use crate::watch::aggregator::{Aggregator, SubscriptionState};
use crate::watch::state::WatchState;
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use routes::{DELETE_PREFIX, PendingFlow, Step, delete_action, is_valid_address, parse_thresholds};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Spot prices used to value holdings
#[derive(Clone)]
pub struct Prices {
    pub nas: Arc<PriceFeed>,
    pub nax: Arc<PriceFeed>,
}

/// Chat front end: menus, subscription management and settings
pub struct Bot {
    chat: Arc<dyn ChatTransport>,
    dictionary: Arc<Dictionary>,
    storage: Arc<WatcherStorageManager>,
    state: Arc<WatchState>,
    aggregator: Arc<Aggregator>,
    prices: Prices,
    explorer_url: String,
    pending: Mutex<HashMap<u64, PendingFlow>>,
}

impl Bot {
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        dictionary: Arc<Dictionary>,
        storage: Arc<WatcherStorageManager>,
        state: Arc<WatchState>,
        aggregator: Arc<Aggregator>,
        prices: Prices,
        explorer_url: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            dictionary,
            storage,
            state,
            aggregator,
            prices,
            explorer_url: explorer_url.into().trim_end_matches('/').to_string(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Long-poll the chat transport and handle updates one at a time
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("🤖 Bot update loop started");
        let mut offset = 0i64;

        loop {
            let polled = tokio::select! {
                _ = shutdown.recv() => {
                    info!("🛑 Shutdown signal received, stopping bot...");
                    break;
                }
                polled = self.chat.poll_updates(offset) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("⚠️ Failed to poll chat updates: {}", e);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Err(e) = self.handle_update(update).await {
                    error!("❌ Failed to handle chat update: {:#}", e);
                }
            }
        }

        info!("👋 Bot stopped");
        Ok(())
    }

    pub async fn handle_update(&self, update: Update) -> Result<()> {
        match update.kind {
            UpdateKind::Message {
                chat_id,
                text,
                first_name,
                last_name,
                username,
            } => {
                let name = format!("{} {}", first_name, last_name).trim().to_string();
                let (user, created) = self.storage.users.find_or_create(NewUser {
                    chat_id,
                    username,
                    name,
                })?;
                if created {
                    info!(user_id = user.id, chat_id, "👤 New user");
                    self.state.upsert_user(user.clone());
                }
                self.handle_message(user, &text).await
            }
            UpdateKind::Callback {
                chat_id,
                message_id,
                data,
            } => self.handle_callback(chat_id, message_id, &data).await,
        }
    }

    async fn handle_message(&self, mut user: User, text: &str) -> Result<()> {
        if text == "/start" {
            self.clear_pending(user.id);
            return self.open(Step::Start, &mut user).await;
        }

        let step = match user.step.parse::<Step>() {
            Ok(step) => step,
            Err(_) => return self.open(Step::Start, &mut user).await,
        };

        let result = match step {
            Step::Start => self.on_start(&mut user, text).await,
            Step::ChooseLang => self.on_choose_lang(&mut user, text).await,
            Step::Settings => self.on_settings(&mut user, text).await,
            Step::TypeAddress => self.on_type_address(&mut user, text).await,
            Step::PasteAddress => self.on_paste_address(&mut user, text).await,
            Step::AddressAlias => self.on_address_alias(&mut user, text).await,
            Step::ChangeThreshold => self.on_change_threshold(&mut user, text).await,
        };

        if let Err(e) = result {
            self.oops(&mut user).await;
            return Err(e.context(format!("Route {} failed", step)));
        }
        Ok(())
    }

    async fn handle_callback(&self, chat_id: i64, message_id: i64, data: &str) -> Result<()> {
        let Some(user) = self.storage.users.get_by_chat(chat_id)? else {
            return Ok(());
        };
        let Some(address) = data.strip_prefix(DELETE_PREFIX) else {
            debug!(data, "Ignoring unknown callback");
            return Ok(());
        };
        if address.is_empty() {
            return Ok(());
        }

        if self
            .storage
            .subscriptions
            .unsubscribe(user.id, address)?
            .is_some()
        {
            self.state.remove_subscription(user.id, address);
            info!(user_id = user.id, address, "🗑️ Subscription removed");
        }
        self.chat.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------------

    async fn on_start(&self, user: &mut User, text: &str) -> Result<()> {
        if text == self.label("b.settings", user) {
            self.open(Step::Settings, user).await
        } else if text == self.label("b.add_subscription", user) {
            self.open(Step::TypeAddress, user).await
        } else if text == self.label("b.show_subscriptions", user) {
            self.show_subscriptions(user).await
        } else {
            self.open(Step::Start, user).await
        }
    }

    async fn on_choose_lang(&self, user: &mut User, text: &str) -> Result<()> {
        let lang = if text == self.label("b.lang_en", user) {
            "en"
        } else if text == self.label("b.lang_cn", user) {
            "cn"
        } else {
            return self.say(user, "t.wrong_lang").await;
        };

        user.lang = lang.to_string();
        self.save_user(user)?;
        self.open(Step::Start, user).await
    }

    async fn on_settings(&self, user: &mut User, text: &str) -> Result<()> {
        if text == self.label("b.change_lang", user) {
            self.open(Step::ChooseLang, user).await
        } else if text == self.label("b.return_back", user) {
            self.open(Step::Start, user).await
        } else if text == self.label("b.change_treshold", user) {
            self.open(Step::ChangeThreshold, user).await
        } else if text == self.label("b.mute", user) || text == self.label("b.unmute", user) {
            user.mute = text == self.label("b.mute", user);
            self.save_user(user)?;
            let key = if user.mute { "t.muted" } else { "t.unmuted" };
            self.say(user, key).await?;
            self.open(Step::Settings, user).await
        } else {
            self.say(user, "t.wrong_option").await
        }
    }

    async fn on_type_address(&self, user: &mut User, text: &str) -> Result<()> {
        let role = if text == self.label("b.cancel", user) {
            self.clear_pending(user.id);
            return self.open(Step::Start, user).await;
        } else if text == self.label("b.account_address", user) {
            SubscriptionRole::Account
        } else if text == self.label("b.validator_address", user) {
            SubscriptionRole::Validator
        } else {
            return self.say(user, "t.wrong_option").await;
        };

        self.pending.lock().insert(user.id, PendingFlow::Role(role));
        self.open(Step::PasteAddress, user).await
    }

    async fn on_paste_address(&self, user: &mut User, text: &str) -> Result<()> {
        if text == self.label("b.cancel", user) {
            self.clear_pending(user.id);
            return self.open(Step::Start, user).await;
        }

        let address = text.trim();
        if !is_valid_address(address) {
            return self.say(user, "t.wrong_address").await;
        }

        if self.storage.subscriptions.exists(user.id, address)? {
            self.clear_pending(user.id);
            self.say(user, "t.address_already_added").await?;
            return self.open(Step::Start, user).await;
        }

        let role = match self.pending.lock().get(&user.id) {
            Some(PendingFlow::Role(role)) => *role,
            other => return Err(anyhow!("Unexpected pending flow: {:?}", other)),
        };
        self.pending.lock().insert(
            user.id,
            PendingFlow::RoleAndAddress(role, address.to_string()),
        );
        self.open(Step::AddressAlias, user).await
    }

    async fn on_address_alias(&self, user: &mut User, text: &str) -> Result<()> {
        if text == self.label("b.cancel", user) {
            self.clear_pending(user.id);
            return self.open(Step::Start, user).await;
        }

        let (role, address) = match self.pending.lock().remove(&user.id) {
            Some(PendingFlow::RoleAndAddress(role, address)) => (role, address),
            other => return Err(anyhow!("Unexpected pending flow: {:?}", other)),
        };

        match self
            .storage
            .subscriptions
            .subscribe(user.id, &address, text, role)?
        {
            SubscribeOutcome::Created(sub) => {
                self.state.add_subscription(&sub);
                info!(user_id = user.id, address = %sub.address, role = %sub.role, "➕ Subscription added");
                self.say(user, "t.address_added").await?;
            }
            SubscribeOutcome::AlreadySubscribed => {
                self.say(user, "t.address_already_added").await?;
            }
        }
        self.open(Step::Start, user).await
    }

    async fn on_change_threshold(&self, user: &mut User, text: &str) -> Result<()> {
        if text == self.label("b.return_back", user) {
            return self.open(Step::Settings, user).await;
        }

        let Some((min, max)) = parse_thresholds(text) else {
            return self.say(user, "t.invalid_treshold").await;
        };
        user.min_threshold = min;
        user.max_threshold = max;
        self.save_user(user)?;
        self.say(user, "t.successful_updated").await?;
        self.open(Step::Settings, user).await
    }

    async fn show_subscriptions(&self, user: &User) -> Result<()> {
        let states = self.aggregator.for_user(user.id).await?;
        if states.is_empty() {
            return self.say(user, "t.not_have_addresses").await;
        }

        for state in &states {
            let message = OutgoingMessage::text(user.chat_id, self.describe(user, state))
                .with_markup(ReplyMarkup::Inline(vec![vec![
                    InlineButton::Url {
                        text: self.label("b.link", user).to_string(),
                        url: format!("{}/address/{}", self.explorer_url, state.address),
                    },
                    InlineButton::Callback {
                        text: self.label("b.delete", user).to_string(),
                        data: delete_action(&state.address),
                    },
                ]]));
            deliver(self.chat.as_ref(), message).await?;
        }
        Ok(())
    }

    fn describe(&self, user: &User, state: &SubscriptionState) -> String {
        let key = match state.role {
            SubscriptionRole::Account => "t.address_subscription",
            SubscriptionRole::Validator => "t.validator_subscription",
        };
        self.dictionary.render(
            key,
            &user.lang,
            &[
                &state.alias,
                &state.address,
                &truncate_amount(state.balance, 4),
                &usd_value(state.balance, self.prices.nas.price(), 4),
                &truncate_amount(state.token_balance, 4),
                &usd_value(state.token_balance, self.prices.nax.price(), 6),
                &state.role,
                &truncate_amount(state.votes, 4),
            ],
        )
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn label(&self, key: &str, user: &User) -> &str {
        self.dictionary.get(key, &user.lang)
    }

    fn clear_pending(&self, user_id: u64) {
        self.pending.lock().remove(&user_id);
    }

    fn save_user(&self, user: &User) -> Result<()> {
        self.storage.users.save(user)?;
        self.state.upsert_user(user.clone());
        Ok(())
    }

    async fn say(&self, user: &User, key: &str) -> Result<()> {
        let text = self.dictionary.get(key, &user.lang);
        deliver(self.chat.as_ref(), OutgoingMessage::text(user.chat_id, text)).await?;
        Ok(())
    }

    /// Move `user` to `step` and send its prompt. Persisting the step is best effort.
    async fn open(&self, step: Step, user: &mut User) -> Result<()> {
        user.step = step.as_str().to_string();
        if let Err(e) = self.storage.users.save(user) {
            warn!(user_id = user.id, step = %step, "⚠️ Failed to persist conversation step: {:#}", e);
        }
        self.state.upsert_user(user.clone());

        let rows: Vec<Vec<&str>> = match step {
            Step::Start => vec![
                vec!["b.add_subscription"],
                vec!["b.show_subscriptions"],
                vec!["b.settings"],
            ],
            Step::ChooseLang => vec![vec!["b.lang_en"], vec!["b.lang_cn"]],
            Step::Settings => vec![
                vec![if user.mute { "b.unmute" } else { "b.mute" }],
                vec!["b.change_lang"],
                vec!["b.change_treshold"],
                vec!["b.return_back"],
            ],
            Step::TypeAddress => vec![
                vec!["b.account_address"],
                vec!["b.validator_address"],
                vec!["b.cancel"],
            ],
            Step::PasteAddress | Step::AddressAlias => vec![vec!["b.cancel"]],
            Step::ChangeThreshold => vec![vec!["b.return_back"]],
        };
        let prompt = match step {
            Step::Start => "t.menu",
            Step::ChooseLang => "t.choose_lang",
            Step::Settings => "t.choose_option",
            Step::TypeAddress => "t.choose_address_type",
            Step::PasteAddress => "t.paste_your_address",
            Step::AddressAlias => "t.enter_address_alias",
            Step::ChangeThreshold => "t.paste_treshold",
        };

        let text = self.dictionary.render(
            prompt,
            &user.lang,
            &[&user.min_threshold, &user.max_threshold],
        );
        let keyboard: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|key| self.label(key, user).to_string())
                    .collect::<Vec<_>>()
            })
            .collect();
        let message =
            OutgoingMessage::text(user.chat_id, text).with_markup(ReplyMarkup::Keyboard(keyboard));
        deliver(self.chat.as_ref(), message).await?;
        Ok(())
    }

    /// Generic failure reply: apologise and go back to the start menu
    async fn oops(&self, user: &mut User) {
        self.clear_pending(user.id);
        if let Err(e) = self.say(user, "t.oops").await {
            warn!(user_id = user.id, "⚠️ Failed to send oops message: {:#}", e);
        }
        if let Err(e) = self.open(Step::Start, user).await {
            warn!(user_id = user.id, "⚠️ Failed to reset user to start: {:#}", e);
        }
    }
}
