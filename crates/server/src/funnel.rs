//! Webhook orchestration: one inbound delivery in, state reconstruction,
//! intent routing, gate dispatch, and outbound sends with log appends.

use std::sync::Arc;

use tracing::{debug, info, warn};

use dirtybox_agent::{build_messages, format_history, parse_agent_output, LlmClient, FALLBACK_REPLY};
use dirtybox_backend::{
    BackendApi, CreateSubscriptionRequest, CreateTransactionRequest, CreateUserRequest,
    PricingQuery,
};
use dirtybox_core::{
    map_button_reply, map_list_selection, next_action, pickup_schedule, reconstruct,
    ApplicationError, ButtonSelection, ContactProfile, ConversationTurn, DomainError,
    FinalizationError, GateAction, ListSelection, StructuredData, TurnKind,
};
use dirtybox_db::ConversationRepository;
use dirtybox_whatsapp::{
    menus, ButtonPrompt, InboundMessage, ListMenu, WebhookPayload, WhatsAppGateway,
};

use crate::locks::ContactLocks;

pub struct FunnelService {
    repository: Arc<dyn ConversationRepository>,
    gateway: Arc<dyn WhatsAppGateway>,
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn BackendApi>,
    locks: ContactLocks,
    history_window: u32,
    agent_sender_id: String,
}

/// Per-delivery addressing captured once from the payload.
struct TurnContext {
    contact_id: String,
    contact_wa: String,
    profile: ContactProfile,
}

impl FunnelService {
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        gateway: Arc<dyn WhatsAppGateway>,
        llm: Arc<dyn LlmClient>,
        backend: Arc<dyn BackendApi>,
        history_window: u32,
        agent_sender_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            gateway,
            llm,
            backend,
            locks: ContactLocks::new(),
            history_window,
            agent_sender_id: agent_sender_id.into(),
        }
    }

    pub async fn handle(&self, payload: WebhookPayload) -> Result<(), ApplicationError> {
        let Some(contact_id) = payload.contact_id.clone().or_else(|| payload.sender_id.clone())
        else {
            warn!(event_name = "webhook.unroutable", "delivery carried no contact or sender id");
            return Ok(());
        };

        // Delivery receipts and read notifications carry a status but no body.
        if payload.message.is_none() {
            debug!(
                event_name = "webhook.status_update",
                contact_id = %contact_id,
                status = payload.status.as_deref().unwrap_or("unknown"),
                "status-only delivery, nothing to route"
            );
            return Ok(());
        }

        let lock = self.locks.lock_for(&contact_id);
        let _guard = lock.lock().await;

        if let Some(message_id) = payload.whatsapp_message_id.as_deref() {
            if let Err(error) = self.gateway.mark_as_read(message_id).await {
                warn!(
                    event_name = "whatsapp.mark_read.failed",
                    contact_id = %contact_id,
                    error = %error,
                    "mark-as-read failed, continuing"
                );
            }
        }

        let context = TurnContext {
            contact_wa: payload.sender_id.clone().unwrap_or_else(|| contact_id.clone()),
            profile: payload.contact_profile(),
            contact_id,
        };

        let inbound = ConversationTurn::inbound(
            context.contact_id.clone(),
            context.contact_wa.clone(),
            self.agent_sender_id.clone(),
            payload.turn_kind(),
            payload.log_content(),
            payload.whatsapp_message_id.clone(),
            context.profile.clone(),
        );
        if let Err(error) = self.repository.append(inbound).await {
            // The funnel can still answer from prior history.
            warn!(
                event_name = "log.append.failed",
                contact_id = %context.contact_id,
                error = %error,
                "inbound turn was not persisted"
            );
        }

        let turns = self
            .repository
            .last_n(&context.contact_id, self.history_window)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let state = reconstruct(&turns);

        match payload.inbound_message() {
            InboundMessage::Text(text) if text.is_empty() => {
                debug!(
                    event_name = "webhook.empty_text",
                    contact_id = %context.contact_id,
                    "empty text body ignored"
                );
                Ok(())
            }
            InboundMessage::Text(text) => self.handle_text(&context, &turns, state, &text).await,
            InboundMessage::ListReply { id, title } => {
                self.handle_list_reply(&context, state, &id, &title).await
            }
            InboundMessage::ButtonReply { id, .. } => {
                self.handle_button_reply(&context, state, &id).await
            }
            InboundMessage::Unsupported { message_type } => {
                debug!(
                    event_name = "webhook.unsupported_type",
                    contact_id = %context.contact_id,
                    message_type = %message_type,
                    "unsupported message type ignored"
                );
                Ok(())
            }
        }
    }

    async fn handle_text(
        &self,
        context: &TurnContext,
        turns: &[ConversationTurn],
        state: StructuredData,
        text: &str,
    ) -> Result<(), ApplicationError> {
        // With a payment method chosen and no reference yet, the next plain
        // message is the transaction reference, not assistant chatter.
        if state.awaiting_payment_tx_id() {
            let merged = state.merged_with(&StructuredData {
                payment_tx_id: Some(text.to_owned()),
                ..StructuredData::default()
            });
            return self.dispatch(context, merged, false).await;
        }

        let history = format_history(turns, &state);
        let messages = build_messages(&history, text);

        let content = match self.llm.complete(&messages).await {
            Ok(content) => content,
            Err(error) => {
                warn!(
                    event_name = "llm.completion.failed",
                    contact_id = %context.contact_id,
                    error = %error,
                    "assistant reply failed, sending fallback"
                );
                self.send_text(context, FALLBACK_REPLY, None).await;
                return Ok(());
            }
        };

        let agent_turn = parse_agent_output(&content);
        let mut merged = match &agent_turn.snapshot {
            Some(extracted) => state.merged_with(extracted),
            None => state,
        };

        // Register before logging the reply so the snapshot on that turn
        // already carries the backend ids.
        if next_action(&merged) == GateAction::RegisterUser {
            match self.register_user(context, &merged).await {
                Ok(registered) => merged = registered,
                Err(error) => {
                    self.report_registration_failure(context, merged, &error).await;
                    return Ok(());
                }
            }
        }

        self.send_text(context, &agent_turn.reply, Some(merged.clone())).await;
        self.dispatch(context, merged, true).await
    }

    async fn handle_list_reply(
        &self,
        context: &TurnContext,
        state: StructuredData,
        id: &str,
        title: &str,
    ) -> Result<(), ApplicationError> {
        let update = match map_list_selection(id, title) {
            ListSelection::Ward(ward) => {
                StructuredData { ward_number: Some(ward), ..StructuredData::default() }
            }
            ListSelection::PropertyType(property) => {
                StructuredData { property_type: Some(property), ..StructuredData::default() }
            }
            ListSelection::BinSize { id, label } => StructuredData {
                bin_size: Some(label),
                bin_size_id: Some(id),
                ..StructuredData::default()
            },
            ListSelection::Frequency(frequency) => {
                StructuredData { frequency: Some(frequency), ..StructuredData::default() }
            }
            ListSelection::PickupDay(day) => {
                let frequency = state.frequency.clone().unwrap_or_default();
                StructuredData {
                    pickup_days: Some(pickup_schedule(day, &frequency)),
                    ..StructuredData::default()
                }
            }
            ListSelection::PricingPlan(plan_id) => {
                let plan = state
                    .pricing_options
                    .as_deref()
                    .and_then(|plans| plans.iter().find(|plan| plan.id == plan_id))
                    .cloned();
                match plan {
                    Some(plan) => StructuredData {
                        selected_plan: Some(plan),
                        ..StructuredData::default()
                    },
                    None => {
                        warn!(
                            event_name = "funnel.unknown_pricing_plan",
                            contact_id = %context.contact_id,
                            plan_id = %plan_id,
                            "pricing selection does not match any offered plan"
                        );
                        self.send_text(context, menus::apology_prompt(), Some(state)).await;
                        return Ok(());
                    }
                }
            }
            ListSelection::Unrecognized => {
                info!(
                    event_name = "funnel.unrecognized_selection",
                    contact_id = %context.contact_id,
                    id = %id,
                    "list selection fell through the id rules"
                );
                self.send_text(context, menus::selection_recorded_prompt(), Some(state)).await;
                return Ok(());
            }
        };

        let merged = state.merged_with(&update);
        self.dispatch(context, merged, false).await
    }

    async fn handle_button_reply(
        &self,
        context: &TurnContext,
        state: StructuredData,
        id: &str,
    ) -> Result<(), ApplicationError> {
        let update = match map_button_reply(id) {
            ButtonSelection::BigPurchase(answer) => {
                StructuredData { big_purchase: Some(answer), ..StructuredData::default() }
            }
            ButtonSelection::PaymentMethod(method) => {
                StructuredData { payment_method: Some(method), ..StructuredData::default() }
            }
            ButtonSelection::Unrecognized => {
                info!(
                    event_name = "funnel.unrecognized_button",
                    contact_id = %context.contact_id,
                    id = %id,
                    "button reply id is not part of the flow"
                );
                self.send_text(context, menus::selection_recorded_prompt(), Some(state)).await;
                return Ok(());
            }
        };

        let merged = state.merged_with(&update);
        self.dispatch(context, merged, false).await
    }

    /// Re-evaluates the gate table until it lands on an action that sends
    /// something (or on the assistant hand-off). Registration mutates state
    /// without sending, so it loops back for the follow-up gate.
    async fn dispatch(
        &self,
        context: &TurnContext,
        mut state: StructuredData,
        after_assistant_reply: bool,
    ) -> Result<(), ApplicationError> {
        loop {
            match next_action(&state) {
                GateAction::SendWardMenu => {
                    self.send_list(context, &menus::ward_menu(), Some(state)).await;
                    return Ok(());
                }
                GateAction::SendPropertyTypeMenu => {
                    self.send_list(context, &menus::property_type_menu(), Some(state)).await;
                    return Ok(());
                }
                // On the text path the assistant asks for the address itself;
                // the fixed prompt covers menu and button turns.
                GateAction::AskAddress => {
                    if !after_assistant_reply {
                        self.send_text(context, menus::ask_address_prompt(), Some(state)).await;
                    }
                    return Ok(());
                }
                GateAction::RegisterUser => match self.register_user(context, &state).await {
                    Ok(registered) => {
                        state = registered;
                    }
                    Err(error) => {
                        self.report_registration_failure(context, state, &error).await;
                        return Ok(());
                    }
                },
                GateAction::SendBinSizeMenu => {
                    self.send_list(context, &menus::bin_size_menu(), Some(state)).await;
                    return Ok(());
                }
                GateAction::SendFrequencyMenu => {
                    self.send_list(context, &menus::frequency_menu(), Some(state)).await;
                    return Ok(());
                }
                GateAction::SendPickupDaysMenu => {
                    self.send_list(context, &menus::pickup_days_menu(), Some(state)).await;
                    return Ok(());
                }
                GateAction::SendBigPurchaseButtons => {
                    self.send_buttons(context, &menus::big_purchase_buttons(), Some(state)).await;
                    return Ok(());
                }
                GateAction::CompleteNonSubscriber => {
                    let summary = menus::non_subscriber_summary(&state);
                    self.send_text(context, &summary, Some(state)).await;
                    return Ok(());
                }
                GateAction::CompleteSubscriber => {
                    return self.finalize_subscriber(context, state).await;
                }
                GateAction::HandOffToAssistant => {
                    if !after_assistant_reply {
                        self.send_text(context, menus::selection_recorded_prompt(), Some(state))
                            .await;
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Resolves backend ids for the collected block and ward, then registers
    /// the contact. Re-running against an existing registration returns the
    /// same user id, so retries are safe.
    async fn register_user(
        &self,
        context: &TurnContext,
        state: &StructuredData,
    ) -> Result<StructuredData, ApplicationError> {
        let block_number = require(state.block, "block")?;
        let ward_number = require(state.ward_number, "ward_number")?;
        let fullname = require(state.fullname.clone(), "fullname")?;
        let address = require(state.address.clone(), "address")?;
        let property_type = require(state.property_type, "property_type")?;

        let blocks =
            self.backend.fetch_blocks().await.map_err(|e| ApplicationError::Backend(e.to_string()))?;
        let block = blocks
            .iter()
            .find(|block| block.number == block_number)
            .ok_or(DomainError::UnservicedBlock(block_number))
            .map_err(ApplicationError::from)?;

        let wards = self
            .backend
            .fetch_wards(&block.id)
            .await
            .map_err(|e| ApplicationError::Backend(e.to_string()))?;
        let ward = wards
            .iter()
            .find(|ward| ward.number == ward_number)
            .ok_or(DomainError::WardOutOfRange(ward_number))
            .map_err(ApplicationError::from)?;

        let request = CreateUserRequest {
            fullname,
            phone: context.profile.phone.clone(),
            wa_id: context.profile.wa_id.clone(),
            address,
            property_type,
            block_id: block.id.clone(),
            ward_id: ward.id.clone(),
        };
        let created = self
            .backend
            .create_user(&request)
            .await
            .map_err(|e| ApplicationError::Backend(e.to_string()))?;

        info!(
            event_name = "funnel.user_registered",
            contact_id = %context.contact_id,
            user_id = %created.id,
            "contact registered with the backend"
        );

        Ok(state.merged_with(&StructuredData {
            block_id: Some(block.id.clone()),
            ward_id: Some(ward.id.clone()),
            user_id: Some(created.id),
            ..StructuredData::default()
        }))
    }

    /// Registration failures end the turn with a customer-facing message and
    /// an acknowledged delivery; a retried delivery would just re-run the
    /// same failing lookup.
    async fn report_registration_failure(
        &self,
        context: &TurnContext,
        state: StructuredData,
        error: &ApplicationError,
    ) {
        match error {
            ApplicationError::Domain(
                DomainError::UnservicedBlock(_) | DomainError::WardOutOfRange(_),
            ) => {
                info!(
                    event_name = "funnel.outside_service_area",
                    contact_id = %context.contact_id,
                    error = %error,
                    "collected block or ward is not serviced"
                );
                self.send_text(context, menus::outside_service_area_prompt(), Some(state)).await;
            }
            _ => {
                warn!(
                    event_name = "funnel.registration.failed",
                    contact_id = %context.contact_id,
                    error = %error,
                    "user registration failed"
                );
                self.send_text(context, menus::apology_prompt(), Some(state)).await;
            }
        }
    }

    /// Subscriber completion walks pricing, payment method, and transaction
    /// reference in order, one prompt per inbound turn. Backend creates are
    /// best-effort at-least-once: failures are logged, never compensated,
    /// and the closing summary goes out either way.
    async fn finalize_subscriber(
        &self,
        context: &TurnContext,
        mut state: StructuredData,
    ) -> Result<(), ApplicationError> {
        if state.subscription_id.is_some() && state.payment_tx_id.is_some() {
            debug!(
                event_name = "funnel.already_finalized",
                contact_id = %context.contact_id,
                "subscription and payment already recorded"
            );
            return Ok(());
        }

        if state.selected_plan.is_none() {
            if state.pricing_options.as_deref().map_or(true, |plans| plans.is_empty()) {
                let query = PricingQuery {
                    bin_size_id: require(state.bin_size_id.clone(), "bin_size_id")?,
                    frequency: require(state.frequency.clone(), "frequency")?,
                    property_type: require(state.property_type, "property_type")?,
                };
                let plans = self
                    .backend
                    .fetch_pricing_options(&query)
                    .await
                    .map_err(|e| ApplicationError::Backend(e.to_string()))?;
                state.pricing_options = Some(plans);
            }
            let plans = state.pricing_options.clone().unwrap_or_default();
            self.send_list(context, &menus::pricing_menu(&plans), Some(state)).await;
            return Ok(());
        }

        if state.payment_method.is_none() {
            self.send_buttons(context, &menus::payment_method_buttons(), Some(state)).await;
            return Ok(());
        }

        if state.payment_tx_id.is_none() {
            self.send_text(context, menus::ask_transaction_id_prompt(), Some(state)).await;
            return Ok(());
        }

        let plan = require(state.selected_plan.clone(), "selected_plan")?;
        let amount_due = plan.discounted_price.unwrap_or(plan.price);

        if state.subscription_id.is_none() {
            let request = CreateSubscriptionRequest {
                user_id: require(state.user_id.clone(), "user_id")?,
                bin_size_id: require(state.bin_size_id.clone(), "bin_size_id")?,
                pricing_id: plan.id.clone(),
                price: amount_due,
                frequency: require(state.frequency.clone(), "frequency")?,
                pickup_days: state.pickup_days.clone().unwrap_or_default(),
                big_purchase: require(state.big_purchase, "big_purchase")?,
            };
            match self.backend.create_subscription(&request).await {
                Ok(created) => state.subscription_id = Some(created.id),
                Err(error) => {
                    // The summary still closes the funnel; the record is
                    // raised manually from the message log.
                    warn!(
                        event_name = "funnel.subscription.failed",
                        contact_id = %context.contact_id,
                        error = %error,
                        "subscription create failed"
                    );
                    self.send_text(context, menus::apology_prompt(), None).await;
                }
            }
        }

        if let Some(subscription_id) = state.subscription_id.clone() {
            let transaction = CreateTransactionRequest {
                user_id: require(state.user_id.clone(), "user_id")?,
                subscription_id,
                amount: amount_due,
                currency: plan.currency.clone(),
                payment_method: require(state.payment_method, "payment_method")?
                    .as_str()
                    .to_owned(),
                transaction_ref: require(state.payment_tx_id.clone(), "payment_tx_id")?,
            };
            if let Err(error) = self.backend.create_transaction(&transaction).await {
                // Subscription exists; the payment record is reconciled manually.
                warn!(
                    event_name = "funnel.transaction.failed",
                    contact_id = %context.contact_id,
                    subscription_id = state.subscription_id.as_deref().unwrap_or("unknown"),
                    error = %error,
                    "transaction create failed after subscription create"
                );
            }
        }

        info!(
            event_name = "funnel.subscriber_completed",
            contact_id = %context.contact_id,
            subscription_id = state.subscription_id.as_deref().unwrap_or("unknown"),
            "subscriber funnel completed"
        );
        let summary = menus::subscriber_summary(&state);
        self.send_text(context, &summary, Some(state)).await;
        Ok(())
    }

    async fn send_text(
        &self,
        context: &TurnContext,
        text: &str,
        snapshot: Option<StructuredData>,
    ) {
        let failed = match self.gateway.send_text(&context.contact_id, text).await {
            Ok(()) => false,
            Err(error) => {
                warn!(
                    event_name = "whatsapp.send.failed",
                    contact_id = %context.contact_id,
                    error = %error,
                    "text send failed"
                );
                true
            }
        };
        self.append_outbound(context, TurnKind::Text, text, snapshot, failed).await;
    }

    async fn send_list(
        &self,
        context: &TurnContext,
        menu: &ListMenu,
        snapshot: Option<StructuredData>,
    ) {
        let failed = match self.gateway.send_list(&context.contact_id, menu).await {
            Ok(()) => false,
            Err(error) => {
                warn!(
                    event_name = "whatsapp.send.failed",
                    contact_id = %context.contact_id,
                    error = %error,
                    "list send failed"
                );
                true
            }
        };
        self.append_outbound(context, TurnKind::Interactive, &menu.body, snapshot, failed).await;
    }

    async fn send_buttons(
        &self,
        context: &TurnContext,
        prompt: &ButtonPrompt,
        snapshot: Option<StructuredData>,
    ) {
        let failed = match self.gateway.send_buttons(&context.contact_id, prompt).await {
            Ok(()) => false,
            Err(error) => {
                warn!(
                    event_name = "whatsapp.send.failed",
                    contact_id = %context.contact_id,
                    error = %error,
                    "button send failed"
                );
                true
            }
        };
        self.append_outbound(context, TurnKind::Interactive, &prompt.body, snapshot, failed).await;
    }

    async fn append_outbound(
        &self,
        context: &TurnContext,
        kind: TurnKind,
        content: &str,
        snapshot: Option<StructuredData>,
        failed: bool,
    ) {
        let mut turn = ConversationTurn::outbound(
            context.contact_id.clone(),
            self.agent_sender_id.clone(),
            context.contact_wa.clone(),
            kind,
            content,
            snapshot,
            context.profile.clone(),
        );
        turn.is_failed = failed;

        if let Err(error) = self.repository.append(turn).await {
            warn!(
                event_name = "log.append.failed",
                contact_id = %context.contact_id,
                error = %error,
                "outbound turn was not persisted"
            );
        }
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ApplicationError> {
    value.ok_or_else(|| ApplicationError::from(FinalizationError::MissingField { field }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use dirtybox_agent::ScriptedLlmClient;
    use dirtybox_backend::{Block, FakeBackend, Ward};
    use dirtybox_core::{
        ContactProfile, ConversationTurn, PaymentMethod, PricingPlan, PropertyType, StructuredData,
        TurnKind, Weekday,
    };
    use dirtybox_db::{ConversationRepository, InMemoryConversationRepository};
    use dirtybox_whatsapp::payload::{
        ContactMeta, InteractiveBody, MessageBody, ReplyOption, TextBody,
    };
    use dirtybox_whatsapp::{RecordingGateway, SentMessage, WebhookPayload};

    use super::FunnelService;

    fn text_payload(body: &str) -> WebhookPayload {
        WebhookPayload {
            message_type: "text".to_owned(),
            message: Some(MessageBody {
                text: Some(TextBody { body: body.to_owned() }),
                interactive: None,
            }),
            contact: Some(ContactMeta {
                name: Some("Asha Rao".to_owned()),
                phone_no: Some("+91123".to_owned()),
                wa_id: Some("wa-1".to_owned()),
            }),
            contact_id: Some("c-1".to_owned()),
            sender_id: Some("wa-1".to_owned()),
            whatsapp_message_id: Some("wamid.1".to_owned()),
            ..WebhookPayload::default()
        }
    }

    fn list_payload(id: &str, title: &str) -> WebhookPayload {
        WebhookPayload {
            message_type: "interactive".to_owned(),
            message: Some(MessageBody {
                text: None,
                interactive: Some(InteractiveBody {
                    reply_type: Some("list_reply".to_owned()),
                    list_reply: Some(ReplyOption {
                        id: id.to_owned(),
                        title: title.to_owned(),
                        description: None,
                    }),
                    button_reply: None,
                }),
            }),
            contact_id: Some("c-1".to_owned()),
            sender_id: Some("wa-1".to_owned()),
            whatsapp_message_id: Some("wamid.2".to_owned()),
            ..WebhookPayload::default()
        }
    }

    fn button_payload(id: &str, title: &str) -> WebhookPayload {
        WebhookPayload {
            message_type: "interactive".to_owned(),
            message: Some(MessageBody {
                text: None,
                interactive: Some(InteractiveBody {
                    reply_type: Some("button_reply".to_owned()),
                    list_reply: None,
                    button_reply: Some(ReplyOption {
                        id: id.to_owned(),
                        title: title.to_owned(),
                        description: None,
                    }),
                }),
            }),
            contact_id: Some("c-1".to_owned()),
            sender_id: Some("wa-1".to_owned()),
            whatsapp_message_id: Some("wamid.3".to_owned()),
            ..WebhookPayload::default()
        }
    }

    struct Harness {
        repository: Arc<InMemoryConversationRepository>,
        gateway: Arc<RecordingGateway>,
        backend: Arc<FakeBackend>,
        service: FunnelService,
    }

    fn harness(llm: ScriptedLlmClient, backend: FakeBackend) -> Harness {
        let repository = Arc::new(InMemoryConversationRepository::new());
        let gateway = Arc::new(RecordingGateway::new());
        let backend = Arc::new(backend);
        let service = FunnelService::new(
            Arc::clone(&repository) as Arc<dyn ConversationRepository>,
            Arc::clone(&gateway) as Arc<dyn super::WhatsAppGateway>,
            Arc::new(llm),
            Arc::clone(&backend) as Arc<dyn super::BackendApi>,
            10,
            "agent-1",
        );
        Harness { repository, gateway, backend, service }
    }

    async fn seed_snapshot(harness: &Harness, snapshot: StructuredData) {
        harness
            .repository
            .append(ConversationTurn::outbound(
                "c-1",
                "agent-1",
                "wa-1",
                TurnKind::Text,
                "seed",
                Some(snapshot),
                ContactProfile::default(),
            ))
            .await
            .expect("seed turn");
    }

    fn registered_subscriber() -> StructuredData {
        StructuredData {
            fullname: Some("Asha Rao".to_owned()),
            block: Some(6),
            ward_number: Some(430),
            property_type: Some(PropertyType::Domestic),
            address: Some("12 Canal Road".to_owned()),
            wants_subscription: Some(true),
            block_id: Some("blk-6".to_owned()),
            ward_id: Some("wrd-430".to_owned()),
            user_id: Some("usr-0".to_owned()),
            bin_size: Some("240L Bin".to_owned()),
            bin_size_id: Some("66a0f1e2d3c4b5a697881921".to_owned()),
            frequency: Some("twice_per_week".to_owned()),
            pickup_days: Some(vec![Weekday::Monday, Weekday::Wednesday]),
            big_purchase: Some(false),
            ..StructuredData::default()
        }
    }

    fn test_plan() -> PricingPlan {
        PricingPlan {
            id: "65f1a2b3c4d5e6f708192a3b".to_owned(),
            name: "Twice a week 240L".to_owned(),
            price: Decimal::new(50_000, 2),
            discounted_price: Some(Decimal::new(45_000, 2)),
            currency: "INR".to_owned(),
        }
    }

    #[tokio::test]
    async fn text_message_gets_assistant_reply_and_logged_snapshot() {
        let llm = ScriptedLlmClient::new(vec![
            "REPLY:\nThanks, Asha! Could you share your block number?\n\nJSON:\n{\"fullname\": \"Asha Rao\"}",
        ]);
        let harness = harness(llm, FakeBackend::new());

        harness.service.handle(text_payload("My name is Asha Rao")).await.expect("handle");

        let sent = harness.gateway.sent();
        assert!(matches!(sent[0], SentMessage::MarkRead { ref message_id } if message_id == "wamid.1"));
        assert!(
            matches!(sent[1], SentMessage::Text { ref text, .. } if text.starts_with("Thanks, Asha"))
        );

        let turns = harness.repository.turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].snapshot.is_none());
        let snapshot = turns[1].snapshot.as_ref().expect("outbound snapshot");
        assert_eq!(snapshot.fullname.as_deref(), Some("Asha Rao"));
    }

    #[tokio::test]
    async fn block_six_extraction_triggers_the_ward_menu() {
        let llm = ScriptedLlmClient::new(vec![
            "REPLY:\nGreat, Block 6 it is!\n\nJSON:\n{\"fullname\": \"Asha Rao\", \"block\": 6}",
        ]);
        let harness = harness(llm, FakeBackend::new());

        harness.service.handle(text_payload("block 6")).await.expect("handle");

        let sent = harness.gateway.sent();
        // mark-read, assistant reply, then the deterministic ward menu
        assert_eq!(sent.len(), 3);
        let SentMessage::List { menu, .. } = &sent[2] else {
            panic!("expected ward menu, got {:?}", sent[2]);
        };
        assert_eq!(menu.sections[0].rows.len(), 6);
        assert_eq!(menu.sections[0].rows[0].id, "429");
    }

    #[tokio::test]
    async fn ward_selection_sends_the_property_type_menu() {
        let harness = harness(ScriptedLlmClient::new(vec![]), FakeBackend::new());
        seed_snapshot(
            &harness,
            StructuredData {
                fullname: Some("Asha Rao".to_owned()),
                block: Some(6),
                ..StructuredData::default()
            },
        )
        .await;

        harness.service.handle(list_payload("430", "Ward 430")).await.expect("handle");

        let sent = harness.gateway.sent();
        let SentMessage::List { menu, .. } = sent.last().expect("one send") else {
            panic!("expected property menu");
        };
        assert!(menu.body.contains("property"));

        let last = harness.repository.turns().pop().expect("outbound turn");
        assert_eq!(last.snapshot.expect("snapshot").ward_number, Some(430));
    }

    #[tokio::test]
    async fn address_extraction_registers_the_user_then_continues() {
        let llm = ScriptedLlmClient::new(vec![
            "REPLY:\nThanks! Would you like a pickup subscription?\n\nJSON:\n{\"fullname\": \"Asha Rao\", \"block\": 6, \"ward_number\": 430, \"property_type\": \"Domestic\", \"address\": \"12 Canal Road\"}",
        ]);
        let backend = FakeBackend::new()
            .with_blocks(vec![Block { id: "blk-6".to_owned(), number: 6 }])
            .with_wards(vec![Ward { id: "wrd-430".to_owned(), number: 430 }]);
        let harness = harness(llm, backend);

        harness.service.handle(text_payload("12 Canal Road")).await.expect("handle");

        let users = harness.backend.created_users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].block_id, "blk-6");
        assert_eq!(users[0].ward_id, "wrd-430");

        let last = harness.repository.turns().pop().expect("outbound turn");
        let snapshot = last.snapshot.expect("snapshot");
        assert_eq!(snapshot.user_id.as_deref(), Some("usr-0"));
    }

    #[tokio::test]
    async fn big_purchase_answer_completes_collection_and_offers_pricing() {
        let backend = FakeBackend::new().with_pricing(vec![test_plan()]);
        let harness = harness(ScriptedLlmClient::new(vec![]), backend);
        let mut seeded = registered_subscriber();
        seeded.big_purchase = None;
        seed_snapshot(&harness, seeded).await;

        harness.service.handle(button_payload("big_purchase_no", "No")).await.expect("handle");

        let sent = harness.gateway.sent();
        let SentMessage::List { menu, .. } = sent.last().expect("send") else {
            panic!("expected pricing menu");
        };
        assert_eq!(menu.sections[0].rows[0].id, "pricing_65f1a2b3c4d5e6f708192a3b");

        let last = harness.repository.turns().pop().expect("outbound turn");
        let snapshot = last.snapshot.expect("snapshot");
        assert_eq!(snapshot.big_purchase, Some(false));
        assert_eq!(snapshot.pricing_options.expect("options").len(), 1);
    }

    #[tokio::test]
    async fn plan_selection_then_payment_then_tx_reference_finalizes() {
        let harness = harness(ScriptedLlmClient::new(vec![]), FakeBackend::new());
        let mut seeded = registered_subscriber();
        seeded.pricing_options = Some(vec![test_plan()]);
        seed_snapshot(&harness, seeded).await;

        harness
            .service
            .handle(list_payload("pricing_65f1a2b3c4d5e6f708192a3b", "Twice a week 240L"))
            .await
            .expect("plan");
        let sent = harness.gateway.sent();
        assert!(matches!(sent.last(), Some(SentMessage::Buttons { prompt, .. }) if prompt.body.contains("pay")));

        harness
            .service
            .handle(button_payload("payment_bank_transfer", "Bank transfer"))
            .await
            .expect("payment method");
        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("transaction reference"))
        );

        harness.service.handle(text_payload("TXN-0042")).await.expect("tx reference");

        let subscriptions = harness.backend.created_subscriptions();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].pricing_id, "65f1a2b3c4d5e6f708192a3b");
        assert_eq!(subscriptions[0].price, Decimal::new(45_000, 2));
        assert_eq!(subscriptions[0].pickup_days, vec![Weekday::Monday, Weekday::Wednesday]);

        let transactions = harness.backend.created_transactions();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].transaction_ref, "TXN-0042");
        assert_eq!(transactions[0].amount, Decimal::new(45_000, 2));
        assert_eq!(transactions[0].payment_method, "bank_transfer");

        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("all set"))
        );

        let last = harness.repository.turns().pop().expect("outbound turn");
        let snapshot = last.snapshot.expect("snapshot");
        assert_eq!(snapshot.payment_method, Some(PaymentMethod::BankTransfer));
        assert_eq!(snapshot.payment_tx_id.as_deref(), Some("TXN-0042"));
        assert!(snapshot.subscription_id.is_some());
    }

    #[tokio::test]
    async fn property_type_selection_asks_for_the_address() {
        let harness = harness(ScriptedLlmClient::new(vec![]), FakeBackend::new());
        seed_snapshot(
            &harness,
            StructuredData {
                fullname: Some("Asha Rao".to_owned()),
                block: Some(6),
                ward_number: Some(430),
                ..StructuredData::default()
            },
        )
        .await;

        harness.service.handle(list_payload("domestic", "Domestic")).await.expect("handle");

        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("address"))
        );

        let last = harness.repository.turns().pop().expect("outbound turn");
        let snapshot = last.snapshot.expect("snapshot");
        assert_eq!(snapshot.property_type, Some(PropertyType::Domestic));
    }

    #[tokio::test]
    async fn subscription_create_failure_still_sends_the_summary() {
        let mut backend = FakeBackend::new();
        backend.fail_subscriptions = true;
        let harness = harness(ScriptedLlmClient::new(vec![]), backend);
        let mut seeded = registered_subscriber();
        seeded.pricing_options = Some(vec![test_plan()]);
        seeded.selected_plan = Some(test_plan());
        seeded.payment_method = Some(PaymentMethod::BankTransfer);
        seed_snapshot(&harness, seeded).await;

        harness.service.handle(text_payload("TXN-0099")).await.expect("handled failure");

        assert!(harness.backend.created_subscriptions().is_empty());
        assert!(harness.backend.created_transactions().is_empty());

        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("all set"))
        );
        let last = harness.repository.turns().pop().expect("outbound turn");
        let snapshot = last.snapshot.expect("snapshot");
        assert_eq!(snapshot.payment_tx_id.as_deref(), Some("TXN-0099"));
        assert!(snapshot.subscription_id.is_none());
    }

    #[tokio::test]
    async fn unserviced_block_ends_with_the_service_area_message() {
        let llm = ScriptedLlmClient::new(vec![
            "REPLY:\nThanks!\n\nJSON:\n{\"fullname\": \"Asha Rao\", \"block\": 6, \"ward_number\": 430, \"property_type\": \"Domestic\", \"address\": \"12 Canal Road\"}",
        ]);
        // No serviced blocks: the lookup cannot resolve block 6.
        let harness = harness(llm, FakeBackend::new());

        harness.service.handle(text_payload("12 Canal Road")).await.expect("handled");

        assert!(harness.backend.created_users().is_empty());
        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("don't cover your area"))
        );
    }

    #[tokio::test]
    async fn pickup_day_selection_expands_to_the_full_schedule() {
        let harness = harness(ScriptedLlmClient::new(vec![]), FakeBackend::new());
        let mut seeded = registered_subscriber();
        seeded.pickup_days = None;
        seeded.big_purchase = None;
        seed_snapshot(&harness, seeded).await;

        harness.service.handle(list_payload("monday", "Monday")).await.expect("handle");

        let last = harness.repository.turns().pop().expect("outbound turn");
        let snapshot = last.snapshot.expect("snapshot");
        assert_eq!(snapshot.pickup_days, Some(vec![Weekday::Monday, Weekday::Wednesday]));

        // next gate after pickup days is the big-purchase question
        let sent = harness.gateway.sent();
        assert!(matches!(sent.last(), Some(SentMessage::Buttons { .. })));
    }

    #[tokio::test]
    async fn llm_failure_sends_fallback_without_snapshot() {
        let harness = harness(ScriptedLlmClient::failing(), FakeBackend::new());

        harness.service.handle(text_payload("hello")).await.expect("handle");

        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("trouble"))
        );
        let last = harness.repository.turns().pop().expect("outbound turn");
        assert!(last.snapshot.is_none());
    }

    #[tokio::test]
    async fn status_only_payload_is_acknowledged_without_sends() {
        let harness = harness(ScriptedLlmClient::new(vec![]), FakeBackend::new());
        let payload = WebhookPayload {
            message_type: "text".to_owned(),
            contact_id: Some("c-1".to_owned()),
            status: Some("delivered".to_owned()),
            ..WebhookPayload::default()
        };

        harness.service.handle(payload).await.expect("handle");

        assert!(harness.gateway.sent().is_empty());
        assert!(harness.repository.turns().is_empty());
    }

    #[tokio::test]
    async fn non_subscriber_with_callback_time_gets_the_closing_summary() {
        let llm = ScriptedLlmClient::new(vec![
            "REPLY:\nThank you, Asha!\n\nJSON:\n{\"fullname\": \"Asha Rao\", \"block\": 6, \"ward_number\": 430, \"property_type\": \"Domestic\", \"address\": \"12 Canal Road\", \"wants_subscription\": false, \"free_time\": \"10am\"}",
        ]);
        let harness = harness(llm, FakeBackend::new());
        seed_snapshot(
            &harness,
            StructuredData { user_id: Some("usr-0".to_owned()), ..StructuredData::default() },
        )
        .await;

        harness.service.handle(text_payload("around 10am works")).await.expect("handle");

        let sent = harness.gateway.sent();
        assert!(
            matches!(sent.last(), Some(SentMessage::Text { text, .. }) if text.contains("call you around 10am"))
        );
        assert!(harness.backend.created_subscriptions().is_empty());
    }
}
