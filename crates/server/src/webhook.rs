use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use dirtybox_whatsapp::WebhookPayload;

use crate::funnel::FunnelService;

#[derive(Clone, Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

pub fn router(service: Arc<FunnelService>) -> Router {
    Router::new().route("/fbwa/webhook", post(webhook)).with_state(service)
}

/// Provider deliveries are acknowledged with 200 whenever the message was
/// routed; 4xx/5xx is reserved for failures the provider should retry.
pub async fn webhook(
    State(service): State<Arc<FunnelService>>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    let correlation_id = Uuid::new_v4().to_string();

    match service.handle(payload).await {
        Ok(()) => (
            StatusCode::OK,
            Json(WebhookAck {
                success: true,
                message: "Webhook processed successfully".to_owned(),
            }),
        ),
        Err(app_error) => {
            error!(
                event_name = "webhook.failed",
                correlation_id = %correlation_id,
                error = %app_error,
                "webhook processing failed"
            );
            let interface = app_error.into_interface(correlation_id);
            (
                StatusCode::from_u16(interface.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(WebhookAck { success: false, message: interface.user_message().to_owned() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::util::ServiceExt;

    use dirtybox_agent::ScriptedLlmClient;
    use dirtybox_backend::{BackendApi, FakeBackend};
    use dirtybox_db::{ConversationRepository, InMemoryConversationRepository};
    use dirtybox_whatsapp::{RecordingGateway, WhatsAppGateway};

    use crate::funnel::FunnelService;

    fn test_router() -> axum::Router {
        let service = FunnelService::new(
            Arc::new(InMemoryConversationRepository::new()) as Arc<dyn ConversationRepository>,
            Arc::new(RecordingGateway::new()) as Arc<dyn WhatsAppGateway>,
            Arc::new(ScriptedLlmClient::new(vec![
                "REPLY:\nWelcome to Dirty Box!\n\nJSON:\n{}",
            ])),
            Arc::new(FakeBackend::new()) as Arc<dyn BackendApi>,
            10,
            "agent-1",
        );
        super::router(Arc::new(service))
    }

    #[tokio::test]
    async fn text_delivery_is_acknowledged_with_200() {
        let response = test_router()
            .oneshot(
                Request::post("/fbwa/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{
                            "type": "text",
                            "message": {"text": {"body": "hi"}},
                            "contact_id": "c-1",
                            "sender_id": "wa-1"
                        }"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_only_delivery_is_acknowledged_with_200() {
        let response = test_router()
            .oneshot(
                Request::post("/fbwa/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"type": "text", "contact_id": "c-1", "status": "read"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_by_the_extractor() {
        let response = test_router()
            .oneshot(
                Request::post("/fbwa/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
