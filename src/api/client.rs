use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use super::errors::ApiError;
use super::retry::{with_retry, RetryConfig};
use super::types::{
    Ack, ApiEnvelope, AvailableSessions, BranchUpdate, GenerateScheduleRequest, Trainer,
    TrainerPreferences, TrainerSelection,
};
use crate::config::ApiConfig;

/// Backend calls consumed by the package workflow engine.
///
/// `workflow_status` hands back the raw envelope so the status client can apply
/// its own normalization; every other call has already checked `success`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn workflow_status(
        &self,
        registration_id: &str,
    ) -> Result<ApiEnvelope<serde_json::Value>, ApiError>;

    async fn update_branch(&self, registration_id: &str, branch_id: &str) -> Result<Ack, ApiError>;

    async fn available_trainers(
        &self,
        registration_id: &str,
        preferences: &TrainerPreferences,
    ) -> Result<Vec<Trainer>, ApiError>;

    async fn select_trainer(
        &self,
        registration_id: &str,
        trainer_id: &str,
        preferences: &TrainerPreferences,
    ) -> Result<Ack, ApiError>;

    async fn available_sessions(&self, registration_id: &str)
        -> Result<AvailableSessions, ApiError>;

    async fn generate_schedule(
        &self,
        registration_id: &str,
        request: &GenerateScheduleRequest,
    ) -> Result<Ack, ApiError>;

    async fn complete_workflow(&self, registration_id: &str) -> Result<Ack, ApiError>;
}

/// reqwest-backed implementation with a request timeout, transport retries and
/// an in-memory bearer token that is dropped on 401.
#[derive(Debug)]
pub struct HttpWorkflowApi {
    client: ClientWithMiddleware,
    endpoint_root: String,
    credentials: RwLock<Option<String>>,
}

impl HttpWorkflowApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let retry = RetryConfig {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..RetryConfig::default()
        };

        let endpoint_root = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.workflow_path.trim_matches('/')
        );

        Ok(Self {
            client: with_retry(http, &retry),
            endpoint_root,
            credentials: RwLock::new(config.token.clone()),
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.credentials.write() {
            *guard = token;
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.token().is_some()
    }

    pub fn clear_credentials(&self) {
        self.set_token(None);
    }

    fn token(&self) -> Option<String> {
        self.credentials.read().ok().and_then(|guard| guard.clone())
    }

    fn endpoint(&self, call: &str, registration_id: &str) -> String {
        format!("{}/{}/{}", self.endpoint_root, call, registration_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn json_body<B: Serialize>(request: RequestBuilder, body: &B) -> Result<RequestBuilder, ApiError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ApiError::malformed(format!("could not encode request body: {e}")))?;
        Ok(request.header(CONTENT_TYPE, "application/json").body(bytes))
    }

    /// Send a request and map the HTTP outcome onto the error taxonomy.
    /// The returned envelope has not had its `success` flag checked.
    async fn send(&self, request: RequestBuilder) -> Result<ApiEnvelope<serde_json::Value>, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body).ok();
        let message = envelope.as_ref().and_then(|e| e.message.clone());

        debug!(status = status.as_u16(), "Workflow backend responded");

        match status.as_u16() {
            401 => {
                warn!("Backend rejected credentials, clearing cached token");
                self.clear_credentials();
                Err(ApiError::Unauthorized)
            }
            409 => Err(ApiError::Conflict { message }),
            code @ 400..=499 => Err(ApiError::Rejected {
                status: Some(code),
                message,
            }),
            code @ 500..=599 => Err(ApiError::Server {
                status: code,
                message,
            }),
            _ if status.is_success() => {
                envelope.ok_or_else(|| ApiError::malformed("response body is not a JSON envelope"))
            }
            code => Err(ApiError::malformed(format!("unexpected HTTP status {code}"))),
        }
    }

    fn require_success(
        envelope: ApiEnvelope<serde_json::Value>,
    ) -> Result<ApiEnvelope<serde_json::Value>, ApiError> {
        match envelope.success {
            Some(true) => Ok(envelope),
            Some(false) => Err(ApiError::Rejected {
                status: None,
                message: envelope.message,
            }),
            None => Err(ApiError::malformed("missing success flag")),
        }
    }

    async fn send_for_ack(&self, request: RequestBuilder) -> Result<Ack, ApiError> {
        let envelope = Self::require_success(self.send(request).await?)?;
        Ok(Ack {
            message: envelope.message,
        })
    }

    async fn send_for_data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let envelope = Self::require_success(self.send(request).await?)?;
        let data = envelope
            .data
            .ok_or_else(|| ApiError::malformed("missing data"))?;
        serde_json::from_value(data).map_err(|e| ApiError::malformed(e.to_string()))
    }
}

#[async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn workflow_status(
        &self,
        registration_id: &str,
    ) -> Result<ApiEnvelope<serde_json::Value>, ApiError> {
        let url = self.endpoint("workflow-status", registration_id);
        debug!(%url, "Fetching workflow status");
        self.send(self.client.get(url)).await
    }

    async fn update_branch(&self, registration_id: &str, branch_id: &str) -> Result<Ack, ApiError> {
        let url = self.endpoint("branch", registration_id);
        let request = Self::json_body(self.client.patch(url), &BranchUpdate { branch_id })?;
        let ack = self.send_for_ack(request).await?;
        info!(registration_id, branch_id, "Branch updated");
        Ok(ack)
    }

    async fn available_trainers(
        &self,
        registration_id: &str,
        preferences: &TrainerPreferences,
    ) -> Result<Vec<Trainer>, ApiError> {
        let url = self.endpoint("available-trainers", registration_id);
        let request = Self::json_body(self.client.post(url), preferences)?;
        self.send_for_data(request).await
    }

    async fn select_trainer(
        &self,
        registration_id: &str,
        trainer_id: &str,
        preferences: &TrainerPreferences,
    ) -> Result<Ack, ApiError> {
        let url = self.endpoint("select-trainer", registration_id);
        let body = TrainerSelection {
            trainer_id,
            preferences,
        };
        let request = Self::json_body(self.client.post(url), &body)?;
        let ack = self.send_for_ack(request).await?;
        info!(registration_id, trainer_id, "Trainer selected");
        Ok(ack)
    }

    async fn available_sessions(
        &self,
        registration_id: &str,
    ) -> Result<AvailableSessions, ApiError> {
        let url = self.endpoint("available-sessions", registration_id);
        self.send_for_data(self.client.get(url)).await
    }

    async fn generate_schedule(
        &self,
        registration_id: &str,
        request: &GenerateScheduleRequest,
    ) -> Result<Ack, ApiError> {
        let url = self.endpoint("generate-schedule", registration_id);
        let builder = Self::json_body(self.client.post(url), request)?;
        let ack = self.send_for_ack(builder).await?;
        info!(
            registration_id,
            sessions = request.entries.len(),
            "Schedule generated"
        );
        Ok(ack)
    }

    async fn complete_workflow(&self, registration_id: &str) -> Result<Ack, ApiError> {
        let url = self.endpoint("complete-workflow", registration_id);
        let ack = self.send_for_ack(self.client.post(url)).await?;
        info!(registration_id, "Workflow completed");
        Ok(ack)
    }
}
