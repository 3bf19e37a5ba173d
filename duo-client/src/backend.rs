//! Study backend HTTP client
//!
//! Every endpoint is a JSON POST under one base URL. Response bodies go
//! through [`duo_common::wire`] so the double-encoding quirk stays out of
//! this module.

use duo_common::sample::LayoutKind;
use duo_common::session::{BackendCall, Input};
use duo_common::wire::{
    decode_body, decode_feedback_outcome, decode_import, decode_sample_batch, DoneRequest,
    FeedbackOutcome, FeedbackSubmission, ImportOutcome, ImportRequest, PostInteractionRequest,
    PostInteractionResponse, SampleBatch, SampleRequest, StartRequest, StartResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("duo-client/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Backend client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Common(#[from] duo_common::Error),
}

/// Study backend client
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
    /// `feedback` for the Interact layout, `clean` for the Clean layout
    feedback_path: &'static str,
}

impl BackendClient {
    pub fn new(base_url: &str, layout: LayoutKind) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let feedback_path = match layout {
            LayoutKind::Interact => "feedback",
            LayoutKind::Clean => "clean",
        };

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            feedback_path,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body, returning status and raw body text
    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, String), ClientError> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(url = %url, "POST");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::debug!(url = %url, status = status.as_u16(), bytes = text.len(), "Response");
        Ok((status.as_u16(), text))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(u16, T), ClientError> {
        let (status, text) = self.post(path, body).await?;
        let value = decode_body(&text)?;
        let parsed =
            serde_json::from_value(value).map_err(|e| ClientError::Parse(format!("{}: {}", path, e)))?;
        Ok((status, parsed))
    }

    /// Start or resume a participant; status tells new (201) from returning
    pub async fn start(&self, request: &StartRequest) -> Result<(u16, StartResponse), ClientError> {
        self.post_json("start", request).await
    }

    pub async fn post_interaction(
        &self,
        request: &PostInteractionRequest,
    ) -> Result<PostInteractionResponse, ClientError> {
        Ok(self.post_json("post-interaction", request).await?.1)
    }

    /// Import a scenario; a returning participant's reply may carry their sample
    pub async fn import(&self, request: &ImportRequest) -> Result<ImportOutcome, ClientError> {
        let (_, text) = self.post("import", request).await?;
        Ok(decode_import(&text)?)
    }

    pub async fn sample(&self, request: &SampleRequest) -> Result<SampleBatch, ClientError> {
        let (_, text) = self.post("sample", request).await?;
        Ok(decode_sample_batch(&text)?)
    }

    pub async fn feedback(
        &self,
        submission: &FeedbackSubmission,
    ) -> Result<FeedbackOutcome, ClientError> {
        let (_, text) = self.post(self.feedback_path, submission).await?;
        Ok(decode_feedback_outcome(&text)?)
    }

    /// Submit final comments; returns the response status
    pub async fn done(&self, request: &DoneRequest) -> Result<u16, ClientError> {
        Ok(self.post("done", request).await?.0)
    }

    /// Perform a session call and turn the reply into a session input
    pub async fn execute(&self, call: &BackendCall) -> Result<Input, ClientError> {
        match call {
            BackendCall::Start(request) => {
                let (status, response) = self.start(request).await?;
                Ok(Input::Started {
                    status,
                    scenarios: response.scenarios,
                })
            }
            BackendCall::PostInteraction(request) => Ok(Input::HeaderReceived(
                self.post_interaction(request).await?.header,
            )),
            BackendCall::Import(request) => {
                let outcome = self.import(request).await?;
                Ok(match outcome.resume {
                    Some(batch) => Input::Resumed {
                        project_id: outcome.project_id,
                        description: outcome.description,
                        batch,
                    },
                    None => Input::Imported {
                        project_id: outcome.project_id,
                        description: outcome.description,
                    },
                })
            }
            BackendCall::Sample(request) => Ok(Input::SampleReceived(self.sample(request).await?)),
            BackendCall::Feedback(submission) => {
                Ok(Input::FeedbackReceived(self.feedback(submission).await?))
            }
            BackendCall::Done(request) => Ok(Input::DoneAcknowledged {
                status: self.done(request).await?,
            }),
        }
    }
}
