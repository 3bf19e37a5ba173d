//! Backend wire format
//!
//! Request and response bodies for the study backend, plus the single decode
//! adapter for its double-encoding quirk: `sample`, `feedback`, `true_pos`
//! and `false_pos` arrive as JSON *text* inside the JSON response and need a
//! second decode. Some deployments go one step further and send the whole
//! response body as a JSON string. Nothing outside this module sees either
//! quirk.

use crate::feedback::FeedbackRecord;
use crate::sample::RawSample;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `msg` value signalling the backend ended the interaction
pub const DONE_MESSAGE: &str = "[DONE]";

/// Backend scenario identifier
pub type ScenarioId = u32;

/// Accept a JSON string or number, keep its textual form
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// ========================================
// Requests
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRequest {
    pub project_id: String,
}

/// Body of a `feedback` submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSubmission {
    /// `{"<row id>": {"<column>": bool}}`
    pub feedback: Value,
    pub project_id: String,
    pub current_user_h: String,
    pub user_h_comment: String,
    /// 1 for a submission, 0 for a refresh
    pub is_new_feedback: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRequest {
    pub email: String,
    pub scenario_id: String,
    pub initial_fd: String,
    pub fd_comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostInteractionRequest {
    pub next_scenario_id: String,
    pub prev_scenario_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoneRequest {
    pub email: String,
    pub comments: String,
}

// ========================================
// Responses
// ========================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StartResponse {
    pub scenarios: Vec<ScenarioId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub project_id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Participant left this scenario mid-interaction; the reply also
    /// carries the sample, feedback and scores they left off at
    #[serde(default)]
    pub is_resuming: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostInteractionResponse {
    pub header: Vec<String>,
}

/// Scores the backend reports alongside a sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scores {
    pub true_pos: Option<Value>,
    pub false_pos: Option<Value>,
}

/// A decoded sample with its feedback records
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub sample: RawSample,
    pub feedback: Vec<FeedbackRecord>,
    pub msg: Option<String>,
    pub scores: Scores,
}

/// Reply to an `import`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub project_id: String,
    pub description: Option<String>,
    /// Sample handed over for a resumed scenario, in place of a `sample` call
    pub resume: Option<SampleBatch>,
}

/// Reply to a feedback submission
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackOutcome {
    /// Backend ended the interaction
    Done,
    /// Loop continues with a fresh sample
    Next(SampleBatch),
}

/// Parse a response body, unwrapping a body that is itself a JSON string
pub fn decode_body(body: &str) -> Result<Value> {
    match serde_json::from_str(body)? {
        Value::String(inner) => Ok(serde_json::from_str(&inner)?),
        value => Ok(value),
    }
}

/// Decode a field that may carry JSON text instead of JSON
pub fn decode_embedded<T: DeserializeOwned>(value: Value) -> Result<T> {
    match value {
        Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(serde_json::from_value(other)?),
    }
}

fn decode_score(value: Option<Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        }
        Some(other) => Some(other),
    }
}

fn take_field(object: &mut serde_json::Map<String, Value>, name: &str) -> Result<Value> {
    object
        .remove(name)
        .ok_or_else(|| Error::InvalidInput(format!("response has no {:?} field", name)))
}

fn batch_from_value(value: Value) -> Result<SampleBatch> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(Error::InvalidInput(format!(
                "response is not an object: {}",
                other
            )))
        }
    };

    let sample = RawSample::from_value(decode_embedded(take_field(&mut object, "sample")?)?)?;
    let feedback: Vec<FeedbackRecord> = decode_embedded(take_field(&mut object, "feedback")?)?;
    let msg = match object.remove("msg") {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };
    let scores = Scores {
        true_pos: decode_score(object.remove("true_pos")),
        false_pos: decode_score(object.remove("false_pos")),
    };

    Ok(SampleBatch {
        sample,
        feedback,
        msg,
        scores,
    })
}

/// Decode a `sample` response body
pub fn decode_sample_batch(body: &str) -> Result<SampleBatch> {
    batch_from_value(decode_body(body)?)
}

/// Decode an `import` response body
///
/// A resuming reply must carry a full sample batch; anything short of that
/// is an error rather than a silent fresh start.
pub fn decode_import(body: &str) -> Result<ImportOutcome> {
    let value = decode_body(body)?;
    let response: ImportResponse = serde_json::from_value(value.clone())?;
    let resume = if response.is_resuming {
        Some(batch_from_value(value)?)
    } else {
        None
    };
    Ok(ImportOutcome {
        project_id: response.project_id,
        description: response.description,
        resume,
    })
}

/// Decode a `feedback` response body
pub fn decode_feedback_outcome(body: &str) -> Result<FeedbackOutcome> {
    let value = decode_body(body)?;
    if value.get("msg").and_then(Value::as_str) == Some(DONE_MESSAGE) {
        return Ok(FeedbackOutcome::Done);
    }
    Ok(FeedbackOutcome::Next(batch_from_value(value)?))
}
