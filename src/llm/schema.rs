//! Declared output contracts for model replies.
//!
//! Every operation fixes the set of fields the model must return. A reply
//! that cannot be parsed into the declared struct is a schema failure, not
//! a partial result.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::WorkflowError;

/* ---------- output contracts ---------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutput {
    pub generated_tests: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineOutput {
    pub refined_tests: String,
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixBuildOutput {
    pub fixed_code: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeOutput {
    pub formatted_tests: String,
    pub suggestions: String,
}

/* ---------- parsing ---------- */

/// Parse a model reply into the operation's declared output struct.
pub fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, WorkflowError> {
    let body = json_body(raw)?;

    serde_json::from_str(body)
        .map_err(|e| WorkflowError::schema(format!("reply does not match output contract: {e}")))
}

/// Locate the JSON object in a model reply. Models wrap JSON in a markdown
/// fence or surround it with prose often enough that both are tolerated.
fn json_body(raw: &str) -> Result<&str, WorkflowError> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").unwrap();
    if let Some(cap) = fence.captures(raw) {
        return Ok(cap.get(1).unwrap().as_str());
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(WorkflowError::schema("no JSON object in model reply")),
    }
}
