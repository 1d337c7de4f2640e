//! Structured-output loop.
//!
//! Turns a response type into a JSON Schema, asks the backend for output
//! matching it (tool call or JSON mode, per [`StructuredMode`]), and
//! deserializes the answer. Each attempt is one HTTP request; a backend
//! rejection, a missing payload or a payload that fails to deserialize costs
//! one attempt. Deserialization errors are fed back to the model before the
//! next attempt.

use reqwest::header::HeaderMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use mosaic_core::utils::truncate_string;
use mosaic_core::{Message, Role};

use crate::client::{Client, StructuredMode};
use crate::error::{AttemptFailure, LlmError, LlmResult};
use crate::transport::HttpResponse;

/// Anthropic rejects requests without `max_tokens`.
const ANTHROPIC_FALLBACK_MAX_TOKENS: u32 = 1024;

// ─────────────────────────────────────────────
// ResponseSchema
// ─────────────────────────────────────────────

/// JSON Schema of a response type, named for use as a tool.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub description: Option<String>,
    pub schema: Value,
}

impl ResponseSchema {
    /// Generate the schema for `T`. The tool name comes from the schema title.
    pub fn of<T: JsonSchema>() -> LlmResult<Self> {
        let mut schema = serde_json::to_value(schemars::schema_for!(T))?;
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
        }

        let name = schema
            .get("title")
            .and_then(Value::as_str)
            .map(tool_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Response".to_string());
        let description = schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ResponseSchema {
            name,
            description,
            schema,
        })
    }
}

/// Tool names allow `[a-zA-Z0-9_-]` only.
fn tool_name(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

// ─────────────────────────────────────────────
// StructuredCall
// ─────────────────────────────────────────────

/// Fully resolved parameters for one structured completion.
#[derive(Clone, Debug)]
pub struct StructuredCall {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    /// Sent on every attempt, after the recipe's own headers.
    pub headers: HeaderMap,
}

enum Outcome<T> {
    Parsed(T),
    /// Rejected before a payload existed; retried unchanged.
    Rejected(AttemptFailure),
    /// Payload present but invalid; the model is asked to correct it.
    Invalid { payload: String, failure: AttemptFailure },
}

/// Run the structured-output loop for `T`.
///
/// Makes at most `max(call.max_retries, 1)` attempts. Transport errors end
/// the loop immediately.
pub async fn create<T>(client: &Client, call: StructuredCall) -> LlmResult<T>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = ResponseSchema::of::<T>()?;
    let attempts = call.max_retries.max(1);
    let mut messages = call.messages.clone();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let body = build_body(client.mode(), &schema, &call, &messages);
        let response = client.post(&call.model, &body, &call.headers).await?;

        let failure = match evaluate::<T>(client.mode(), &schema, &response) {
            Outcome::Parsed(value) => {
                debug!(provider = %client.provider(), attempt, "Structured completion succeeded");
                return Ok(value);
            }
            Outcome::Rejected(failure) => failure,
            Outcome::Invalid { payload, failure } => {
                messages.push(Message::assistant(payload));
                messages.push(Message::user(format!(
                    "Recall the function correctly, fix the errors:\n{failure}"
                )));
                failure
            }
        };

        warn!(
            provider = %client.provider(),
            attempt,
            attempts,
            failure = %truncate_string(&failure.to_string(), 300),
            "Structured completion attempt failed"
        );
        if attempt >= attempts {
            return Err(LlmError::CompletionRetryExhausted {
                attempts,
                last_failure: failure,
            });
        }
    }
}

fn evaluate<T: DeserializeOwned>(
    mode: StructuredMode,
    schema: &ResponseSchema,
    response: &HttpResponse,
) -> Outcome<T> {
    if !response.is_success() {
        return Outcome::Rejected(AttemptFailure::Backend {
            status: response.status.as_u16(),
            body: response.text(),
        });
    }
    let body: Value = match response.json() {
        Ok(body) => body,
        Err(e) => {
            return Outcome::Rejected(AttemptFailure::MissingOutput(format!(
                "response body is not JSON: {e}"
            )))
        }
    };
    let payload = match extract_payload(mode, schema, &body) {
        Ok(payload) => payload,
        Err(failure) => return Outcome::Rejected(failure),
    };
    match serde_json::from_str::<T>(&payload) {
        Ok(value) => Outcome::Parsed(value),
        Err(e) => Outcome::Invalid {
            payload,
            failure: AttemptFailure::Validation(e.to_string()),
        },
    }
}

// ─────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────

/// Request body for one attempt in the client's wire format.
pub fn build_body(
    mode: StructuredMode,
    schema: &ResponseSchema,
    call: &StructuredCall,
    messages: &[Message],
) -> Value {
    match mode {
        StructuredMode::OpenAiTools => {
            let mut function = Map::new();
            function.insert("name".into(), json!(schema.name));
            if let Some(description) = &schema.description {
                function.insert("description".into(), json!(description));
            }
            function.insert("parameters".into(), schema.schema.clone());

            let mut body = openai_base(call, openai_messages(messages));
            body.insert(
                "tools".into(),
                json!([{"type": "function", "function": function}]),
            );
            body.insert(
                "tool_choice".into(),
                json!({"type": "function", "function": {"name": schema.name}}),
            );
            Value::Object(body)
        }
        StructuredMode::OpenAiJson => {
            let mut wire = vec![json!({
                "role": "system",
                "content": json_mode_instruction(schema),
            })];
            wire.extend(openai_messages(messages));

            let mut body = openai_base(call, wire);
            body.insert("response_format".into(), json!({"type": "json_object"}));
            Value::Object(body)
        }
        StructuredMode::AnthropicTools => {
            let system: Vec<&str> = messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .collect();
            let turns: Vec<Value> = messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
                .collect();

            let mut tool = Map::new();
            tool.insert("name".into(), json!(schema.name));
            if let Some(description) = &schema.description {
                tool.insert("description".into(), json!(description));
            }
            tool.insert("input_schema".into(), schema.schema.clone());

            let mut body = Map::new();
            body.insert("model".into(), json!(call.model));
            body.insert(
                "max_tokens".into(),
                json!(call.max_tokens.unwrap_or(ANTHROPIC_FALLBACK_MAX_TOKENS)),
            );
            body.insert("temperature".into(), json!(call.temperature));
            if !system.is_empty() {
                body.insert("system".into(), json!(system.join("\n\n")));
            }
            body.insert("messages".into(), Value::Array(turns));
            body.insert("tools".into(), json!([tool]));
            body.insert(
                "tool_choice".into(),
                json!({"type": "tool", "name": schema.name}),
            );
            Value::Object(body)
        }
    }
}

fn openai_base(call: &StructuredCall, messages: Vec<Value>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("model".into(), json!(call.model));
    body.insert("messages".into(), Value::Array(messages));
    body.insert("temperature".into(), json!(call.temperature));
    if let Some(max_tokens) = call.max_tokens {
        body.insert("max_tokens".into(), json!(max_tokens));
    }
    body
}

fn openai_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect()
}

fn json_mode_instruction(schema: &ResponseSchema) -> String {
    format!(
        "Respond only with a JSON object that is a valid instance of this JSON Schema:\n\n{}\n\n\
         Return the data itself, not the schema.",
        schema.schema
    )
}

// ─────────────────────────────────────────────
// Response payloads
// ─────────────────────────────────────────────

/// The raw structured payload (a JSON document as text) from a 2xx body.
pub fn extract_payload(
    mode: StructuredMode,
    schema: &ResponseSchema,
    body: &Value,
) -> Result<String, AttemptFailure> {
    match mode {
        StructuredMode::OpenAiTools => body
            .pointer("/choices/0/message/tool_calls")
            .and_then(Value::as_array)
            .and_then(|calls| {
                calls
                    .iter()
                    .find(|c| c.pointer("/function/name").and_then(Value::as_str) == Some(schema.name.as_str()))
                    .or_else(|| calls.first())
            })
            .and_then(|call| call.pointer("/function/arguments"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AttemptFailure::MissingOutput("no tool call in the first choice".into())),
        StructuredMode::OpenAiJson => {
            let content = body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .ok_or_else(|| AttemptFailure::MissingOutput("no message content".into()))?;
            Ok(json_block(content).to_string())
        }
        StructuredMode::AnthropicTools => body
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks.iter().find(|b| {
                    b.get("type").and_then(Value::as_str) == Some("tool_use")
                        && b.get("name").and_then(Value::as_str) == Some(schema.name.as_str())
                })
            })
            .and_then(|block| block.get("input"))
            .map(Value::to_string)
            .ok_or_else(|| {
                AttemptFailure::MissingOutput(format!("no tool_use block named {}", schema.name))
            }),
    }
}

/// The JSON document inside `content`: a fenced block if present, otherwise
/// the span from the first `{` to the last `}`.
fn json_block(content: &str) -> &str {
    if let Some(start) = content.find("```") {
        let rest = &content[start + 3..];
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.find("```") {
            return rest[..end].trim();
        }
    }
    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content.trim(),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
