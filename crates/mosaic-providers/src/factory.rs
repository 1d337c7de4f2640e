//! Client factory: provider name → ready-to-use [`Client`].

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::info;

use mosaic_core::config::TransportConfig;
use mosaic_core::{Message, ProviderIdentity, ProviderSettings, SettingsRegistry};

use crate::audit::Completion;
use crate::client::Client;
use crate::error::LlmResult;
use crate::invoker::{self, CompletionOptions};
use crate::recipes::build_client;
use crate::traced::TracedTransport;

/// Construction options for [`LlmFactory`].
#[derive(Clone, Debug, Default)]
pub struct FactoryOptions {
    /// Forwarded to gateway providers as `x-portkey-metadata`.
    pub metadata: BTreeMap<String, String>,
    /// Share an existing traced transport (and its cache) instead of
    /// building a new one from `transport_config`.
    pub transport: Option<Arc<TracedTransport>>,
    pub transport_config: TransportConfig,
}

/// Owns one provider's client and rebuilds it when the credential changes.
pub struct LlmFactory {
    registry: Arc<SettingsRegistry>,
    provider: ProviderIdentity,
    settings: Arc<ProviderSettings>,
    transport: Arc<TracedTransport>,
    metadata: BTreeMap<String, String>,
    client: Client,
}

impl std::fmt::Debug for LlmFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmFactory")
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl LlmFactory {
    /// Factory for `provider` with a fresh transport and no metadata.
    pub fn new(registry: Arc<SettingsRegistry>, provider: ProviderIdentity) -> LlmResult<Self> {
        Self::with_options(registry, provider, FactoryOptions::default())
    }

    pub fn with_options(
        registry: Arc<SettingsRegistry>,
        provider: ProviderIdentity,
        options: FactoryOptions,
    ) -> LlmResult<Self> {
        let settings = registry.resolve(provider)?;
        let transport = match options.transport {
            Some(transport) => transport,
            None => Arc::new(TracedTransport::from_config(&options.transport_config)?),
        };
        let client = build_client(Arc::clone(&settings), Arc::clone(&transport), &options.metadata)?;

        Ok(LlmFactory {
            registry,
            provider,
            settings,
            transport,
            metadata: options.metadata,
            client,
        })
    }

    /// Factory for a provider given by wire name, e.g. `"portkey_anthropic"`.
    pub fn from_name(
        registry: Arc<SettingsRegistry>,
        name: &str,
        options: FactoryOptions,
    ) -> LlmResult<Self> {
        let provider: ProviderIdentity = name.parse()?;
        Self::with_options(registry, provider, options)
    }

    pub fn provider(&self) -> ProviderIdentity {
        self.provider
    }

    pub fn settings(&self) -> &Arc<ProviderSettings> {
        &self.settings
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn transport(&self) -> &Arc<TracedTransport> {
        &self.transport
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn registry(&self) -> &Arc<SettingsRegistry> {
        &self.registry
    }

    /// Replace the provider credential and rebuild the client.
    ///
    /// The new client is built before anything is committed, so a rejected
    /// key leaves both the factory and the registry unchanged.
    pub fn set_api_key(&mut self, api_key: &str) -> LlmResult<()> {
        let candidate = Arc::new(self.settings.with_api_key(api_key)?);
        let client = build_client(Arc::clone(&candidate), Arc::clone(&self.transport), &self.metadata)?;

        self.registry.replace_api_key(self.provider, api_key)?;
        self.settings = candidate;
        self.client = client;
        info!(provider = %self.provider, "Rebuilt client with new credential");
        Ok(())
    }

    /// Issue one structured completion with this factory's client.
    pub async fn create_completion<T>(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> LlmResult<Completion<T>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        invoker::complete(&self.client, messages, options).await
    }
}

/// Shortcut: factory for `name` with gateway `metadata` and a fresh transport.
pub fn get_llm(
    registry: Arc<SettingsRegistry>,
    name: &str,
    metadata: BTreeMap<String, String>,
) -> LlmResult<LlmFactory> {
    LlmFactory::from_name(
        registry,
        name,
        FactoryOptions {
            metadata,
            ..Default::default()
        },
    )
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use std::time::Duration;

    use schemars::JsonSchema;
    use serde::Deserialize;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use mosaic_core::config::ProvidersConfig;

    use crate::error::{AttemptFailure, LlmError};
    use crate::recipes::PORTKEY_METADATA_HEADER;
    use crate::transport::ReqwestTransport;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct UserDetail {
        name: String,
        age: u32,
    }

    fn registry(pairs: &[(&str, &str)]) -> Arc<SettingsRegistry> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(SettingsRegistry::with_source(ProvidersConfig::default(), map))
    }

    #[test]
    fn test_from_name_unknown_provider() {
        let err = LlmFactory::from_name(registry(&[]), "gemini", FactoryOptions::default()).unwrap_err();
        assert!(matches!(err, LlmError::UnsupportedProvider(_)));
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn test_missing_credential_is_configuration_error() {
        let err = LlmFactory::new(registry(&[]), ProviderIdentity::OpenAi).unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_every_provider_builds_or_fails_with_configuration() {
        let reg = registry(&[("ANTHROPIC_API_KEY", "sk-ant")]);
        for provider in ProviderIdentity::ALL {
            match LlmFactory::new(Arc::clone(&reg), provider) {
                Ok(factory) => {
                    assert_eq!(factory.provider(), provider);
                    assert!(factory.settings().validate().is_ok());
                }
                Err(err) => assert!(matches!(err, LlmError::Configuration(_))),
            }
        }
    }

    #[test]
    fn test_shared_transport_is_reused() {
        let reg = registry(&[("OPENAI_API_KEY", "sk")]);
        let shared = Arc::new(TracedTransport::from_config(&TransportConfig::default()).unwrap());
        let options = FactoryOptions {
            transport: Some(Arc::clone(&shared)),
            ..Default::default()
        };
        let a = LlmFactory::with_options(Arc::clone(&reg), ProviderIdentity::OpenAi, options.clone()).unwrap();
        let b = LlmFactory::with_options(reg, ProviderIdentity::Llama, options).unwrap();
        assert!(Arc::ptr_eq(a.transport(), &shared));
        assert!(Arc::ptr_eq(b.client().transport(), &shared));
    }

    #[test]
    fn test_get_llm_forwards_metadata() {
        let reg = registry(&[
            ("PORTKEY_API_KEY", "pk"),
            ("PORTKEY_AZURE_OPENAI_VIRTUAL_KEY", "vk"),
        ]);
        let metadata = BTreeMap::from([("team".to_string(), "search".to_string())]);
        let factory = get_llm(reg, "portkey_azure_openai", metadata).unwrap();
        assert_eq!(factory.metadata()["team"], "search");
        assert!(factory.client().headers().contains_key(PORTKEY_METADATA_HEADER));
    }

    #[test]
    fn test_set_api_key_rebuilds_client_and_updates_registry() {
        let reg = registry(&[("OPENAI_API_KEY", "sk-old")]);
        let mut factory = LlmFactory::new(Arc::clone(&reg), ProviderIdentity::OpenAi).unwrap();

        factory.set_api_key("sk-new").unwrap();

        assert_eq!(factory.settings().api_key, "sk-new");
        assert_eq!(
            factory.client().headers()["authorization"],
            "Bearer sk-new"
        );
        assert_eq!(reg.resolve(ProviderIdentity::OpenAi).unwrap().api_key, "sk-new");
    }

    #[test]
    fn test_set_api_key_rejects_bad_key_without_side_effects() {
        let reg = registry(&[("ANTHROPIC_API_KEY", "sk-old")]);
        let mut factory = LlmFactory::new(Arc::clone(&reg), ProviderIdentity::Anthropic).unwrap();

        assert!(factory.set_api_key("").is_err());
        assert!(factory.set_api_key("bad\nkey").is_err());

        assert_eq!(factory.settings().api_key, "sk-old");
        assert_eq!(reg.resolve(ProviderIdentity::Anthropic).unwrap().api_key, "sk-old");
    }

    // ── Wiremock scenarios ──

    fn john_doe() -> Vec<Message> {
        vec![Message::user("John Doe is 30 years old.")]
    }

    fn tool_call_response(arguments: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "UserDetail", "arguments": arguments}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
    }

    fn openai_factory(server: &MockServer) -> LlmFactory {
        let reg = registry(&[("OPENAI_API_KEY", "sk-test"), ("OPENAI_BASE_URL", server.uri().as_str())]);
        LlmFactory::new(reg, ProviderIdentity::OpenAi).unwrap()
    }

    #[tokio::test]
    async fn test_openai_structured_completion_with_audit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4",
                "tool_choice": {"type": "function", "function": {"name": "UserDetail"}}
            })))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .expect(1)
            .mount(&server)
            .await;

        let factory = openai_factory(&server);
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();

        assert_eq!(result.name, "John Doe");
        assert_eq!(result.age, 30);

        let id = crate::audit::get_correlation_id(&result).unwrap().to_string();
        assert!(!id.is_empty());

        let audit = crate::audit::get_audit(&result).unwrap();
        let request = audit.http_request.as_ref().unwrap();
        let response = audit.http_response.as_ref().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, format!("{}/chat/completions", server.uri()));
        assert_eq!(request.headers["authorization"], "[REDACTED]");
        assert_eq!(request.headers["x-correlation-id"], id);
        assert_eq!(request.headers["x-portkey-trace-id"], id);
        assert_eq!(request.body["model"], "gpt-4");
        assert_eq!(response.status, 200);
        assert_eq!(response.headers["x-correlation-id"], id);
        assert_eq!(response.body["choices"][0]["finish_reason"], "tool_calls");
    }

    #[tokio::test]
    async fn test_temperature_overrides_keep_retry_default() {
        let server = MockServer::start().await;
        for t in [0.2, 0.8] {
            Mock::given(method("POST"))
                .and(body_partial_json(serde_json::json!({"temperature": t})))
                .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
                .expect(1)
                .mount(&server)
                .await;
        }

        let factory = openai_factory(&server);
        for t in [0.2, 0.8] {
            let result: Completion<UserDetail> = factory
                .create_completion(john_doe(), CompletionOptions::new().temperature(t))
                .await
                .unwrap();
            assert_eq!(result.value().age, 30);
        }
        assert_eq!(factory.settings().max_retries, 3);
    }

    #[tokio::test]
    async fn test_invalid_credential_exhausts_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let factory = openai_factory(&server);
        let err = factory
            .create_completion::<UserDetail>(john_doe(), CompletionOptions::new())
            .await
            .unwrap_err();

        match err {
            LlmError::CompletionRetryExhausted {
                attempts,
                last_failure: AttemptFailure::Backend { status, body },
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, 401);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_still_makes_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let factory = openai_factory(&server);
        let err = factory
            .create_completion::<UserDetail>(john_doe(), CompletionOptions::new().max_retries(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::CompletionRetryExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_validation_error_is_fed_back_and_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": "thirty"}"#))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .mount(&server)
            .await;

        let factory = openai_factory(&server);
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();
        assert_eq!(result.age, 30);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let retry: serde_json::Value = requests[1].body_json().unwrap();
        let messages = retry["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert!(messages[1]["content"].as_str().unwrap().contains("thirty"));
        assert_eq!(messages[2]["role"], "user");

        // Both attempts share the correlation id; the audit holds the last one.
        let audit = result.audit().unwrap();
        assert_eq!(audit.http_request.as_ref().unwrap().body["messages"], retry["messages"]);
    }

    #[tokio::test]
    async fn test_caller_correlation_id_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-correlation-id", "caller-42"))
            .and(header("x-portkey-trace-id", "caller-42"))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .expect(1)
            .mount(&server)
            .await;

        let factory = openai_factory(&server);
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new().correlation_id("caller-42"))
            .await
            .unwrap();
        assert_eq!(result.correlation_id(), Some("caller-42"));
        assert!(factory.transport().get("caller-42").0.is_some());
    }

    #[tokio::test]
    async fn test_network_error_is_not_retried() {
        let reg = registry(&[("OPENAI_API_KEY", "sk"), ("OPENAI_BASE_URL", "http://127.0.0.1:1")]);
        let factory = LlmFactory::new(reg, ProviderIdentity::OpenAi).unwrap();
        let err = factory
            .create_completion::<UserDetail>(john_doe(), CompletionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }

    #[tokio::test]
    async fn test_expired_exchange_gives_empty_audit_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .mount(&server)
            .await;

        let inner = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let transport = Arc::new(TracedTransport::new(Arc::new(inner), 10, Duration::ZERO));
        let reg = registry(&[("OPENAI_API_KEY", "sk"), ("OPENAI_BASE_URL", server.uri().as_str())]);
        let factory = LlmFactory::with_options(
            reg,
            ProviderIdentity::OpenAi,
            FactoryOptions {
                transport: Some(transport),
                ..Default::default()
            },
        )
        .unwrap();

        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();
        let audit = result.audit().unwrap();
        assert!(!audit.correlation_id.is_empty());
        assert!(audit.http_request.is_none());
        assert!(audit.http_response.is_none());
    }

    #[tokio::test]
    async fn test_anthropic_tool_use_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-3-sonnet-20240229",
                "max_tokens": 1024,
                "tool_choice": {"type": "tool", "name": "UserDetail"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": "UserDetail",
                    "input": {"name": "John Doe", "age": 30}
                }],
                "stop_reason": "tool_use"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&[("ANTHROPIC_API_KEY", "sk-ant"), ("ANTHROPIC_BASE_URL", server.uri().as_str())]);
        let factory = LlmFactory::new(reg, ProviderIdentity::Anthropic).unwrap();
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();
        assert_eq!(
            result.into_inner(),
            UserDetail {
                name: "John Doe".into(),
                age: 30
            }
        );
    }

    #[tokio::test]
    async fn test_portkey_anthropic_sends_routing_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-portkey-api-key", "pk"))
            .and(header("x-portkey-provider", "anthropic"))
            .and(header("x-portkey-virtual-key", "vk-ant"))
            .and(header("x-portkey-metadata", r#"{"_user":"alice"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "tool_use", "name": "UserDetail", "input": {"name": "A", "age": 1}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&[
            ("PORTKEY_API_KEY", "pk"),
            ("PORTKEY_ANTHROPIC_VIRTUAL_KEY", "vk-ant"),
            ("PORTKEY_GATEWAY_URL", server.uri().as_str()),
        ]);
        let metadata = BTreeMap::from([("_user".to_string(), "alice".to_string())]);
        let factory = get_llm(reg, "portkey_anthropic", metadata).unwrap();
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();

        let headers = &result.audit().unwrap().http_request.as_ref().unwrap().headers;
        assert_eq!(headers["x-portkey-api-key"], "[REDACTED]");
        assert_eq!(headers["x-portkey-virtual-key"], "[REDACTED]");
        assert_eq!(headers["x-portkey-provider"], "anthropic");
    }

    #[tokio::test]
    async fn test_per_call_metadata_replaces_factory_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("x-portkey-provider", "azure-openai"))
            .and(header("x-portkey-metadata", r#"{"_user":"bob","session_id":"s-1"}"#))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("x-portkey-metadata", r#"{"_user":"alice"}"#))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&[
            ("PORTKEY_API_KEY", "pk"),
            ("PORTKEY_AZURE_OPENAI_VIRTUAL_KEY", "vk-az"),
            ("PORTKEY_GATEWAY_URL", server.uri().as_str()),
        ]);
        let factory_metadata = BTreeMap::from([("_user".to_string(), "alice".to_string())]);
        let factory = get_llm(reg, "portkey_azure_openai", factory_metadata).unwrap();

        let call_metadata = BTreeMap::from([
            ("_user".to_string(), "bob".to_string()),
            ("session_id".to_string(), "s-1".to_string()),
        ]);
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new().metadata(call_metadata))
            .await
            .unwrap();
        let headers = &result.audit().unwrap().http_request.as_ref().unwrap().headers;
        assert_eq!(headers["x-portkey-metadata"], r#"{"_user":"bob","session_id":"s-1"}"#);

        // The next call without overrides goes back to the factory metadata.
        let _: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_per_call_metadata_is_ignored_by_direct_providers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .expect(1)
            .mount(&server)
            .await;

        let factory = openai_factory(&server);
        let metadata = BTreeMap::from([("_user".to_string(), "bob".to_string())]);
        let _: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new().metadata(metadata))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key(PORTKEY_METADATA_HEADER));
    }

    #[tokio::test]
    async fn test_azure_routes_by_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/my-gpt4/chat/completions"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "az-key"))
            .respond_with(tool_call_response(r#"{"name": "John Doe", "age": 30}"#))
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&[
            ("AZURE_OPENAI_API_KEY", "az-key"),
            ("AZURE_OPENAI_API_BASE", server.uri().as_str()),
            ("AZURE_OPENAI_API_VERSION", "2024-02-01"),
        ]);
        let factory = LlmFactory::new(reg, ProviderIdentity::AzureOpenAi).unwrap();
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new().model("my-gpt4"))
            .await
            .unwrap();
        assert_eq!(result.name, "John Doe");
    }

    #[tokio::test]
    async fn test_llama_json_mode_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": "{\"name\": \"John Doe\", \"age\": 30}"
                }}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reg = registry(&[("LLAMA_BASE_URL", server.uri().as_str())]);
        let factory = LlmFactory::new(reg, ProviderIdentity::Llama).unwrap();
        let result: Completion<UserDetail> = factory
            .create_completion(john_doe(), CompletionOptions::new())
            .await
            .unwrap();
        assert_eq!(result.age, 30);
    }
}
