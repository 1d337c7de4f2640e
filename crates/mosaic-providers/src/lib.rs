//! LLM provider layer for Mosaic.
//!
//! Structured completions against several backends over one traced HTTP
//! transport.
//!
//! # Architecture
//!
//! - [`traits::HttpTransport`]: the transport seam; [`transport::ReqwestTransport`] does the network I/O
//! - [`traced::TracedTransport`]: enforces `x-correlation-id` and records exchanges in a [`cache::CorrelationCache`]
//! - [`recipes`]: one client constructor per [`mosaic_core::ProviderIdentity`]
//! - [`factory::LlmFactory`]: settings → client, credential replacement
//! - [`invoker::complete`]: per-call overrides, correlation, timing, audit
//! - [`structured`]: schema generation and the retry loop
//! - [`audit`]: [`Completion`] wrapper and accessors

pub mod audit;
pub mod cache;
pub mod client;
pub mod error;
pub mod factory;
pub mod invoker;
pub mod recipes;
pub mod structured;
pub mod traced;
pub mod traits;
pub mod transport;

// Re-export main types for convenience
pub use audit::{get_audit, get_correlation_id, AuditData, Completion};
pub use cache::{CapturedRequest, CapturedResponse, CorrelationCache, CorrelationRecord};
pub use client::{Client, StructuredMode};
pub use error::{AttemptFailure, LlmError, LlmResult};
pub use factory::{get_llm, FactoryOptions, LlmFactory};
pub use invoker::{complete, CompletionOptions, CompletionParams};
pub use traced::TracedTransport;
pub use traits::HttpTransport;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, CORRELATION_ID_HEADER, TRACE_ID_HEADER};
