//! HTTP transport trait: the seam every backend client sends through.
//!
//! [`ReqwestTransport`](crate::transport::ReqwestTransport) does the real
//! network exchange; [`TracedTransport`](crate::traced::TracedTransport)
//! decorates any transport with correlation capture. Tests plug in their own.

use async_trait::async_trait;

use crate::error::LlmResult;
use crate::transport::{HttpRequest, HttpResponse};

/// Sends one HTTP request and returns the complete response.
///
/// Non-2xx statuses are *not* errors at this layer; only failures to complete
/// the exchange (connect, timeout, body read) are.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> LlmResult<HttpResponse>;
}
