//! Authentication utilities for API requests
//!
//! This module provides utilities for adding provider-specific authentication
//! headers to HTTP requests.

use crate::core::providers::ProviderSession;

/// Add provider-specific authentication headers to an HTTP request
///
/// - Anthropic: Uses `x-api-key` header with `anthropic-version`
/// - All others: Use standard `Authorization: Bearer` header
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    session: &ProviderSession,
) -> reqwest::RequestBuilder {
    if session.is_anthropic_mode() {
        return request
            .header("x-api-key", &session.api_key)
            .header("anthropic-version", "2023-06-01");
    }

    request.header("Authorization", format!("Bearer {}", session.api_key))
}
