/*
 * Shared HTTP plumbing for provider adapters
 */

use crate::models::{Result, RouteError};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Parses a success body as JSON, or maps the error status to a provider error.
pub(crate) async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<Value>()
            .await
            .map_err(|e| RouteError::ProviderResponse(format!("body is not JSON: {e}")));
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> RouteError {
    match status.as_u16() {
        401 | 403 => RouteError::ProviderUnauthorized,
        429 => RouteError::ProviderRateLimited,
        400 | 422 => RouteError::ProviderInvalidRequest,
        404 => RouteError::ProviderNotFound,
        code @ 500..=599 => RouteError::ProviderServerError(code),
        _ => {
            let text = body.trim();
            if text.is_empty() {
                RouteError::ProviderRejected(format!("HTTP {status}"))
            } else {
                RouteError::ProviderRejected(text.to_string())
            }
        }
    }
}

pub(crate) fn transport_error(error: reqwest::Error) -> RouteError {
    if error.is_timeout() {
        RouteError::ProviderUnreachable(format!("request timed out: {error}"))
    } else {
        RouteError::ProviderUnreachable(error.to_string())
    }
}
