/*
 * REST API module for the route comparison service
 */

use rocket::http::{ContentType, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, FromForm, Request, State};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::error;
use crate::config::ServerConfig;
use crate::models::{RouteError, RouteRequest};
use crate::utils::is_address_for_chain;
use crate::service::{CompareResponse, CompareService, ServiceStatus, TokenValidation};

pub struct ApiState {
    pub service: Arc<CompareService>,
}

type ApiResult<T> = std::result::Result<Json<T>, Custom<Json<Value>>>;

/// Raw compare body; every field is checked by hand so a missing one gets a named error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareBody {
    pub chain_id: Option<Value>,
    pub token_in: Option<Value>,
    pub token_out: Option<Value>,
    pub amount_in: Option<Value>,
    pub slippage_bps: Option<Value>,
    pub from_address: Option<Value>,
    pub to_address: Option<Value>,
}

impl CompareBody {
    pub fn into_request(self) -> std::result::Result<RouteRequest, String> {
        let chain_id = require(self.chain_id, "chainId")?;
        let token_in = require(self.token_in, "tokenIn")?;
        let token_out = require(self.token_out, "tokenOut")?;
        let amount_in = require(self.amount_in, "amountIn")?;
        let slippage_bps = require(self.slippage_bps, "slippageBps")?;

        Ok(RouteRequest {
            chain_id: as_u64(&chain_id).ok_or("Invalid field: chainId")?,
            token_in: as_string(&token_in),
            token_out: as_string(&token_out),
            amount_in: as_string(&amount_in),
            slippage_bps: as_u64(&slippage_bps)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or("Invalid field: slippageBps")?,
            from_address: optional_address(self.from_address, chain_id_of(&chain_id), "fromAddress")?,
            to_address: optional_address(self.to_address, chain_id_of(&chain_id), "toAddress")?,
        })
    }
}

fn chain_id_of(value: &Value) -> u64 {
    as_u64(value).unwrap_or_default()
}

/// Null or blank counts as absent; anything else must be an address on the chain.
fn optional_address(value: Option<Value>, chain_id: u64, name: &str) -> std::result::Result<Option<String>, String> {
    match value.filter(|v| !v.is_null()).map(|v| as_string(&v)).filter(|s| !s.is_empty()) {
        Some(address) if is_address_for_chain(chain_id, &address) => Ok(Some(address)),
        Some(_) => Err(format!("Invalid field: {name}")),
        None => Ok(None),
    }
}

fn require(value: Option<Value>, name: &str) -> std::result::Result<Value, String> {
    value.ok_or_else(|| format!("Missing field: {name}"))
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn error_body(status: Status, message: impl Into<String>) -> Custom<Json<Value>> {
    Custom(status, Json(json!({ "error": message.into() })))
}

#[post("/api/routes/compare", data = "<body>")]
pub async fn compare_routes(
    body: Json<CompareBody>,
    client_ip: Option<IpAddr>,
    state: &State<ApiState>,
) -> ApiResult<CompareResponse> {
    let request = body
        .into_inner()
        .into_request()
        .map_err(|message| error_body(Status::BadRequest, message))?;
    let identity = client_ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

    state
        .service
        .compare(&identity, &request)
        .await
        .map(Json)
        .map_err(|e| match e {
            RouteError::RateLimited => error_body(Status::TooManyRequests, e.to_string()),
            RouteError::InvalidRequest(message) => error_body(Status::BadRequest, message),
            other => {
                error!("Error comparing routes: {other}");
                error_body(Status::InternalServerError, other.to_string())
            }
        })
}

#[get("/api/status")]
pub async fn get_status(state: &State<ApiState>) -> Json<ServiceStatus> {
    Json(state.service.status())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody {
    pub chain_id: Option<u64>,
    pub address: Option<String>,
}

#[post("/api/tokens/validate", data = "<body>")]
pub async fn validate_token(
    body: Json<ValidateBody>,
    state: &State<ApiState>,
) -> Custom<Json<TokenValidation>> {
    let ValidateBody { chain_id, address } = body.into_inner();
    let (Some(chain_id), Some(address)) = (chain_id.filter(|c| *c != 0), address.filter(|a| !a.trim().is_empty())) else {
        return Custom(
            Status::BadRequest,
            Json(TokenValidation {
                ok: false,
                native: None,
                erc20: None,
                address: None,
                symbol: None,
                decimals: None,
                reason: Some("Missing chainId or address".to_string()),
            }),
        );
    };
    Custom(Status::Ok, Json(state.service.validate_token(chain_id, &address).await))
}

#[derive(Debug, FromForm)]
pub struct MetaQuery {
    #[field(name = "chainId")]
    pub chain_id: Option<String>,
}

#[get("/api/tokens/meta?<query..>")]
pub async fn token_meta(query: MetaQuery, state: &State<ApiState>) -> Custom<Json<Value>> {
    let Some(chain_id) = query.chain_id.and_then(|c| c.trim().parse::<u64>().ok()) else {
        return error_body(Status::BadRequest, "Missing or invalid chainId");
    };
    match state.service.token_meta(chain_id).await {
        Ok(meta) => Custom(Status::Ok, Json(json!({ "meta": meta }))),
        Err(e) => {
            error!("Error loading token metadata: {e}");
            error_body(Status::InternalServerError, e.to_string())
        }
    }
}

#[get("/metrics")]
pub async fn metrics(state: &State<ApiState>) -> std::result::Result<(ContentType, String), Custom<String>> {
    state
        .service
        .render_metrics()
        .map(|text| (ContentType::Plain, text))
        .map_err(|e| Custom(Status::InternalServerError, e.to_string()))
}

#[get("/health")]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Bodies the JSON guard cannot parse get the same JSON error shape as the routes.
fn unreadable_body(request: &Request<'_>) -> Json<Value> {
    if request.uri().path().as_str().starts_with("/api/tokens/") {
        Json(json!({ "ok": false, "reason": "Invalid request" }))
    } else {
        Json(json!({ "error": "Invalid request body" }))
    }
}

#[catch(400)]
fn bad_request(request: &Request<'_>) -> Json<Value> {
    unreadable_body(request)
}

#[catch(422)]
fn unprocessable(request: &Request<'_>) -> Json<Value> {
    unreadable_body(request)
}

#[must_use]
pub fn create_rocket(state: ApiState, server: &ServerConfig) -> rocket::Rocket<rocket::Build> {
    let figment = rocket::Config::figment()
        .merge(("address", server.host.clone()))
        .merge(("port", server.port));

    rocket::custom(figment)
        .manage(state)
        .mount("/", routes![compare_routes, get_status, validate_token, token_meta, metrics, health_check])
        .register("/", catchers![bad_request, unprocessable])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> CompareBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn names_the_first_missing_field() {
        let err = body(json!({ "chainId": 1, "tokenIn": "ETH", "tokenOut": "0xabc", "slippageBps": 50 }))
            .into_request()
            .unwrap_err();
        assert_eq!(err, "Missing field: amountIn");

        let err = body(json!({ "chainId": null })).into_request().unwrap_err();
        assert_eq!(err, "Missing field: chainId");
    }

    #[test]
    fn coerces_loosely_typed_fields() {
        let request = body(json!({
            "chainId": "8453",
            "tokenIn": "ETH",
            "tokenOut": "0xabc",
            "amountIn": 1.5,
            "slippageBps": 30,
            "fromAddress": ""
        }))
        .into_request()
        .unwrap();
        assert_eq!(request.chain_id, 8453);
        assert_eq!(request.amount_in, "1.5");
        assert_eq!(request.from_address, None);
    }

    #[test]
    fn rejects_negative_slippage() {
        let err = body(json!({
            "chainId": 1, "tokenIn": "a", "tokenOut": "b", "amountIn": "1", "slippageBps": -1
        }))
        .into_request()
        .unwrap_err();
        assert_eq!(err, "Invalid field: slippageBps");
    }

    #[test]
    fn checks_recipient_addresses_against_the_chain() {
        let base = json!({
            "chainId": 1, "tokenIn": "a", "tokenOut": "b", "amountIn": "1", "slippageBps": 0,
            "toAddress": "0x2222"
        });
        assert_eq!(body(base.clone()).into_request().unwrap_err(), "Invalid field: toAddress");

        let mut hyperevm = base;
        hyperevm["chainId"] = json!(999);
        let request = body(hyperevm.clone()).into_request().unwrap();
        assert_eq!(request.to_address.as_deref(), Some("0x2222"));

        hyperevm["fromAddress"] = json!(5);
        assert_eq!(body(hyperevm).into_request().unwrap_err(), "Invalid field: fromAddress");
    }
}
