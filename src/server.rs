//!
//! contactbook HTTP server
//! -----------------------
//! Axum routes over the resource services. Handlers stay thin: they pull the
//! session token from the `Authorization` header, parse path ids and query
//! strings, call one service operation and wrap the result as `{ "data": ... }`.
//! Every failure goes out through `AppError`'s `{ "errors": ... }` body.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::query::filter::ContactSearch;
use crate::query::page::{PageRequest, Paged};
use crate::service::{
    AddressResponse, ContactResponse, CreateAddressRequest, CreateContactRequest, LoginUserRequest,
    RegisterUserRequest, Services, UpdateAddressRequest, UpdateContactRequest, UpdateUserRequest, UserResponse,
};
use crate::storage::{MemoryStore, SharedDirectory};
use crate::validation;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    /// Page size used when a listing request does not name one.
    pub default_page_size: u64,
}

impl AppState {
    pub fn new(store: SharedDirectory, default_page_size: u64) -> Self {
        Self { services: Arc::new(Services::new(store)), default_page_size }
    }
}

#[derive(Debug, Serialize)]
struct Data<T> {
    data: T,
}

type ApiResult<T> = AppResult<Json<Data<T>>>;

fn data<T>(value: T) -> ApiResult<T> { Ok(Json(Data { data: value })) }

/// Raw token from the `Authorization` header; a `Bearer` scheme is tolerated.
/// A header with nothing after the scheme counts as no credential.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match raw.strip_prefix("Bearer") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => raw,
    };
    Some(token).filter(|t| !t.is_empty())
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<Identity> {
    state.services.users.authenticate(token_from_headers(headers))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(v)| v).map_err(|rej| AppError::validation("invalid_body".to_string(), rej.body_text()))
}

/// Empty query values count as absent.
fn param(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn page_request(state: &AppState, params: &HashMap<String, String>) -> PageRequest {
    PageRequest::from_query(
        params.get("page").map(String::as_str),
        params.get("size").map(String::as_str),
        state.default_page_size,
    )
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "contactbook ok" }))
        .route("/api/users", post(register_user))
        .route("/api/users/login", post(login_user))
        .route("/api/users/current", get(current_user).patch(update_user).delete(logout_user))
        .route("/api/contacts", post(create_contact).get(search_contacts))
        .route("/api/contacts/{contact_id}", get(get_contact).put(update_contact).delete(delete_contact))
        .route("/api/contacts/{contact_id}/addresses", post(create_address).get(list_addresses))
        .route(
            "/api/contacts/{contact_id}/addresses/{address_id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .fallback(|| async { AppError::not_found("route_not_found", "route not found") })
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let resp = next.run(req).await;
    info!(target: "http", "{} {} -> {} ({} ms)", method, path, resp.status().as_u16(), started.elapsed().as_millis());
    resp
}

/// Open the directory, mount the routes and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = match &config.data_file {
        Some(path) => MemoryStore::open(path).with_context(|| format!("opening data file {}", path.display()))?,
        None => {
            info!(target: "startup", "no data file configured; directory is in-memory only");
            MemoryStore::new()
        }
    };
    let store: SharedDirectory = Arc::new(store);
    let app = app(AppState::new(store, config.default_page_size));

    let addr = SocketAddr::new(config.bind, config.http_port);
    info!(target: "startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!(target: "startup", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(target: "startup", "shutdown requested");
    }
}

// ---- users ----

async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    data(state.services.users.register(body(payload)?)?)
}

async fn login_user(
    State(state): State<AppState>,
    payload: Result<Json<LoginUserRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    data(state.services.users.login(body(payload)?)?)
}

async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<UserResponse> {
    let who = authenticate(&state, &headers)?;
    data(state.services.users.current(&who))
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<UserResponse> {
    let who = authenticate(&state, &headers)?;
    data(state.services.users.update(&who, body(payload)?)?)
}

async fn logout_user(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<bool> {
    let who = authenticate(&state, &headers)?;
    data(state.services.users.logout(&who)?)
}

// ---- contacts ----

async fn create_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateContactRequest>, JsonRejection>,
) -> ApiResult<ContactResponse> {
    let who = authenticate(&state, &headers)?;
    data(state.services.contacts.create(&who, body(payload)?)?)
}

async fn get_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<String>,
) -> ApiResult<ContactResponse> {
    let who = authenticate(&state, &headers)?;
    let contact_id = validation::parse_id("contact_id", &contact_id)?;
    data(state.services.contacts.get(&who, contact_id)?)
}

async fn update_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<String>,
    payload: Result<Json<UpdateContactRequest>, JsonRejection>,
) -> ApiResult<ContactResponse> {
    let who = authenticate(&state, &headers)?;
    let contact_id = validation::parse_id("contact_id", &contact_id)?;
    data(state.services.contacts.update(&who, contact_id, body(payload)?)?)
}

async fn delete_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<String>,
) -> ApiResult<bool> {
    let who = authenticate(&state, &headers)?;
    let contact_id = validation::parse_id("contact_id", &contact_id)?;
    data(state.services.contacts.delete(&who, contact_id)?)
}

async fn search_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Paged<ContactResponse>>> {
    let who = authenticate(&state, &headers)?;
    let search = ContactSearch {
        name: param(&params, "name"),
        email: param(&params, "email"),
        phone: param(&params, "phone"),
    };
    let page = page_request(&state, &params);
    Ok(Json(state.services.contacts.search(&who, &search, page)?))
}

// ---- addresses ----

async fn create_address(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<String>,
    payload: Result<Json<CreateAddressRequest>, JsonRejection>,
) -> ApiResult<AddressResponse> {
    let who = authenticate(&state, &headers)?;
    let contact_id = validation::parse_id("contact_id", &contact_id)?;
    data(state.services.addresses.create(&who, contact_id, body(payload)?)?)
}

async fn list_addresses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(contact_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Paged<AddressResponse>>> {
    let who = authenticate(&state, &headers)?;
    let contact_id = validation::parse_id("contact_id", &contact_id)?;
    let page = page_request(&state, &params);
    Ok(Json(state.services.addresses.list(&who, contact_id, page)?))
}

fn address_path(contact_id: &str, address_id: &str) -> AppResult<(i64, i64)> {
    Ok((validation::parse_id("contact_id", contact_id)?, validation::parse_id("address_id", address_id)?))
}

async fn get_address(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((contact_id, address_id)): Path<(String, String)>,
) -> ApiResult<AddressResponse> {
    let who = authenticate(&state, &headers)?;
    let (contact_id, address_id) = address_path(&contact_id, &address_id)?;
    data(state.services.addresses.get(&who, contact_id, address_id)?)
}

async fn update_address(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((contact_id, address_id)): Path<(String, String)>,
    payload: Result<Json<UpdateAddressRequest>, JsonRejection>,
) -> ApiResult<AddressResponse> {
    let who = authenticate(&state, &headers)?;
    let (contact_id, address_id) = address_path(&contact_id, &address_id)?;
    data(state.services.addresses.update(&who, contact_id, address_id, body(payload)?)?)
}

async fn delete_address(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((contact_id, address_id)): Path<(String, String)>,
) -> ApiResult<bool> {
    let who = authenticate(&state, &headers)?;
    let (contact_id, address_id) = address_path(&contact_id, &address_id)?;
    data(state.services.addresses.delete(&who, contact_id, address_id)?)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn token_header_accepts_raw_and_bearer() {
        let mut h = HeaderMap::new();
        assert_eq!(token_from_headers(&h), None);
        h.insert(AUTHORIZATION, HeaderValue::from_static("abc-123"));
        assert_eq!(token_from_headers(&h), Some("abc-123"));
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc-123"));
        assert_eq!(token_from_headers(&h), Some("abc-123"));
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   abc-123 "));
        assert_eq!(token_from_headers(&h), Some("abc-123"));
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearerabc"));
        assert_eq!(token_from_headers(&h), Some("Bearerabc"));
    }

    #[test]
    fn bare_bearer_scheme_is_no_token() {
        let mut h = HeaderMap::new();
        for value in ["Bearer", "Bearer   ", "   "] {
            h.insert(AUTHORIZATION, HeaderValue::from_static(value));
            assert_eq!(token_from_headers(&h), None, "{:?}", value);
        }
    }

    #[test]
    fn empty_query_values_are_absent() {
        let params: HashMap<String, String> =
            [("name", ""), ("email", "  "), ("phone", "696")].into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        assert_eq!(param(&params, "name"), None);
        assert_eq!(param(&params, "email"), None);
        assert_eq!(param(&params, "phone").as_deref(), Some("696"));
        assert_eq!(param(&params, "missing"), None);
    }
}
