use abi_common::hash::{from_hex, to_hex};
use abi_common::{Address, BoundContract, CallRequest, ContractInterface, DecodedEvent, Log};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::ApiError;
use crate::registry::Registry;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    /// Absent when the server runs without storage.
    pub valkey: Option<redis::aio::MultiplexedConnection>,
    pub broadcast_tx: broadcast::Sender<String>,
}

impl AppState {
    /// State with an in-memory registry and no Valkey connection.
    pub fn in_memory() -> Self {
        let (broadcast_tx, _) = broadcast::channel(4096);
        Self {
            registry: Arc::new(Registry::in_memory()),
            valkey: None,
            broadcast_tx,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/contracts", get(list_contracts).post(register_contract))
        .route(
            "/api/contracts/{name}",
            get(get_contract).delete(unregister_contract),
        )
        .route("/api/contracts/{name}/functions", get(list_functions))
        .route("/api/contracts/{name}/events", get(list_events))
        .route("/api/contracts/{name}/call/{function}", post(prepare_call))
        .route("/api/contracts/{name}/decode/{function}", post(decode_output))
        .route("/api/contracts/{name}/logs", post(decode_log))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn lookup(state: &AppState, name: &str) -> Result<Arc<BoundContract>, ApiError> {
    state
        .registry
        .get(name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("unknown contract `{name}`")))
}

#[derive(Serialize)]
struct ContractSummary {
    name: String,
    address: Address,
}

#[derive(Serialize)]
struct ContractDetail {
    name: String,
    address: Address,
    abi: ContractInterface,
}

impl ContractDetail {
    fn of(contract: &BoundContract) -> Self {
        Self {
            name: contract.name().to_string(),
            address: contract.address(),
            abi: contract.interface().clone(),
        }
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    address: String,
    abi: Value,
}

async fn register_contract(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address: Address = req.address.parse()?;
    let interface: ContractInterface = match req.abi {
        // Interfaces are accepted inline or as a JSON-encoded string.
        Value::String(json) => ContractInterface::from_json(&json)?,
        other => ContractInterface::from_json(&other.to_string())?,
    };

    let contract = state.registry.register(&req.name, address, interface).await?;

    Ok((StatusCode::CREATED, Json(ContractDetail::of(&contract))))
}

async fn list_contracts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let contracts = state.registry.list().await?;

    Ok(Json(
        contracts
            .iter()
            .map(|c| ContractSummary {
                name: c.name().to_string(),
                address: c.address(),
            })
            .collect::<Vec<_>>(),
    ))
}

async fn get_contract(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = lookup(&state, &name).await?;
    Ok(Json(ContractDetail::of(&contract)))
}

async fn unregister_contract(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.registry.unregister(&name).await?;
    if !removed {
        return Err(ApiError::NotFound(format!("unknown contract `{name}`")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_functions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = lookup(&state, &name).await?;

    let mut functions = Vec::new();
    for f in contract.interface().functions() {
        functions.push(serde_json::json!({
            "name": f.name,
            "signature": f.signature()?,
            "selector": to_hex(&f.selector()?),
            "constant": f.constant,
            "inputs": f.inputs,
            "outputs": f.outputs,
        }));
    }

    Ok(Json(functions))
}

async fn list_events(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = lookup(&state, &name).await?;

    let mut events = Vec::new();
    for e in contract.interface().events() {
        events.push(serde_json::json!({
            "name": e.name,
            "signature": e.signature()?,
            "topic": to_hex(&e.topic()?),
            "inputs": e.inputs,
        }));
    }

    Ok(Json(events))
}

#[derive(Deserialize)]
struct CallBody {
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    from: Option<String>,
}

#[derive(Serialize)]
struct CallResponse {
    function: String,
    constant: bool,
    method: &'static str,
    transaction: CallRequest,
}

async fn prepare_call(
    State(state): State<AppState>,
    Path((name, function)): Path<(String, String)>,
    Json(body): Json<CallBody>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = lookup(&state, &name).await?;
    let from = body.from.as_deref().map(str::parse::<Address>).transpose()?;
    let request = contract.call_request(&function, &body.args, from)?;

    Ok(Json(CallResponse {
        function: contract.function(&function)?.name.clone(),
        constant: request.constant,
        method: request.method(),
        transaction: request,
    }))
}

#[derive(Deserialize)]
struct DecodeBody {
    data: String,
}

async fn decode_output(
    State(state): State<AppState>,
    Path((name, function)): Path<(String, String)>,
    Json(body): Json<DecodeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = lookup(&state, &name).await?;
    let data = from_hex(&body.data).map_err(|e| ApiError::BadRequest(format!("invalid hex: {e}")))?;
    let f = contract.function(&function)?;
    let values = contract.decode_output(&function, &data)?;

    let outputs: Vec<Value> = f
        .outputs
        .iter()
        .zip(values)
        .map(|(param, (_, token))| {
            serde_json::json!({
                "name": param.name,
                "type": param.kind,
                "value": token.to_json(),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "function": f.name,
        "outputs": outputs,
    })))
}

async fn decode_log(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<DecodedEvent>, ApiError> {
    let contract = lookup(&state, &name).await?;
    let log: Log = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid log: {e}")))?;
    Ok(Json(contract.decode_log(&log)?))
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let contracts = state.registry.len().await?;

    let queue_len: u64 = match state.valkey.clone() {
        Some(mut valkey) => valkey.llen(abi_common::valkey::EVENT_QUEUE).await?,
        None => 0,
    };

    Ok(Json(serde_json::json!({
        "status": "ok",
        "contracts": contracts,
        "queue_length": queue_len
    })))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state))
}
