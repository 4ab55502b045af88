//! In-process fake of the card management API
//!
//! Serves the same routes as the real API from an in-memory store, so the
//! HTTP gateway and the view-models can be exercised over real sockets.
//! Behaviour switches simulate the failures the client has to cope with.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use cardscore::{Card, CardType, Operation, Recharge, Role, User};

pub const PASSWORD: &str = "secret";

#[derive(Debug, Default)]
pub struct Db {
    pub users: Vec<User>,
    /// Owner of each card
    pub cards: Vec<(u64, Card)>,
    pub operations: Vec<Operation>,
    pub loads: Vec<Recharge>,
    next_id: u64,
}

impl Db {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn card_mut(&mut self, card_id: u64) -> Option<&mut Card> {
        self.cards
            .iter_mut()
            .find(|(_, card)| card.id == card_id)
            .map(|(_, card)| card)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Behavior {
    /// Every write on cards and operations answers 500
    pub fail_writes: bool,
    /// Every authenticated request answers 401
    pub expired: bool,
    /// List responses are wrapped in `{ "data": ... }`
    pub wrap: bool,
    /// `GET /operations/:card` answers 500 for this card
    pub fail_operations_for: Option<u64>,
}

#[derive(Default)]
pub struct FakeApi {
    pub db: Mutex<Db>,
    pub behavior: Mutex<Behavior>,
    /// Authorization header of every request, in arrival order
    pub auth_headers: Mutex<Vec<Option<String>>>,
}

impl FakeApi {
    /// Two users: an admin (id 1) and a driver (id 2) owning two cards
    pub fn seeded() -> Arc<Self> {
        let api = FakeApi::default();
        {
            let mut db = api.db.lock().unwrap();
            db.users = vec![
                user(1, "admin@fleet.ma", "Fleet Admin", Role::Admin),
                user(2, "driver@fleet.ma", "Sara Driver", Role::User),
            ];
            db.cards = vec![
                (2, card(10, CardType::Afriquia, Decimal::new(100, 0))),
                (2, card(11, CardType::Attijari, Decimal::new(40, 0))),
            ];
            db.operations = vec![Operation {
                id: 500,
                card_id: 10,
                designation: "Fuel".to_string(),
                debit: Decimal::new(20, 0),
                created_at: None,
            }];
            db.loads = vec![Recharge {
                id: 700,
                card_id: 10,
                amount: Decimal::new(120, 0),
                created_at: None,
            }];
        }
        Arc::new(api)
    }

    pub fn set(&self, update: impl FnOnce(&mut Behavior)) {
        update(&mut self.behavior.lock().unwrap());
    }

    pub fn server_balance(&self, card_id: u64) -> Decimal {
        self.db
            .lock()
            .unwrap()
            .cards
            .iter()
            .find(|(_, card)| card.id == card_id)
            .map(|(_, card)| card.balance)
            .unwrap()
    }

    fn behavior(&self) -> Behavior {
        self.behavior.lock().unwrap().clone()
    }
}

pub fn user(id: u64, email: &str, fullname: &str, role: Role) -> User {
    User {
        id,
        email: email.to_string(),
        fullname: fullname.to_string(),
        role,
    }
}

pub fn card(id: u64, card_type: CardType, balance: Decimal) -> Card {
    Card {
        id,
        card_type,
        number: Some(format!("5000 0000 0000 {id:04}")),
        balance,
    }
}

/// Serve `api` on an ephemeral local port and return its base URL
pub async fn spawn(api: Arc<FakeApi>) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/users", get(list_users))
        .route("/users/with-balance", get(users_with_balance))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/cards/user/{id}", get(user_cards))
        .route(
            "/cards/load/{id}",
            post(add_load).put(update_load).delete(delete_load),
        )
        .route("/cards/loads/{id}", get(card_loads))
        .route("/cards/loads/count/{id}", get(load_count))
        .route(
            "/operations/{id}",
            get(card_operations)
                .post(add_operation)
                .put(update_operation)
                .delete(delete_operation),
        )
        .with_state(api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

type Reply = Result<Response, Response>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Not found")
}

/// Record the header and resolve the caller from `Bearer tok-<id>`
fn authorize(api: &FakeApi, headers: &HeaderMap) -> Result<u64, Response> {
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    api.auth_headers.lock().unwrap().push(header.clone());

    if api.behavior().expired {
        return Err(error(StatusCode::UNAUTHORIZED, "Token expired"));
    }
    header
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer tok-"))
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Missing token"))
}

fn writable(api: &FakeApi) -> Result<(), Response> {
    if api.behavior().fail_writes {
        Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"))
    } else {
        Ok(())
    }
}

fn list(api: &FakeApi, value: Value) -> Response {
    if api.behavior().wrap {
        Json(json!({ "data": value })).into_response()
    } else {
        Json(value).into_response()
    }
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(State(api): State<Arc<FakeApi>>, Json(body): Json<Credentials>) -> Reply {
    let db = api.db.lock().unwrap();
    let user = db
        .users
        .iter()
        .find(|u| u.email == body.email && body.password == PASSWORD)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid credentials"))?;
    Ok(Json(json!({ "token": format!("tok-{}", user.id), "user": user })).into_response())
}

async fn me(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Reply {
    let caller = authorize(&api, &headers)?;
    let db = api.db.lock().unwrap();
    let user = db.users.iter().find(|u| u.id == caller).ok_or_else(not_found)?;
    Ok(Json(json!({ "user": user })).into_response())
}

#[derive(Deserialize)]
struct Registration {
    email: String,
    fullname: String,
    password: String,
    role: Role,
}

async fn register(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Registration>,
) -> Reply {
    authorize(&api, &headers)?;
    if body.password.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Password required"));
    }
    let mut db = api.db.lock().unwrap();
    if db.users.iter().any(|u| u.email == body.email) {
        return Err(error(StatusCode::CONFLICT, "Email already used"));
    }
    let id = db.next_id();
    let created = user(id, &body.email, &body.fullname, body.role);
    db.users.push(created.clone());
    Ok((StatusCode::CREATED, Json(json!({ "user": created }))).into_response())
}

async fn list_users(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Reply {
    authorize(&api, &headers)?;
    let users = json!(api.db.lock().unwrap().users);
    Ok(list(&api, users))
}

async fn get_user(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    let db = api.db.lock().unwrap();
    let user = db.users.iter().find(|u| u.id == id).ok_or_else(not_found)?;
    Ok(Json(json!(user)).into_response())
}

async fn update_user(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Reply {
    authorize(&api, &headers)?;
    let mut db = api.db.lock().unwrap();
    let user = db.users.iter_mut().find(|u| u.id == id).ok_or_else(not_found)?;
    if let Some(email) = body.get("email").and_then(Value::as_str) {
        user.email = email.to_string();
    }
    if let Some(fullname) = body.get("fullname").and_then(Value::as_str) {
        user.fullname = fullname.to_string();
    }
    if let Some(role) = body.get("role").and_then(Value::as_str) {
        user.role = role.parse().map_err(|_| error(StatusCode::BAD_REQUEST, "Bad role"))?;
    }
    Ok(Json(json!({ "message": "updated", "user": user })).into_response())
}

async fn delete_user(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    let mut db = api.db.lock().unwrap();
    let before = db.users.len();
    db.users.retain(|u| u.id != id);
    if db.users.len() == before {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn users_with_balance(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Reply {
    authorize(&api, &headers)?;
    let db = api.db.lock().unwrap();
    let rows: Vec<Value> = db
        .users
        .iter()
        .map(|u| {
            let cards: Vec<&Card> = db
                .cards
                .iter()
                .filter(|(owner, _)| *owner == u.id)
                .map(|(_, card)| card)
                .collect();
            json!({
                "id": u.id,
                "email": u.email,
                "fullname": u.fullname,
                "role": u.role,
                "Cards": cards,
            })
        })
        .collect();
    Ok(list(&api, json!(rows)))
}

async fn user_cards(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    let cards: Vec<Card> = api
        .db
        .lock()
        .unwrap()
        .cards
        .iter()
        .filter(|(owner, _)| *owner == id)
        .map(|(_, card)| card.clone())
        .collect();
    Ok(list(&api, json!(cards)))
}

#[derive(Deserialize)]
struct AmountBody {
    amount: Decimal,
}

async fn add_load(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
    Json(body): Json<AmountBody>,
) -> Reply {
    authorize(&api, &headers)?;
    writable(&api)?;
    let mut db = api.db.lock().unwrap();
    let card = db.card_mut(card_id).ok_or_else(not_found)?;
    card.balance += body.amount;
    let id = db.next_id();
    let load = Recharge {
        id,
        card_id,
        amount: body.amount,
        created_at: None,
    };
    db.loads.push(load.clone());
    Ok((StatusCode::CREATED, Json(json!(load))).into_response())
}

async fn update_load(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(load_id): Path<u64>,
    Json(body): Json<AmountBody>,
) -> Reply {
    authorize(&api, &headers)?;
    writable(&api)?;
    let mut db = api.db.lock().unwrap();
    let load = db
        .loads
        .iter_mut()
        .find(|l| l.id == load_id)
        .ok_or_else(not_found)?;
    let delta = body.amount - load.amount;
    load.amount = body.amount;
    let updated = load.clone();
    if let Some(card) = db.card_mut(updated.card_id) {
        card.balance += delta;
    }
    Ok(Json(json!(updated)).into_response())
}

async fn delete_load(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(load_id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    writable(&api)?;
    let mut db = api.db.lock().unwrap();
    let position = db
        .loads
        .iter()
        .position(|l| l.id == load_id)
        .ok_or_else(not_found)?;
    let removed = db.loads.remove(position);
    if let Some(card) = db.card_mut(removed.card_id) {
        card.balance -= removed.amount;
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn card_loads(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    let loads: Vec<Recharge> = api
        .db
        .lock()
        .unwrap()
        .loads
        .iter()
        .filter(|l| l.card_id == card_id)
        .cloned()
        .collect();
    Ok(list(&api, json!(loads)))
}

async fn load_count(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    let count = api
        .db
        .lock()
        .unwrap()
        .loads
        .iter()
        .filter(|l| l.card_id == card_id)
        .count();
    Ok(list(&api, json!({ "nbChargements": count })))
}

async fn card_operations(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    if api.behavior().fail_operations_for == Some(card_id) {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Operations unavailable"));
    }
    let operations: Vec<Operation> = api
        .db
        .lock()
        .unwrap()
        .operations
        .iter()
        .filter(|o| o.card_id == card_id)
        .cloned()
        .collect();
    Ok(list(&api, json!(operations)))
}

#[derive(Deserialize)]
struct OperationBody {
    designation: String,
    debit: Decimal,
}

async fn add_operation(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
    Json(body): Json<OperationBody>,
) -> Reply {
    authorize(&api, &headers)?;
    writable(&api)?;
    let mut db = api.db.lock().unwrap();
    let card = db.card_mut(card_id).ok_or_else(not_found)?;
    card.balance -= body.debit;
    let id = db.next_id();
    let operation = Operation {
        id,
        card_id,
        designation: body.designation,
        debit: body.debit,
        created_at: None,
    };
    db.operations.push(operation.clone());
    Ok((StatusCode::CREATED, Json(json!(operation))).into_response())
}

async fn update_operation(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(operation_id): Path<u64>,
    Json(body): Json<OperationBody>,
) -> Reply {
    authorize(&api, &headers)?;
    writable(&api)?;
    let mut db = api.db.lock().unwrap();
    let operation = db
        .operations
        .iter_mut()
        .find(|o| o.id == operation_id)
        .ok_or_else(not_found)?;
    let delta = body.debit - operation.debit;
    operation.designation = body.designation;
    operation.debit = body.debit;
    let updated = operation.clone();
    if let Some(card) = db.card_mut(updated.card_id) {
        card.balance -= delta;
    }
    Ok(Json(json!(updated)).into_response())
}

async fn delete_operation(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(operation_id): Path<u64>,
) -> Reply {
    authorize(&api, &headers)?;
    writable(&api)?;
    let mut db = api.db.lock().unwrap();
    let position = db
        .operations
        .iter()
        .position(|o| o.id == operation_id)
        .ok_or_else(not_found)?;
    let removed = db.operations.remove(position);
    if let Some(card) = db.card_mut(removed.card_id) {
        card.balance += removed.debit;
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}
