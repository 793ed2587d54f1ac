//! In-process stand-in for the record service.
//!
//! Collections live in memory. Listing understands the same sort, filter and
//! expand parameters the client sends, so tests exercise real query strings.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Map, Value};
use stringr::Backend;

const TOKEN_SECRET: &[u8] = b"fake-service-secret";

/// 2024-05-01 10:00:00 UTC
const CLOCK_START: i64 = 1_714_557_600;

/// Relation field -> collection it points at
const RELATIONS: &[(&str, &str)] = &[
    ("user", "users"),
    ("racquet", "racquets"),
    ("main_string", "strings"),
    ("cross_string", "strings"),
    ("string_job", "string_jobs"),
];

const REQUIRED: &[(&str, &[&str])] = &[
    ("users", &["email", "password"]),
    ("racquets", &["name"]),
    ("strings", &["model"]),
    ("string_jobs", &["racquet", "main_string", "tension_lbs_main"]),
    ("sessions", &["string_job", "duration_hours"]),
];

#[derive(Default)]
struct ServiceState {
    collections: HashMap<String, Vec<Map<String, Value>>>,
    passwords: HashMap<String, String>,
    tick: i64,
    next_created: Option<String>,
    requests: usize,
    last_authorization: Option<String>,
}

impl ServiceState {
    fn now(&mut self) -> String {
        self.tick += 1;
        let at = DateTime::from_timestamp(CLOCK_START + self.tick, 0).unwrap_or_default();
        timestamp(at)
    }

    fn find(&self, collection: &str, id: &str) -> Option<&Map<String, Value>> {
        self.collections
            .get(collection)?
            .iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Option<&mut Map<String, Value>> {
        self.collections
            .get_mut(collection)?
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Copy of `record` with the requested relations inlined under `expand`
    fn expanded(&self, record: &Map<String, Value>, expand: &[&str]) -> Value {
        let mut out = record.clone();
        let mut inlined = Map::new();
        for field in expand {
            let Some((_, target)) = RELATIONS.iter().find(|(name, _)| name == field) else {
                continue;
            };
            let Some(id) = record.get(*field).and_then(Value::as_str) else {
                continue;
            };
            if let Some(related) = self.find(target, id) {
                inlined.insert(field.to_string(), Value::Object(related.clone()));
            }
        }
        if !inlined.is_empty() {
            out.insert("expand".to_string(), Value::Object(inlined));
        }
        Value::Object(out)
    }
}

type Shared = Arc<Mutex<ServiceState>>;

pub struct FakeService {
    url: String,
    state: Shared,
}

impl FakeService {
    pub async fn spawn() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route(
                "/api/collections/:collection/records",
                get(list_records).post(create_record),
            )
            .route(
                "/api/collections/:collection/records/:id",
                get(get_record).patch(update_record).delete(delete_record),
            )
            .route(
                "/api/collections/:collection/auth-with-password",
                post(auth_with_password),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/"),
            state,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn backend(&self) -> Backend {
        Backend::new(&self.url).unwrap()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap()
    }

    /// Seed an account directly, bypassing the API
    pub fn add_user(&self, email: &str, password: &str, name: &str) -> String {
        let mut state = self.lock();
        let id = new_id();
        let now = state.now();
        let record = json!({
            "id": id,
            "collectionName": "users",
            "email": email,
            "name": name,
            "avatar": "",
            "created": now,
            "updated": now,
        });
        if let Value::Object(record) = record {
            state.collections.entry("users".to_string()).or_default().push(record);
        }
        state.passwords.insert(email.to_string(), password.to_string());
        id
    }

    /// Timestamp the next created record gets instead of the running clock
    pub fn set_next_created(&self, created: &str) {
        self.lock().next_created = Some(created.to_string());
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.lock().last_authorization.clone()
    }

    pub fn record(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock().find(collection, id).cloned().map(Value::Object)
    }

    pub fn count(&self, collection: &str) -> usize {
        self.lock().collections.get(collection).map_or(0, Vec::len)
    }
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    exp: i64,
}

/// A service-style JWT for `user_id` expiring `secs` from now
pub fn token_expiring_in(user_id: &str, secs: i64) -> String {
    let claims = TokenClaims {
        id: user_id,
        kind: "authRecord",
        exp: (Utc::now() + Duration::seconds(secs)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TOKEN_SECRET)).unwrap()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..15].to_string()
}

fn error(status: StatusCode, message: &str, data: Value) -> Response {
    let body = json!({
        "code": status.as_u16(),
        "message": message,
        "data": data,
    });
    (status, Json(body)).into_response()
}

fn not_found() -> Response {
    error(
        StatusCode::NOT_FOUND,
        "The requested resource wasn't found.",
        json!({}),
    )
}

fn seen(state: &mut ServiceState, headers: &HeaderMap) {
    state.requests += 1;
    state.last_authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

fn split_expand(params: &HashMap<String, String>) -> Vec<&str> {
    params
        .get("expand")
        .map(|e| e.split(',').filter(|f| !f.is_empty()).collect())
        .unwrap_or_default()
}

async fn list_records(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    seen(&mut state, &headers);

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let per_page: usize = params
        .get("perPage")
        .and_then(|p| p.parse().ok())
        .unwrap_or(30)
        .max(1);

    let filter = match params.get("filter").filter(|f| !f.is_empty()) {
        Some(raw) => match parse_filter(raw) {
            Ok(expr) => Some(expr),
            Err(reason) => {
                return error(
                    StatusCode::BAD_REQUEST,
                    "Something went wrong while processing your request. Invalid filter parameters.",
                    json!({ "filter": reason }),
                )
            }
        },
        None => None,
    };

    let mut matched: Vec<&Map<String, Value>> = state
        .collections
        .get(&collection)
        .map(|records| records.iter().collect())
        .unwrap_or_default();
    if let Some(expr) = &filter {
        matched.retain(|record| expr.eval(record));
    }
    if let Some(sort) = params.get("sort") {
        sort_records(&mut matched, sort);
    }

    let total_items = matched.len();
    let total_pages = total_items.div_ceil(per_page);
    let expand = split_expand(&params);
    let items: Vec<Value> = matched
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(|record| state.expanded(record, &expand))
        .collect();

    Json(json!({
        "page": page,
        "perPage": per_page,
        "totalItems": total_items,
        "totalPages": total_pages,
        "items": items,
    }))
    .into_response()
}

async fn get_record(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    seen(&mut state, &headers);
    let expand = split_expand(&params);
    match state.find(&collection, &id) {
        Some(record) => Json(state.expanded(record, &expand)).into_response(),
        None => not_found(),
    }
}

fn missing_fields(collection: &str, body: &Map<String, Value>) -> Map<String, Value> {
    let required = REQUIRED
        .iter()
        .find(|(name, _)| *name == collection)
        .map_or(&[][..], |(_, fields)| *fields);
    let mut missing = Map::new();
    for field in required {
        let blank = match body.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Number(n)) => n.as_f64() == Some(0.0),
            Some(_) => false,
        };
        if blank {
            missing.insert(
                field.to_string(),
                json!({ "code": "validation_required", "message": "Missing required value." }),
            );
        }
    }
    missing
}

async fn create_record(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    seen(&mut state, &headers);

    let Value::Object(mut body) = body else {
        return error(StatusCode::BAD_REQUEST, "Failed to load the submitted data.", json!({}));
    };

    let mut invalid = missing_fields(&collection, &body);
    let mut password = None;
    if collection == "users" {
        let email = body.get("email").and_then(Value::as_str).unwrap_or_default().to_string();
        if state.passwords.contains_key(&email) {
            invalid.insert(
                "email".to_string(),
                json!({ "code": "validation_not_unique", "message": "Value must be unique." }),
            );
        }
        let given = body.remove("password");
        let confirm = body.remove("passwordConfirm");
        if given != confirm {
            invalid.insert(
                "passwordConfirm".to_string(),
                json!({ "code": "validation_values_mismatch", "message": "Values don't match." }),
            );
        }
        password = given.and_then(|p| p.as_str().map(str::to_string));
    }
    if !invalid.is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            "Failed to create record.",
            Value::Object(invalid),
        );
    }

    let created = match state.next_created.take() {
        Some(created) => created,
        None => state.now(),
    };
    body.insert("id".to_string(), Value::String(new_id()));
    body.insert("collectionName".to_string(), Value::String(collection.clone()));
    body.insert("created".to_string(), Value::String(created.clone()));
    body.insert("updated".to_string(), Value::String(created));

    if let (Some(password), Some(email)) = (password, body.get("email").and_then(Value::as_str)) {
        state.passwords.insert(email.to_string(), password);
    }
    state.collections.entry(collection).or_default().push(body.clone());
    Json(Value::Object(body)).into_response()
}

async fn update_record(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    seen(&mut state, &headers);

    let Value::Object(changes) = body else {
        return error(StatusCode::BAD_REQUEST, "Failed to load the submitted data.", json!({}));
    };
    let now = state.now();
    let Some(record) = state.find_mut(&collection, &id) else {
        return not_found();
    };
    for (field, value) in changes {
        if field != "id" && field != "created" {
            record.insert(field, value);
        }
    }
    record.insert("updated".to_string(), Value::String(now));
    Json(Value::Object(record.clone())).into_response()
}

async fn delete_record(
    State(state): State<Shared>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    seen(&mut state, &headers);

    let Some(records) = state.collections.get_mut(&collection) else {
        return not_found();
    };
    let before = records.len();
    records.retain(|r| r.get("id").and_then(Value::as_str) != Some(id.as_str()));
    if records.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn auth_with_password(
    State(state): State<Shared>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    seen(&mut state, &headers);

    let identity = body.get("identity").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();

    let accepted = collection == "users"
        && state.passwords.get(identity).map(String::as_str) == Some(password);
    let record = state
        .collections
        .get("users")
        .and_then(|users| {
            users
                .iter()
                .find(|u| u.get("email").and_then(Value::as_str) == Some(identity))
        })
        .filter(|_| accepted)
        .cloned();

    match record {
        Some(record) => {
            let id = record.get("id").and_then(Value::as_str).unwrap_or_default();
            let token = token_expiring_in(id, 3600);
            Json(json!({ "token": token, "record": record })).into_response()
        }
        None => error(StatusCode::BAD_REQUEST, "Failed to authenticate.", json!({})),
    }
}

// ----------------------------------------------------------------------------
// Sorting
// ----------------------------------------------------------------------------

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sort_records(records: &mut [&Map<String, Value>], sort: &str) {
    let keys: Vec<(&str, bool)> = sort
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| match k.strip_prefix('-') {
            Some(field) => (field, true),
            None => (k.strip_prefix('+').unwrap_or(k), false),
        })
        .collect();

    records.sort_by(|a, b| {
        for (field, descending) in &keys {
            let order = compare_values(a.get(*field), b.get(*field));
            let order = if *descending { order.reverse() } else { order };
            if order != Ordering::Equal {
                return order;
            }
        }
        Ordering::Equal
    });
}

// ----------------------------------------------------------------------------
// Filter expressions: field op literal, joined with && and ||, parenthesized
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Text(String),
    Number(f64),
    Op(&'static str),
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '=' => {
                tokens.push(Token::Op("="));
                i += 1;
            }
            '~' => {
                tokens.push(Token::Op("~"));
                i += 1;
            }
            '"' => {
                i += 1;
                let mut text = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string".to_string()),
                        Some('\\') => {
                            let escaped = chars.get(i + 1).ok_or("dangling escape")?;
                            text.push(*escaped);
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || "-.eE".contains(chars[i])) {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(raw.parse().map_err(|_| format!("bad number {raw}"))?));
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }
    Ok(tokens)
}

#[derive(Debug)]
enum Expr {
    Compare {
        field: String,
        op: &'static str,
        value: Value,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, record: &Map<String, Value>) -> bool {
        match self {
            Expr::And(a, b) => a.eval(record) && b.eval(record),
            Expr::Or(a, b) => a.eval(record) || b.eval(record),
            Expr::Compare { field, op, value } => {
                let actual = record.get(field);
                match *op {
                    "=" => equals(actual, value),
                    "!=" => !equals(actual, value),
                    _ => {
                        let haystack = match actual {
                            Some(Value::String(s)) => s.to_lowercase(),
                            Some(Value::Number(n)) => n.to_string(),
                            _ => String::new(),
                        };
                        let needle = match value {
                            Value::String(s) => s.to_lowercase(),
                            other => other.to_string(),
                        };
                        haystack.contains(&needle)
                    }
                }
            }
        }
    }
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(actual), expected) => actual == expected,
        (None, Value::String(s)) => s.is_empty(),
        (None, _) => false,
    }
}

struct FilterParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl FilterParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left = Expr::Or(Box::new(left), Box::new(self.and_expr()?));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            left = Expr::And(Box::new(left), Box::new(self.atom()?));
        }
        Ok(left)
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Open) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    other => Err(format!("expected ')', got {other:?}")),
                }
            }
            Some(Token::Ident(field)) => {
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    other => return Err(format!("expected operator, got {other:?}")),
                };
                let value = match self.next() {
                    Some(Token::Text(text)) => Value::String(text),
                    Some(Token::Number(n)) => json!(n),
                    Some(Token::Ident(word)) if word == "true" => Value::Bool(true),
                    Some(Token::Ident(word)) if word == "false" => Value::Bool(false),
                    other => return Err(format!("expected literal, got {other:?}")),
                };
                Ok(Expr::Compare { field, op, value })
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn parse_filter(raw: &str) -> Result<Expr, String> {
    let mut parser = FilterParser {
        tokens: tokenize(raw)?,
        pos: 0,
    };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing tokens".to_string());
    }
    Ok(expr)
}
