// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! JSON REST server over the document store.
//!
//! Routes:
//! - `GET /api/data`: stored documents, in order, exactly as stored
//! - `GET /api/rows`: `[{index, version, data}]`
//! - `POST /api/add`: append one JSON object
//! - `PUT /api/edit`: `{index, version?, ...fields}` replaces document `index`
//! - `DELETE /api/delete`: `{index, version?}`
//!
//! Every error answers `{"error": "..."}` with a 4xx/5xx status.

use anyhow::{Result, anyhow};
use codepanel_db::{MutationError, Store};
use serde_json::{Map, Value, json};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;
use tiny_http::{Header, Request, Response};

pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
pub const DEFAULT_WORKERS: usize = 4;
/// Request bodies larger than this are refused with `413`.
pub const MAX_BODY_BYTES: u64 = 1 << 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn message(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "message": message }),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

/// Rejections that happen before the store is touched.
#[derive(Debug, Error)]
enum RequestError {
    #[error("request body is not valid JSON -- send a JSON object ({0})")]
    MalformedJson(String),
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("`{0}` must be a non-negative integer")]
    BadInteger(&'static str),
    #[error("`index` is required")]
    MissingIndex,
}

/// Handles one request against `store`. Never panics on client input.
pub fn route(store: &Store, method: &str, url: &str, body: &str) -> ApiResponse {
    let path = url.split('?').next().unwrap_or_default();
    let result = match (method, path) {
        ("GET", "/api/data") => store
            .export_json()
            .map(|documents| ApiResponse {
                status: 200,
                body: documents,
            }),
        ("GET", "/api/rows") => list_rows(store),
        ("POST", "/api/add") => add(store, body),
        ("PUT", "/api/edit") => edit(store, body),
        ("DELETE", "/api/delete") => delete(store, body),
        _ => return ApiResponse::error(404, format!("no route for {method} {path}")),
    };
    result.unwrap_or_else(|error| error_response(&error))
}

fn list_rows(store: &Store) -> Result<ApiResponse> {
    let rows: Vec<Value> = store
        .list_documents()?
        .into_iter()
        .map(|document| {
            json!({
                "index": document.index,
                "version": document.version,
                "data": document.body,
            })
        })
        .collect();
    Ok(ApiResponse {
        status: 200,
        body: Value::Array(rows),
    })
}

fn add(store: &Store, body: &str) -> Result<ApiResponse> {
    let document = parse_body(body)?;
    let index = store.append_document(&document)?;
    tracing::debug!(index, "document added");
    Ok(ApiResponse::message(201, "Data added successfully"))
}

fn edit(store: &Store, body: &str) -> Result<ApiResponse> {
    let Value::Object(mut fields) = parse_body(body)? else {
        return Err(RequestError::NotAnObject.into());
    };
    let index = take_index(&mut fields)?;
    let version = take_version(&mut fields)?;
    let next = store.replace_document(index, version, &Value::Object(fields))?;
    tracing::debug!(index, version = next, "document replaced");
    Ok(ApiResponse::message(200, "Data updated successfully"))
}

fn delete(store: &Store, body: &str) -> Result<ApiResponse> {
    let Value::Object(mut fields) = parse_body(body)? else {
        return Err(RequestError::NotAnObject.into());
    };
    let index = take_index(&mut fields)?;
    let version = take_version(&mut fields)?;
    store.delete_document(index, version)?;
    tracing::debug!(index, "document deleted");
    Ok(ApiResponse::message(200, "Data deleted successfully"))
}

fn parse_body(body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body)
        .map_err(|error| RequestError::MalformedJson(error.to_string()))?;
    if !value.is_object() {
        return Err(RequestError::NotAnObject.into());
    }
    Ok(value)
}

fn take_index(fields: &mut Map<String, Value>) -> Result<usize> {
    let value = fields.remove("index").ok_or(RequestError::MissingIndex)?;
    value
        .as_u64()
        .and_then(|index| usize::try_from(index).ok())
        .ok_or_else(|| RequestError::BadInteger("index").into())
}

fn take_version(fields: &mut Map<String, Value>) -> Result<Option<u64>> {
    match fields.remove("version") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| RequestError::BadInteger("version").into()),
    }
}

fn error_response(error: &anyhow::Error) -> ApiResponse {
    if let Some(request_error) = error.downcast_ref::<RequestError>() {
        return ApiResponse::error(400, request_error.to_string());
    }
    if let Some(mutation_error) = error.downcast_ref::<MutationError>() {
        let status = match mutation_error {
            MutationError::NotAnObject => 400,
            MutationError::NotFound { .. } => 404,
            MutationError::VersionMismatch { .. } => 409,
        };
        return ApiResponse::error(status, mutation_error.to_string());
    }
    tracing::error!("storage failure: {error:#}");
    ApiResponse::error(500, "storage failure -- check the server log")
}

/// A bound listener that has not started serving yet.
pub struct Server {
    http: Arc<tiny_http::Server>,
    store: Arc<Mutex<Store>>,
    workers: usize,
}

impl Server {
    pub fn bind(addr: &str, store: Store, workers: usize) -> Result<Self> {
        let http = tiny_http::Server::http(addr).map_err(|error| {
            anyhow!("bind {addr}: {error} -- set server.bind to a free address")
        })?;
        Ok(Self {
            http: Arc::new(http),
            store: Arc::new(Mutex::new(store)),
            workers: workers.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.http
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("server is not listening on a TCP address"))
    }

    /// Starts the worker pool and returns at once.
    pub fn spawn(self) -> Result<ServerHandle> {
        let mut workers = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let http = Arc::clone(&self.http);
            let store = Arc::clone(&self.store);
            let worker = thread::Builder::new()
                .name(format!("codepanel-http-{id}"))
                .spawn(move || {
                    for request in http.incoming_requests() {
                        handle(&store, request);
                    }
                })
                .map_err(|error| anyhow!("spawn HTTP worker {id}: {error}"))?;
            workers.push(worker);
        }
        Ok(ServerHandle {
            http: self.http,
            workers,
        })
    }

    /// Serves until the process is killed.
    pub fn serve(self) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, workers = self.workers, "serving");
        self.spawn()?.join();
        Ok(())
    }
}

pub struct ServerHandle {
    http: Arc<tiny_http::Server>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Wakes every worker and waits for in-flight requests to finish.
    pub fn stop(self) {
        for _ in &self.workers {
            self.http.unblock();
        }
        self.join();
    }

    fn join(self) {
        for worker in self.workers {
            if worker.join().is_err() {
                tracing::error!("HTTP worker panicked");
            }
        }
    }
}

fn read_body<R: Read>(reader: R, limit: u64) -> Result<String, ApiResponse> {
    let mut body = String::new();
    reader
        .take(limit + 1)
        .read_to_string(&mut body)
        .map_err(|error| ApiResponse::error(400, format!("read request body: {error}")))?;
    if body.len() as u64 > limit {
        return Err(ApiResponse::error(
            413,
            format!("request body exceeds {limit} bytes -- send a single document"),
        ));
    }
    Ok(body)
}

fn handle(store: &Mutex<Store>, mut request: Request) {
    let started = Instant::now();
    let method = request.method().to_string();
    let url = request.url().to_owned();

    let response = match read_body(request.as_reader(), MAX_BODY_BYTES) {
        Err(rejection) => rejection,
        Ok(body) => match store.lock() {
            Ok(store) => route(&store, &method, &url, &body),
            Err(_) => ApiResponse::error(500, "store lock poisoned -- restart the server"),
        },
    };

    tracing::info!(
        method = %method,
        url = %url,
        status = response.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );

    let mut reply =
        Response::from_string(response.body.to_string()).with_status_code(response.status);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        reply = reply.with_header(header);
    }
    if let Err(error) = request.respond(reply) {
        tracing::warn!(%error, "write response");
    }
}

#[cfg(test)]
mod tests {
    use super::{read_body, route};
    use codepanel_db::Store;
    use serde_json::json;

    fn store() -> Store {
        let store = Store::open_memory().expect("open store");
        store.bootstrap().expect("bootstrap");
        store
    }

    #[test]
    fn unknown_route_is_not_found() {
        let store = store();
        let response = route(&store, "GET", "/api/nope", "");
        assert_eq!(response.status, 404);
        assert_eq!(response.body["error"], "no route for GET /api/nope");
        assert_eq!(route(&store, "POST", "/api/data", "{}").status, 404);
    }

    #[test]
    fn query_string_is_ignored() {
        let store = store();
        let response = route(&store, "GET", "/api/data?cache=no", "");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!([]));
    }

    #[test]
    fn edit_strips_reserved_keys() {
        let store = store();
        route(&store, "POST", "/api/add", r#"{"Codes":"A"}"#);
        let response = route(
            &store,
            "PUT",
            "/api/edit",
            r#"{"index":0,"version":1,"Codes":"B"}"#,
        );
        assert_eq!(response.status, 200);
        assert_eq!(
            route(&store, "GET", "/api/data", "").body,
            json!([{"Codes": "B"}])
        );
    }

    #[test]
    fn bad_index_types_are_rejected() {
        let store = store();
        route(&store, "POST", "/api/add", r#"{"Codes":"A"}"#);
        for body in [
            r#"{"Codes":"B"}"#,
            r#"{"index":-1}"#,
            r#"{"index":"0"}"#,
            r#"{"index":0,"version":"1"}"#,
            "[]",
        ] {
            let response = route(&store, "DELETE", "/api/delete", body);
            assert_eq!(response.status, 400, "body {body}");
        }
        assert_eq!(route(&store, "GET", "/api/data", "").body, json!([{"Codes": "A"}]));
    }

    #[test]
    fn oversized_body_is_refused() {
        let at_limit = vec![b'x'; 16];
        assert_eq!(read_body(at_limit.as_slice(), 16).ok().map(|body| body.len()), Some(16));

        let too_big = vec![b'x'; 17];
        let rejection = read_body(too_big.as_slice(), 16).expect_err("body over the limit");
        assert_eq!(rejection.status, 413);
        assert!(
            rejection.body["error"]
                .as_str()
                .is_some_and(|error| error.contains("exceeds 16 bytes"))
        );
    }

    #[test]
    fn non_utf8_body_is_a_bad_request() {
        let bytes: &[u8] = &[0xff, 0xfe, 0x00];
        let rejection = read_body(bytes, 16).expect_err("invalid utf-8");
        assert_eq!(rejection.status, 400);
    }
}
