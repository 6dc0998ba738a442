//! HTTP transport for the inference service.
//!
//! Wraps `tiny_http`, every handler thread pulls requests from the same listener.
//!
//! * `POST /predict` - JSON prediction request, answers `{"prediction": <float>}`.
//! * `GET /health` - `{"status": "ok", "model_loaded": <bool>}`, never loads the model.

use std::{
    io::{self, Read},
    net::SocketAddr,
};

use log::{debug, warn};
use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, Server};

use super::{
    artifact::ArtifactStore, error::ServingErr, request::PredictRequest, service::InferenceService,
};

/// Larger request bodies are rejected without being parsed.
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// A status code and its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn detail(status: u16, detail: impl ToString) -> Self {
        Self {
            status,
            body: json!({ "detail": detail.to_string() }),
        }
    }
}

impl From<ServingErr> for Reply {
    fn from(e: ServingErr) -> Self {
        Self::detail(e.status(), e)
    }
}

/// Routes a single request to the service.
///
/// # Arguments
/// * `method` - The request's HTTP method.
/// * `url` - The request's target, query string included.
/// * `body` - The raw request body.
/// * `service` - The service answering predictions.
///
/// # Returns
/// The reply to send back.
pub fn route<S: ArtifactStore>(
    method: &Method,
    url: &str,
    body: &[u8],
    service: &InferenceService<S>,
) -> Reply {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (Method::Post, "/predict") => {
            let prediction = PredictRequest::from_json(body).and_then(|req| service.predict(&req));

            match prediction {
                Ok(prediction) => Reply::ok(json!({ "prediction": prediction })),
                Err(e) => {
                    debug!("rejected prediction request: {e}");
                    e.into()
                }
            }
        }
        (Method::Get, "/health") => Reply::ok(json!({
            "status": "ok",
            "model_loaded": service.is_loaded(),
        })),
        (_, "/predict" | "/health") => Reply::detail(405, "Method Not Allowed"),
        _ => Reply::detail(404, "Not Found"),
    }
}

/// HTTP server exposing an `InferenceService`.
pub struct HttpServer {
    server: Server,
}

impl HttpServer {
    /// Binds a new server to `addr`, e.g. "0.0.0.0:8000" or "127.0.0.1:0".
    pub fn bind(addr: &str) -> io::Result<Self> {
        let server = Server::http(addr).map_err(io::Error::other)?;
        Ok(Self { server })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serves requests until `unblock` is called.
    ///
    /// Can be called from several threads at once, each call handles one request at a time.
    pub fn serve<S: ArtifactStore>(&self, service: &InferenceService<S>) {
        for request in self.server.incoming_requests() {
            handle(request, service);
        }
    }

    /// Handles exactly one request, then returns.
    pub fn handle_one<S: ArtifactStore>(&self, service: &InferenceService<S>) -> io::Result<()> {
        let request = self.server.recv()?;
        handle(request, service);
        Ok(())
    }

    /// Wakes up one thread blocked in `serve` or `handle_one` and makes it return.
    pub fn unblock(&self) {
        self.server.unblock();
    }
}

fn handle<S: ArtifactStore>(mut request: Request, service: &InferenceService<S>) {
    let reply = match read_body(&mut request) {
        Ok(Some(body)) => route(request.method(), request.url(), &body, service),
        Ok(None) => Reply::detail(413, "Payload Too Large"),
        Err(e) => Reply::detail(400, format!("failed to read request body: {e}")),
    };

    let mut response = Response::from_data(reply.body.to_string()).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }

    if let Err(e) = request.respond(response) {
        warn!("failed to send response: {e}");
    }
}

fn read_body(request: &mut Request) -> io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)?;

    if body.len() as u64 > MAX_BODY_BYTES {
        return Ok(None);
    }

    Ok(Some(body))
}
