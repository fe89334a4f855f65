use log::warn;
use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Catcher, Request, Route,
};

mod auth;
mod elections;
mod results;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(elections::routes());
    routes.extend(votes::routes());
    routes.extend(results::routes());
    routes
}

/// Catchers that keep error bodies in the same shape as route errors.
pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        not_found,
        unprocessable_entity,
        internal_error,
        default_catcher,
    ]
}

fn error_body(message: &str) -> Json<Value> {
    Json(json!({
        "ok": false,
        "error": message,
    }))
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    error_body("Malformed request")
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    error_body("Please sign in")
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    error_body(&format!("Nothing found at {}", req.uri()))
}

#[catch(422)]
fn unprocessable_entity() -> Json<Value> {
    error_body("Request body does not match the expected format")
}

#[catch(500)]
fn internal_error() -> Json<Value> {
    error_body("Internal server error")
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request) -> Json<Value> {
    warn!("Uncaught {status} for {} {}", req.method(), req.uri());
    error_body(status.reason().unwrap_or("Request failed"))
}
