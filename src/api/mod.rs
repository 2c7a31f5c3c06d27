use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::{Error, ErrorBody, Result};

mod candidate;
mod election;
mod vote;
mod voter;

#[cfg(test)]
pub(crate) mod testing;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voter::routes());
    routes.extend(election::routes());
    routes.extend(candidate::routes());
    routes.extend(vote::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![not_found, default_catcher]
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody::new(format!("Not Found - {}", req.uri())))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody::new(status.reason_lossy()))
}

/// Extract a mandatory, non-blank form field.
fn required(value: Option<&str>, field: &'static str) -> Result<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid(field, "Fill in all fields"))
}

/// Extract an optional form field, treating blank as absent.
fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
