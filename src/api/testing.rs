//! Helpers shared by the HTTP tests.

use rocket::{
    http::{ContentType, Header, Status},
    local::asynchronous::Client,
    serde::json::Value,
};

use crate::model::{api::auth::BEARER_PREFIX, api::voter::RegisterRequest, mongodb::Id};
use crate::API_BASE;

const BOUNDARY: &str = "X-VOTING-BOUNDARY";

/// The smallest valid PNG: a 1x1 transparent pixel.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// A route path under the API base.
pub fn path(route: &str) -> String {
    format!("{API_BASE}{route}")
}

/// A registered, logged-in voter.
pub struct Login {
    pub id: Id,
    pub token: String,
}

impl Login {
    pub fn bearer(&self) -> Header<'static> {
        Header::new("Authorization", format!("{BEARER_PREFIX}{}", self.token))
    }
}

/// Register (if needed) and log in.
pub async fn login_as(client: &Client, request: RegisterRequest) -> Login {
    client
        .post(path("/voters/register"))
        .json(&request)
        .dispatch()
        .await;
    let response = client
        .post(path("/voters/login"))
        .json(&request.login())
        .dispatch()
        .await;
    assert_eq!(Status::Ok, response.status());
    let body: Value = response.into_json().await.unwrap();
    Login {
        id: body["id"].as_str().unwrap().parse().unwrap(),
        token: body["token"].as_str().unwrap().to_string(),
    }
}

/// A `multipart/form-data` body under construction.
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn content_type() -> ContentType {
        ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn image(self, name: &str) -> Self {
        self.file(name, "picture.png", "image/png", PNG)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Create an election through the API, returning its ID.
pub async fn create_election(client: &Client, admin: &Login, title: &str) -> Id {
    let body = Multipart::new()
        .text("title", title)
        .text("description", "A test election")
        .image("thumbnail")
        .finish();
    let response = client
        .post(path("/elections"))
        .header(admin.bearer())
        .header(Multipart::content_type())
        .body(body)
        .dispatch()
        .await;
    assert_eq!(Status::Created, response.status());
    let body: Value = response.into_json().await.unwrap();
    body["id"].as_str().unwrap().parse().unwrap()
}

/// Create a candidate through the API, returning its ID.
pub async fn create_candidate(client: &Client, admin: &Login, election: Id, name: &str) -> Id {
    let body = Multipart::new()
        .text("fullName", name)
        .text("motto", "Vote for me")
        .text("currentElection", &election.to_string())
        .image("image")
        .finish();
    let response = client
        .post(path("/candidates"))
        .header(admin.bearer())
        .header(Multipart::content_type())
        .body(body)
        .dispatch()
        .await;
    assert_eq!(Status::Created, response.status());
    let body: Value = response.into_json().await.unwrap();
    body["id"].as_str().unwrap().parse().unwrap()
}
