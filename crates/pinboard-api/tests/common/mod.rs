#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use pinboard_api::auth::{AppState, AppStateInner};
use pinboard_api::build_router;
use pinboard_api::storage::UploadStore;
use pinboard_db::Database;

pub const PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let uploads = UploadStore::new(dir.path().join("uploads")).await.unwrap();
    let state = AppStateInner::new(db, "test-secret".into(), uploads, dir.path().join("static")).unwrap();

    TestApp {
        router: build_router(state.clone()),
        state,
        dir,
    }
}

impl TestApp {
    pub fn client(&self) -> Client<'_> {
        Client {
            app: self,
            cookies: HashMap::new(),
        }
    }

    /// Sign up and log in through the real forms.
    pub async fn register(&self, username: &str) -> Client<'_> {
        let mut client = self.client();
        let resp = client
            .post_form(
                "/signup",
                &[
                    ("username", username),
                    ("email", &email(username)),
                    ("password", PASSWORD),
                    ("confirm_password", PASSWORD),
                ],
            )
            .await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER, "signup failed: {}", resp.text());

        let resp = client
            .post_form("/login", &[("email", &email(username)), ("password", PASSWORD)])
            .await;
        assert_eq!(resp.location(), "/dashboard");
        client
    }

    pub fn user_id(&self, username: &str) -> i64 {
        self.state.db.get_user_by_username(username).unwrap().unwrap().id
    }
}

pub fn email(username: &str) -> String {
    format!("{}@example.com", username.to_lowercase())
}

/// A browser stand-in that keeps cookies between requests.
pub struct Client<'a> {
    app: &'a TestApp,
    pub cookies: HashMap<String, String>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| panic!("not JSON ({e}): {}", self.text()))
    }

    pub fn location(&self) -> &str {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl Client<'_> {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::get(uri), Body::empty()).await
    }

    pub async fn get_json(&mut self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).header(header::ACCEPT, "application/json"), Body::empty())
            .await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(req, Body::from(urlencode(fields))).await
    }

    pub async fn post_form_ajax(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-requested-with", "XMLHttpRequest");
        self.send(req, Body::from(urlencode(fields))).await
    }

    pub async fn post_ajax(&mut self, uri: &str) -> TestResponse {
        self.post_form_ajax(uri, &[]).await
    }

    /// Multipart upload with text fields and an optional `image` file part.
    pub async fn upload(
        &mut self,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
        ajax: bool,
    ) -> TestResponse {
        const BOUNDARY: &str = "pinboard-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let mut req = Request::post("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if ajax {
            req = req.header("x-requested-with", "XMLHttpRequest");
        }
        self.send(req, Body::from(body)).await
    }

    async fn send(&mut self, mut req: axum::http::request::Builder, body: Body) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            req = req.header(header::COOKIE, cookie);
        }

        let resp = self
            .app
            .router
            .clone()
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();

        for value in resp.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                if value.is_empty() {
                    self.cookies.remove(name);
                } else {
                    self.cookies.insert(name.to_string(), value.to_string());
                }
            }
        }

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, headers, body }
    }
}

fn urlencode(fields: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(fields).unwrap()
}
