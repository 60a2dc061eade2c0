use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use budget_tracker::config::Config;
use budget_tracker::db::BudgetStorage;
use budget_tracker::router::{BudgetState, budget_router};
use serde_json::Value;
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "admin-secret";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    pub fn flashes(&self) -> Vec<String> {
        self.body["flashes"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A browser-like client: keeps cookies between requests to one app.
pub struct TestClient {
    app: Router,
    cookies: HashMap<String, String>,
    csrf_token: Option<String>,
    /// Removed on drop by the client that created it.
    db_path: Option<PathBuf>,
}

impl TestClient {
    pub async fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();

        let mut db_path = std::env::temp_dir();
        db_path.push(format!(
            "budget-tracker-routes-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));

        let database_url = format!("sqlite:{}", db_path.display());
        let storage = BudgetStorage::connect(&database_url)
            .await
            .expect("failed to open test database");

        let cfg = Config {
            admin_key: Some(ADMIN_KEY.to_string()),
            insecure_cookie: true,
            ..Config::default()
        };
        let state = BudgetState::new(storage, &cfg)
            .await
            .expect("failed to build state");

        Self {
            app: budget_router(state),
            cookies: HashMap::new(),
            csrf_token: None,
            db_path: Some(db_path),
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let req = self
            .request("GET", uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.send(req).await
    }

    /// A second client on the same app and database, with its own cookies.
    pub fn other_browser(&self) -> Self {
        Self {
            app: self.app.clone(),
            cookies: HashMap::new(),
            csrf_token: None,
            db_path: None,
        }
    }

    /// Token from the last rendered page; loads the login page if none was seen yet.
    pub async fn csrf_token(&mut self) -> String {
        if self.csrf_token.is_none() {
            self.get("/login").await;
        }
        self.csrf_token
            .clone()
            .expect("rendered pages carry a csrf token")
    }

    /// Post a form the way a page would, echoing the csrf token.
    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let token = self.csrf_token().await;
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_form_raw(uri, &fields).await
    }

    /// Post exactly the given fields.
    pub async fn post_form_raw(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let req = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("failed to build request");
        self.send(req).await
    }

    pub async fn post_admin(&mut self, uri: &str, key: Option<&str>) -> TestResponse {
        let mut builder = self.request("POST", uri);
        if let Some(key) = key {
            builder = builder.header("x-admin-key", key);
        }
        let req = builder.body(Body::empty()).expect("failed to build request");
        self.send(req).await
    }

    pub async fn register_and_login(&mut self, username: &str, salary: &str) {
        let resp = self
            .post_form(
                "/register",
                &[
                    ("username", username),
                    ("password", "pw"),
                    ("confirmation", "pw"),
                    ("salary", salary),
                ],
            )
            .await;
        assert_eq!(resp.location(), Some("/login"));
        self.get("/login").await;

        let resp = self
            .post_form("/login", &[("username", username), ("password", "pw")])
            .await;
        assert_eq!(resp.location(), Some("/"));
        self.get("/").await;
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    async fn send(&mut self, req: Request<Body>) -> TestResponse {
        let resp = self.app.clone().oneshot(req).await.expect("request failed");
        let status = resp.status();
        let headers = resp.headers().clone();

        for set_cookie in headers.get_all(header::SET_COOKIE) {
            let raw = set_cookie.to_str().expect("set-cookie was not ascii");
            let pair = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                if value.is_empty() {
                    self.cookies.remove(name);
                } else {
                    self.cookies.insert(name.to_string(), value.to_string());
                }
            }
        }

        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        if let Some(token) = body["csrf_token"].as_str() {
            self.csrf_token = Some(token.to_string());
        }

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Drop for TestClient {
    fn drop(&mut self) {
        if let Some(path) = &self.db_path {
            let _ = fs::remove_file(path);
        }
    }
}
