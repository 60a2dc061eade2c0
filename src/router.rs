use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::db::BudgetStorage;
use crate::error::BudgetError;
use crate::handlers::{account, admin, budget, profile};
use crate::ledger::Ledger;
use crate::middleware::session::CookieSettings;
use crate::render::{JsonRenderer, Renderer};
use crate::service::archive_actor::{self, ArchiveHandle};

/// Application context shared by every handler.
#[derive(Clone)]
pub struct BudgetState {
    pub storage: BudgetStorage,
    pub ledger: Ledger,
    pub auth: Authenticator,
    pub archive: ArchiveHandle,
    pub renderer: Arc<dyn Renderer>,
    pub cookie_key: Key,
    pub cookies: CookieSettings,
    pub admin_key: Option<Arc<str>>,
    pub request_timeout: Duration,
}

impl BudgetState {
    /// Build the context once at startup. Spawns the archive actor.
    pub async fn new(storage: BudgetStorage, cfg: &Config) -> Result<Self, BudgetError> {
        let cookie_key = match cfg.secret_key.as_deref() {
            Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| {
                BudgetError::validation("secret_key", "secret_key must be at least 64 bytes")
            })?,
            None => {
                warn!("no secret_key configured; sessions will not survive a restart");
                Key::generate()
            }
        };

        let archive = archive_actor::spawn(storage.clone()).await?;

        Ok(Self {
            ledger: Ledger::new(storage.clone()),
            auth: Authenticator::new(storage.clone()),
            storage,
            archive,
            renderer: Arc::new(JsonRenderer),
            cookie_key,
            cookies: CookieSettings {
                secure: !cfg.insecure_cookie,
                session_max_age: time::Duration::hours(cfg.session_hours),
            },
            admin_key: cfg.admin_key.as_deref().map(Arc::from),
            request_timeout: cfg.request_timeout(),
        })
    }

    /// Swap the view renderer, e.g. for HTML templates.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

impl FromRef<BudgetState> for Key {
    fn from_ref(state: &BudgetState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn budget_router(state: BudgetState) -> Router {
    let timeout = state.request_timeout;
    Router::new()
        .route("/", get(budget::index))
        .route("/add_expense", get(budget::add_expense_page).post(budget::add_expense))
        .route("/history", get(budget::history))
        .route("/reset_expenses", post(budget::reset_expenses))
        .route("/profile", get(profile::profile_page).post(profile::update_profile))
        .route("/login", get(account::login_page).post(account::login))
        .route("/register", get(account::register_page).post(account::register))
        .route("/logout", get(account::logout))
        .route("/admin/archive", get(admin::last_archive).post(admin::run_archive))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
