use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::json;

use super::{fail, page};
use crate::middleware::csrf::CsrfForm;
use crate::middleware::session::{CurrentUser, push_flash};
use crate::router::BudgetState;

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    /// Present (non-empty) when the password section was submitted.
    #[serde(default)]
    pub change_password: Option<String>,
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirmation: String,
    #[serde(default)]
    pub salary: String,
    /// Percentage, e.g. `20` for 20%.
    #[serde(default)]
    pub savings_goal: String,
}

impl ProfileForm {
    fn wants_password_change(&self) -> bool {
        self.change_password.as_deref().is_some_and(|v| !v.is_empty())
    }
}

pub async fn profile_page(
    State(state): State<BudgetState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
) -> Response {
    let percent = user.savings_goal * 100.0;
    page(
        &state,
        jar,
        "profile",
        json!({ "user": user, "savings_goal_percent": percent }),
    )
}

/// POST /profile -> either changes the password or updates salary and goal.
pub async fn update_profile(
    State(state): State<BudgetState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
    CsrfForm(form): CsrfForm<ProfileForm>,
) -> Response {
    let result = if form.wants_password_change() {
        state
            .auth
            .change_password(&user, &form.old_password, &form.password, &form.confirmation)
            .await
    } else {
        state
            .auth
            .update_budget(&user, &form.salary, &form.savings_goal)
            .await
            .map(|_| ())
    };

    match result {
        Ok(()) => {
            let jar = push_flash(jar, "Profile updated successfully", &state.cookies);
            (jar, Redirect::to("/profile")).into_response()
        }
        Err(e) => fail(&state, jar, e, "/profile"),
    }
}
