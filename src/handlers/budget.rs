use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Local;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{fail, page};
use crate::db::User;
use crate::error::BudgetError;
use crate::ledger::{
    LedgerEntry, SAVINGS_CATEGORY, average_expense, group_by_category, total_expenses,
};
use crate::middleware::csrf::CsrfForm;
use crate::middleware::session::{CurrentUser, push_flash};
use crate::router::BudgetState;
use crate::savings::{SavingsGoal, evaluate};

#[derive(Debug, Deserialize)]
pub struct ExpenseForm {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount: String,
}

/// GET / -> spending summary and savings goal status.
pub async fn index(
    State(state): State<BudgetState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
) -> Response {
    match dashboard(&state, &user).await {
        Ok(data) => page(&state, jar, "index", data),
        Err(e) => fail(&state, jar, e, "/login"),
    }
}

async fn dashboard(state: &BudgetState, user: &User) -> Result<Value, BudgetError> {
    // spending and set-aside money come from one snapshot
    let (set_aside, spending): (Vec<_>, Vec<_>) = state
        .ledger
        .list_expenses(user.id, None)
        .await?
        .into_iter()
        .partition(|e| e.category == SAVINGS_CATEGORY);
    let set_aside = total_expenses(&set_aside);

    let total = total_expenses(&spending);
    let status = evaluate(user.salary, SavingsGoal::new(user.savings_goal)?, total);

    Ok(json!({
        "user": user,
        "expenses_by_category": group_by_category(&spending),
        "expense_count": spending.len(),
        "total_expenses": total,
        "average_expense": average_expense(&spending),
        "savings": status.savings,
        "savings_goal_amount": status.savings_goal_amount,
        "savings_goal_reached": status.goal_reached,
        "set_aside": set_aside,
        "current_date": Local::now().format("%B %d, %Y").to_string(),
    }))
}

pub async fn add_expense_page(
    State(state): State<BudgetState>,
    CurrentUser(_user): CurrentUser,
    jar: PrivateCookieJar,
) -> Response {
    page(&state, jar, "add_expense", json!({}))
}

/// POST /add_expense -> records the expense and returns home.
pub async fn add_expense(
    State(state): State<BudgetState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
    CsrfForm(form): CsrfForm<ExpenseForm>,
) -> Response {
    match state
        .ledger
        .add_expense_raw(user.id, &form.category, &form.amount)
        .await
    {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e @ BudgetError::Validation { .. }) => fail(&state, jar, e, "/add_expense"),
        Err(e) => fail(&state, jar, e, "/"),
    }
}

fn format_entry<E: LedgerEntry>(entry: &E) -> Value {
    json!({
        "category": entry.category(),
        "amount": entry.amount(),
        "timestamp": entry.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}

/// GET /history -> current expenses oldest first, plus archived entries.
pub async fn history(
    State(state): State<BudgetState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
) -> Response {
    let loaded = async {
        let expenses = state.ledger.list_chronological(user.id).await?;
        let archived = state.ledger.list_history(user.id).await?;
        Ok::<_, BudgetError>((expenses, archived))
    }
    .await;

    match loaded {
        Ok((expenses, archived)) => {
            let data = json!({
                "expenses": expenses.iter().map(format_entry).collect::<Vec<_>>(),
                "archived": archived.iter().map(format_entry).collect::<Vec<_>>(),
            });
            page(&state, jar, "history", data)
        }
        Err(e) => fail(&state, jar, e, "/"),
    }
}

/// The reset form carries nothing but its csrf token.
#[derive(Debug, Deserialize)]
pub struct ResetForm {}

/// POST /reset_expenses -> wipes the user's expenses and history.
pub async fn reset_expenses(
    State(state): State<BudgetState>,
    CurrentUser(user): CurrentUser,
    jar: PrivateCookieJar,
    CsrfForm(ResetForm {}): CsrfForm<ResetForm>,
) -> Response {
    match state.ledger.reset_all(user.id).await {
        Ok(()) => {
            let jar = push_flash(
                jar,
                "All expenses and history have been reset successfully",
                &state.cookies,
            );
            (jar, Redirect::to("/profile")).into_response()
        }
        Err(e) => fail(&state, jar, e, "/profile"),
    }
}
