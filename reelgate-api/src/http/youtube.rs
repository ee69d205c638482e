// YouTube channel linking HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use reelgate_core::models::YouTubeAccount;
use serde::{Deserialize, Serialize};

use super::{middleware::CreatorUser, AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub authorization_url: String,
}

/// Query Google appends to the redirect URI
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub connected: bool,
    pub account: Option<YouTubeAccount>,
}

pub async fn connect(
    CreatorUser(auth): CreatorUser,
    State(state): State<AppState>,
) -> AppResult<Json<ConnectResponse>> {
    let authorization_url = state.youtube_service.begin_connect(&auth.actor()).await?;
    Ok(Json(ConnectResponse { authorization_url }))
}

/// OAuth redirect target. Unauthenticated: the state token identifies the creator.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let result = complete(&state, query).await;

    match (&state.post_connect_redirect, result) {
        (Some(target), Ok(_)) => Redirect::to(&with_outcome(target, "connected")).into_response(),
        (Some(target), Err(e)) => {
            tracing::warn!(error = %e, "YouTube connect failed");
            Redirect::to(&with_outcome(target, "error")).into_response()
        }
        (None, Ok(account)) => Json(AccountResponse {
            connected: true,
            account: Some(account),
        })
        .into_response(),
        (None, Err(e)) => e.into_response(),
    }
}

async fn complete(state: &AppState, query: CallbackQuery) -> AppResult<YouTubeAccount> {
    if let Some(error) = query.error {
        return Err(AppError::bad_request(format!("Authorization was not granted: {error}")));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(AppError::bad_request("Missing 'code' or 'state' parameter"));
    };

    Ok(state
        .youtube_service
        .complete_connect(&oauth_state, &code)
        .await?)
}

fn with_outcome(target: &str, outcome: &str) -> String {
    let separator = if target.contains('?') { '&' } else { '?' };
    format!("{target}{separator}youtube={outcome}")
}

pub async fn get_account(
    CreatorUser(auth): CreatorUser,
    State(state): State<AppState>,
) -> AppResult<Json<AccountResponse>> {
    let account = state.youtube_service.status(&auth.user_id).await?;
    Ok(Json(AccountResponse {
        connected: account.is_some(),
        account,
    }))
}

pub async fn disconnect(
    CreatorUser(auth): CreatorUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    state.youtube_service.disconnect(&auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_outcome() {
        assert_eq!(
            with_outcome("https://app.example.com/settings", "connected"),
            "https://app.example.com/settings?youtube=connected"
        );
        assert_eq!(
            with_outcome("https://app.example.com/settings?tab=yt", "error"),
            "https://app.example.com/settings?tab=yt&youtube=error"
        );
    }
}
