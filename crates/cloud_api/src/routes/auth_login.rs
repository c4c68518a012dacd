use axum::{
    extract::State,
    http::{header::COOKIE, header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::session::{token_from_cookie_header, CurrentUser, SESSION_COOKIE_NAME};
use crate::state::AppState;
use db::{create_session, delete_session_by_token, verify_login};

const SESSION_TTL_SECS: i64 = 7 * 24 * 3600; // 7 days

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub message: String,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub company_id: Option<String>,
}

fn err_response(status: StatusCode, message: &str) -> (StatusCode, Json<LoginResponse>) {
    (
        status,
        Json(LoginResponse {
            ok: false,
            message: message.to_string(),
            user_id: None,
            display_name: None,
            company_id: None,
        }),
    )
}

pub fn router(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, (StatusCode, Json<LoginResponse>)> {
    let db = state
        .db
        .as_ref()
        .ok_or_else(|| err_response(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"))?;

    let user = verify_login(db, req.email.trim(), &req.password)
        .await
        .map_err(|e| {
            tracing::error!("verify_login error: {}", e);
            err_response(StatusCode::INTERNAL_SERVER_ERROR, "Login error")
        })?;

    let user = user.ok_or_else(|| err_response(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;

    let (_, token) = create_session(db, &user.id, SESSION_TTL_SECS)
        .await
        .map_err(|e| {
            tracing::error!("create_session error: {}", e);
            err_response(StatusCode::INTERNAL_SERVER_ERROR, "Login error")
        })?;

    let body = LoginResponse {
        ok: true,
        message: "Logged in".to_string(),
        user_id: Some(user.id.clone()),
        display_name: user.display_name.clone(),
        company_id: user.company_id.clone(),
    };

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE_NAME, token, SESSION_TTL_SECS
    );

    let mut res = (StatusCode::OK, Json(body)).into_response();
    res.headers_mut().insert(
        SET_COOKIE,
        cookie.parse().expect("static cookie format is valid"),
    );
    Ok(res)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // Best-effort server-side revocation before clearing the cookie.
    if let Some(db) = state.db.as_ref() {
        let cookie_header = headers.get(COOKIE).and_then(|v| v.to_str().ok());
        if let Some(token) = token_from_cookie_header(cookie_header) {
            let _ = delete_session_by_token(db, &token).await;
        }
    }

    let cookie = format!(
        "{}=; Path=/; HttpOnly; Max-Age=0; SameSite=Lax",
        SESSION_COOKIE_NAME
    );
    let mut res = StatusCode::NO_CONTENT.into_response();
    res.headers_mut().insert(
        SET_COOKIE,
        cookie.parse().expect("static cookie format is valid"),
    );
    res
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub company_id: Option<String>,
}

async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MeResponse>, (StatusCode, &'static str)> {
    let db = state
        .db
        .as_ref()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "database unavailable"))?;
    let row: Option<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT id, email, display_name FROM users WHERE id = ? AND status = 'active'",
    )
    .bind(&user.0.user_id)
    .fetch_optional(db)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "user lookup failed"))?;
    let (user_id, email, display_name) = row.ok_or((StatusCode::NOT_FOUND, "user not found"))?;
    Ok(Json(MeResponse {
        user_id,
        email,
        display_name,
        company_id: user.0.company_id,
    }))
}
