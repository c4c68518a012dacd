//! Login + session lookup: the minimal identity provider the pipeline
//! consumes as an opaque `(user_id, company_id)` tuple.

use domain::Identity;
use sqlx::MySqlPool;

/// User row returned on successful login.
#[derive(Debug, sqlx::FromRow)]
pub struct LoginUserRow {
    /// Stored as CHAR(36) in MySQL; kept as String to avoid UUID/BINARY(16) mismatch.
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub company_id: Option<String>,
}

/// Verify email + password. Password_hash in DB is bcrypt. Returns user row if password matches.
pub async fn verify_login(
    pool: &MySqlPool,
    email: &str,
    password: &str,
) -> Result<Option<LoginUserRow>, sqlx::Error> {
    let row: Option<(String, String, Option<String>, Option<String>, Option<String>)> =
        sqlx::query_as(
            r#"
        SELECT id, email, display_name, company_id, password_hash
        FROM users
        WHERE LOWER(email) = LOWER(?) AND status = 'active' AND password_hash IS NOT NULL
        "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

    let Some((id, email_val, display_name, company_id, password_hash)) = row else {
        return Ok(None);
    };
    let Some(hash) = password_hash else {
        return Ok(None);
    };
    // Trim in case DB/MySQL returned hash with trailing newline or whitespace
    let hash = hash.trim();
    if !bcrypt::verify(password, hash).unwrap_or(false) {
        return Ok(None);
    }
    Ok(Some(LoginUserRow {
        id,
        email: email_val,
        display_name,
        company_id,
    }))
}

/// Create a session for the user; returns (session_id, token). Caller sets cookie.
pub async fn create_session(
    pool: &MySqlPool,
    user_id: &str,
    ttl_secs: i64,
) -> Result<(String, String), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let token = uuid::Uuid::new_v4().to_string().replace('-', "");
    let expires_at = chrono::Utc::now() + chrono::Duration::seconds(ttl_secs);
    sqlx::query("INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(&token)
        .bind(expires_at.naive_utc())
        .execute(pool)
        .await?;
    Ok((id, token))
}

/// Delete session by token (logout).
pub async fn delete_session_by_token(pool: &MySqlPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Resolve a session token to the identity tuple, if valid and not expired.
pub async fn get_identity_by_session_token(
    pool: &MySqlPool,
    token: &str,
) -> Result<Option<Identity>, sqlx::Error> {
    let row: Option<(String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT u.id, u.company_id
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ? AND s.expires_at > CURRENT_TIMESTAMP(3)
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(user_id, company_id)| Identity {
        user_id,
        company_id,
    }))
}
