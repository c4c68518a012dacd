//! Per-identity API settings: fee configuration plus encrypted source
//! credentials. One row per (user, company) scope, upserted as a whole.

use crate::DbPool;
use chrono::NaiveDateTime;
use sqlx::FromRow;
use uuid::Uuid;

/// Raw settings row. Credential columns hold AES-GCM ciphertext (base64);
/// decryption happens in the service layer, never here.
#[derive(Debug, FromRow, Clone)]
pub struct ApiSettingsRow {
    pub id: String,
    pub user_id: String,
    pub company_id: String,
    pub storefront_domain: Option<String>,
    pub storefront_token_enc: Option<String>,
    pub logistics_email: Option<String>,
    pub logistics_password_enc: Option<String>,
    pub ads_access_token_enc: Option<String>,
    pub ads_account_id: Option<String>,
    pub ads_app_id: Option<String>,
    pub ads_app_secret_enc: Option<String>,
    pub gateway_fee_enabled: bool,
    pub gateway_fee_percent: f64,
    pub marketer_enabled: bool,
    pub marketer_type: String,
    pub marketer_value: f64,
    pub cod_remittance_fee: f64,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug)]
pub struct NewApiSettings<'a> {
    pub user_id: &'a str,
    /// Empty string for user-scoped settings (the unique key must stay total).
    pub company_id: &'a str,
    pub storefront_domain: Option<&'a str>,
    pub storefront_token_enc: Option<&'a str>,
    pub logistics_email: Option<&'a str>,
    pub logistics_password_enc: Option<&'a str>,
    pub ads_access_token_enc: Option<&'a str>,
    pub ads_account_id: Option<&'a str>,
    pub ads_app_id: Option<&'a str>,
    pub ads_app_secret_enc: Option<&'a str>,
    pub gateway_fee_enabled: bool,
    pub gateway_fee_percent: f64,
    pub marketer_enabled: bool,
    pub marketer_type: &'a str,
    pub marketer_value: f64,
    pub cod_remittance_fee: f64,
}

const SETTINGS_COLUMNS: &str = r#"
  id, user_id, company_id,
  storefront_domain, storefront_token_enc,
  logistics_email, logistics_password_enc,
  ads_access_token_enc, ads_account_id, ads_app_id, ads_app_secret_enc,
  gateway_fee_enabled, gateway_fee_percent,
  marketer_enabled, marketer_type, marketer_value,
  cod_remittance_fee, updated_at
"#;

pub async fn upsert_settings(
    pool: &DbPool,
    new: NewApiSettings<'_>,
) -> Result<ApiSettingsRow, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    // MySQL doesn't have native upsert with returning; insert .. on duplicate key update, then select.
    sqlx::query(
        r#"
        INSERT INTO api_settings (
          id, user_id, company_id,
          storefront_domain, storefront_token_enc,
          logistics_email, logistics_password_enc,
          ads_access_token_enc, ads_account_id, ads_app_id, ads_app_secret_enc,
          gateway_fee_enabled, gateway_fee_percent,
          marketer_enabled, marketer_type, marketer_value,
          cod_remittance_fee
        )
        VALUES (?, ?, ?,
                ?, ?,
                ?, ?,
                ?, ?, ?, ?,
                ?, ?,
                ?, ?, ?,
                ?)
        ON DUPLICATE KEY UPDATE
          storefront_domain = VALUES(storefront_domain),
          storefront_token_enc = VALUES(storefront_token_enc),
          logistics_email = VALUES(logistics_email),
          logistics_password_enc = VALUES(logistics_password_enc),
          ads_access_token_enc = VALUES(ads_access_token_enc),
          ads_account_id = VALUES(ads_account_id),
          ads_app_id = VALUES(ads_app_id),
          ads_app_secret_enc = VALUES(ads_app_secret_enc),
          gateway_fee_enabled = VALUES(gateway_fee_enabled),
          gateway_fee_percent = VALUES(gateway_fee_percent),
          marketer_enabled = VALUES(marketer_enabled),
          marketer_type = VALUES(marketer_type),
          marketer_value = VALUES(marketer_value),
          cod_remittance_fee = VALUES(cod_remittance_fee)
        "#,
    )
    .bind(&id)
    .bind(new.user_id)
    .bind(new.company_id)
    .bind(new.storefront_domain)
    .bind(new.storefront_token_enc)
    .bind(new.logistics_email)
    .bind(new.logistics_password_enc)
    .bind(new.ads_access_token_enc)
    .bind(new.ads_account_id)
    .bind(new.ads_app_id)
    .bind(new.ads_app_secret_enc)
    .bind(new.gateway_fee_enabled)
    .bind(new.gateway_fee_percent)
    .bind(new.marketer_enabled)
    .bind(new.marketer_type)
    .bind(new.marketer_value)
    .bind(new.cod_remittance_fee)
    .execute(pool)
    .await?;

    // Fetch the row (unique by user_id, company_id).
    let row = get_settings(pool, new.user_id, new.company_id).await?;
    row.ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_settings(
    pool: &DbPool,
    user_id: &str,
    company_id: &str,
) -> Result<Option<ApiSettingsRow>, sqlx::Error> {
    sqlx::query_as::<_, ApiSettingsRow>(&format!(
        "SELECT {SETTINGS_COLUMNS} FROM api_settings WHERE user_id = ? AND company_id = ?"
    ))
    .bind(user_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

/// Persist a refreshed ads access token without touching the rest of the row.
/// Used by the token-upgrade side effect during an ads fetch.
pub async fn update_ads_access_token(
    pool: &DbPool,
    user_id: &str,
    company_id: &str,
    ads_access_token_enc: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE api_settings SET ads_access_token_enc = ? WHERE user_id = ? AND company_id = ?",
    )
    .bind(ads_access_token_enc)
    .bind(user_id)
    .bind(company_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Identities that have a settings row at all, oldest-synced first, bounded.
/// Feeds the background refresh job.
pub async fn list_configured_identities(
    pool: &DbPool,
    limit: i64,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT user_id, company_id
        FROM api_settings
        ORDER BY updated_at ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
