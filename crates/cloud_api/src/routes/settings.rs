//! Fee configuration + source credential management. Credentials are
//! write-only: stored encrypted and echoed back only as configured flags.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::{company_scope, fee_settings_from_row};
use crate::session::CurrentUser;
use crate::state::AppState;
use db::NewApiSettings;
use domain::{FeeSettings, MarketerKind};

pub fn router(_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard/settings", get(get_settings))
        .route("/dashboard/settings", put(save_settings))
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    fees: FeeSettings,
    storefront_configured: bool,
    logistics_configured: bool,
    ads_configured: bool,
}

async fn get_settings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SettingsResponse>, (StatusCode, String)> {
    let db = state.db.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "database not available".to_string(),
    ))?;

    let row = db::get_settings(db, &user.0.user_id, company_scope(&user.0))
        .await
        .map_err(internal)?;

    let response = match row {
        Some(row) => SettingsResponse {
            fees: fee_settings_from_row(&row),
            storefront_configured: row.storefront_domain.is_some()
                && row
                    .storefront_token_enc
                    .as_deref()
                    .is_some_and(|s| !s.is_empty()),
            logistics_configured: row.logistics_email.is_some()
                && row
                    .logistics_password_enc
                    .as_deref()
                    .is_some_and(|s| !s.is_empty()),
            ads_configured: row
                .ads_access_token_enc
                .as_deref()
                .is_some_and(|s| !s.is_empty())
                && row.ads_account_id.is_some(),
        },
        None => SettingsResponse {
            fees: FeeSettings::default(),
            storefront_configured: false,
            logistics_configured: false,
            ads_configured: false,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct SaveSettingsRequest {
    #[serde(default)]
    fees: FeeSettingsBody,
    storefront_domain: Option<String>,
    storefront_token: Option<String>,
    logistics_email: Option<String>,
    logistics_password: Option<String>,
    ads_access_token: Option<String>,
    ads_account_id: Option<String>,
    ads_app_id: Option<String>,
    ads_app_secret: Option<String>,
}

/// Flattened fee fields as the settings form submits them.
#[derive(Debug, Deserialize)]
struct FeeSettingsBody {
    gateway_fee_enabled: bool,
    gateway_fee_percent: f64,
    marketer_enabled: bool,
    marketer_type: String,
    marketer_value: f64,
    cod_remittance_fee: f64,
}

impl Default for FeeSettingsBody {
    fn default() -> Self {
        let defaults = FeeSettings::default();
        Self {
            gateway_fee_enabled: defaults.payment_gateway.enabled,
            gateway_fee_percent: defaults.payment_gateway.fee,
            marketer_enabled: defaults.marketer.enabled,
            marketer_type: match defaults.marketer.kind {
                MarketerKind::Percentage => "percentage".to_string(),
                MarketerKind::Fixed => "fixed".to_string(),
            },
            marketer_value: defaults.marketer.value,
            cod_remittance_fee: defaults.cod_remittance.fee,
        }
    }
}

async fn save_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<SaveSettingsRequest>,
) -> Result<Json<SettingsResponse>, (StatusCode, String)> {
    let db = state.db.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "database not available".to_string(),
    ))?;

    let encrypt = |secret: &Option<String>| -> Result<Option<String>, (StatusCode, String)> {
        match secret.as_deref().filter(|s| !s.is_empty()) {
            Some(plain) => crate::crypto::encrypt_secret(plain)
                .map(Some)
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e)),
            None => Ok(None),
        }
    };

    let storefront_token_enc = encrypt(&body.storefront_token)?;
    let logistics_password_enc = encrypt(&body.logistics_password)?;
    let ads_access_token_enc = encrypt(&body.ads_access_token)?;
    let ads_app_secret_enc = encrypt(&body.ads_app_secret)?;

    let row = db::upsert_settings(
        db,
        NewApiSettings {
            user_id: &user.0.user_id,
            company_id: company_scope(&user.0),
            storefront_domain: body.storefront_domain.as_deref(),
            storefront_token_enc: storefront_token_enc.as_deref(),
            logistics_email: body.logistics_email.as_deref(),
            logistics_password_enc: logistics_password_enc.as_deref(),
            ads_access_token_enc: ads_access_token_enc.as_deref(),
            ads_account_id: body.ads_account_id.as_deref(),
            ads_app_id: body.ads_app_id.as_deref(),
            ads_app_secret_enc: ads_app_secret_enc.as_deref(),
            gateway_fee_enabled: body.fees.gateway_fee_enabled,
            gateway_fee_percent: body.fees.gateway_fee_percent,
            marketer_enabled: body.fees.marketer_enabled,
            marketer_type: &body.fees.marketer_type,
            marketer_value: body.fees.marketer_value,
            cod_remittance_fee: body.fees.cod_remittance_fee,
        },
    )
    .await
    .map_err(internal)?;

    Ok(Json(SettingsResponse {
        fees: fee_settings_from_row(&row),
        storefront_configured: row.storefront_domain.is_some()
            && row
                .storefront_token_enc
                .as_deref()
                .is_some_and(|s| !s.is_empty()),
        logistics_configured: row.logistics_email.is_some()
            && row
                .logistics_password_enc
                .as_deref()
                .is_some_and(|s| !s.is_empty()),
        ads_configured: row
            .ads_access_token_enc
            .as_deref()
            .is_some_and(|s| !s.is_empty())
            && row.ads_account_id.is_some(),
    }))
}

fn internal<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
