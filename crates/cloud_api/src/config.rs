//! Configuration collaborator: per-identity fee settings and decrypted
//! source credentials, read through a seam so the pipeline never touches
//! ambient state and tests can inject fixtures.

use async_trait::async_trait;
use db::{ApiSettingsRow, DbPool};
use domain::{
    CodRemittanceFee, FeeSettings, Identity, MarketerFee, MarketerKind, PaymentGatewayFee,
};

use crate::crypto;
use crate::source_connectors::{
    AdsCredentials, LogisticsCredentials, StorefrontCredentials, TokenSink,
};

/// Everything the orchestrator needs for one identity. A `None` credential
/// slot means that source is not configured.
#[derive(Clone, Default)]
pub struct IdentitySettings {
    pub fees: FeeSettings,
    pub storefront: Option<StorefrontCredentials>,
    pub logistics: Option<LogisticsCredentials>,
    pub ads: Option<AdsCredentials>,
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Err carries a human-readable reason the settings store itself was
    /// unreachable; an identity with nothing configured is Ok with empty
    /// slots.
    async fn settings_for(&self, identity: &Identity) -> Result<IdentitySettings, String>;
}

/// Provider used when the service runs without a database: defaults, no
/// credentials, every source reports not-configured.
pub struct UnconfiguredSettings;

#[async_trait]
impl SettingsProvider for UnconfiguredSettings {
    async fn settings_for(&self, _identity: &Identity) -> Result<IdentitySettings, String> {
        Ok(IdentitySettings::default())
    }
}

/// `company_id` column value for an identity; user-scoped rows use ''.
pub fn company_scope(identity: &Identity) -> &str {
    identity.company_id.as_deref().unwrap_or("")
}

pub fn fee_settings_from_row(row: &ApiSettingsRow) -> FeeSettings {
    FeeSettings {
        payment_gateway: PaymentGatewayFee {
            enabled: row.gateway_fee_enabled,
            fee: row.gateway_fee_percent,
        },
        marketer: MarketerFee {
            enabled: row.marketer_enabled,
            kind: if row.marketer_type.eq_ignore_ascii_case("fixed") {
                MarketerKind::Fixed
            } else {
                MarketerKind::Percentage
            },
            value: row.marketer_value,
        },
        cod_remittance: CodRemittanceFee {
            fee: row.cod_remittance_fee,
        },
    }
}

/// Decrypt one stored secret; an empty/missing column or a failed decrypt
/// yields `None` (the source then reports not-configured rather than
/// failing mid-fetch with a garbage credential).
fn decrypt_column(column: &Option<String>, what: &str) -> Option<String> {
    let ciphertext = column.as_deref().filter(|s| !s.is_empty())?;
    match crypto::decrypt_secret(ciphertext) {
        Ok(secret) if !secret.is_empty() => Some(secret),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("could not decrypt stored {what}: {e}");
            None
        }
    }
}

pub struct DbSettingsProvider {
    pool: DbPool,
}

impl DbSettingsProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsProvider for DbSettingsProvider {
    async fn settings_for(&self, identity: &Identity) -> Result<IdentitySettings, String> {
        let row = db::get_settings(&self.pool, &identity.user_id, company_scope(identity))
            .await
            .map_err(|e| format!("settings lookup failed: {e}"))?;
        let Some(row) = row else {
            return Ok(IdentitySettings::default());
        };

        let storefront = match (
            row.storefront_domain.as_deref().filter(|s| !s.is_empty()),
            decrypt_column(&row.storefront_token_enc, "storefront token"),
        ) {
            (Some(domain), Some(token)) => Some(StorefrontCredentials {
                store_domain: domain.to_string(),
                access_token: token,
            }),
            _ => None,
        };

        let logistics = match (
            row.logistics_email.as_deref().filter(|s| !s.is_empty()),
            decrypt_column(&row.logistics_password_enc, "logistics password"),
        ) {
            (Some(email), Some(password)) => Some(LogisticsCredentials {
                email: email.to_string(),
                password,
            }),
            _ => None,
        };

        let ads = match (
            decrypt_column(&row.ads_access_token_enc, "ads access token"),
            row.ads_account_id.as_deref().filter(|s| !s.is_empty()),
        ) {
            (Some(access_token), Some(account_id)) => Some(AdsCredentials {
                access_token,
                ad_account_id: account_id.to_string(),
                app_id: row.ads_app_id.clone().filter(|s| !s.is_empty()),
                app_secret: decrypt_column(&row.ads_app_secret_enc, "ads app secret"),
            }),
            _ => None,
        };

        Ok(IdentitySettings {
            fees: fee_settings_from_row(&row),
            storefront,
            logistics,
            ads,
        })
    }
}

/// Persists upgraded long-lived ads tokens back to the settings row.
pub struct DbTokenSink {
    pool: DbPool,
}

impl DbTokenSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenSink for DbTokenSink {
    async fn store_ads_token(&self, identity: &Identity, access_token: &str) {
        let encrypted = match crypto::encrypt_secret(access_token) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                tracing::warn!("could not encrypt upgraded ads token: {e}");
                return;
            }
        };
        if let Err(e) = db::update_ads_access_token(
            &self.pool,
            &identity.user_id,
            company_scope(identity),
            &encrypted,
        )
        .await
        {
            tracing::warn!("could not persist upgraded ads token: {e}");
        } else {
            tracing::info!("stored long-lived ads token for {}", identity.user_id);
        }
    }
}
