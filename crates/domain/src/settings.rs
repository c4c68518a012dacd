//! Fee configuration. Always passed into the fee policy explicitly so
//! computations stay reproducible without ambient state.

use serde::{Deserialize, Serialize};

/// Percentage fee charged by the payment gateway on prepaid orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentGatewayFee {
    pub enabled: bool,
    /// Percent of order value, e.g. 2.0 for 2%.
    pub fee: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketerKind {
    Percentage,
    Fixed,
}

/// Marketer commission: a percent of per-order profit, or a flat amount
/// per order. Commission follows profitability, not top-line sales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketerFee {
    pub enabled: bool,
    pub kind: MarketerKind,
    pub value: f64,
}

/// Flat per-order remittance charge on cash-on-delivery orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodRemittanceFee {
    pub fee: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSettings {
    pub payment_gateway: PaymentGatewayFee,
    pub marketer: MarketerFee,
    pub cod_remittance: CodRemittanceFee,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            payment_gateway: PaymentGatewayFee {
                enabled: true,
                fee: 2.0,
            },
            marketer: MarketerFee {
                enabled: false,
                kind: MarketerKind::Percentage,
                value: 0.0,
            },
            cod_remittance: CodRemittanceFee { fee: 0.49 },
        }
    }
}
