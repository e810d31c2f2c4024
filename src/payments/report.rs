//! Typed mini-app payload boundary
//!
//! The mini-app sends loosely validated JSON through Telegram's
//! `web_app_data` channel. Everything is parsed into a tagged union here,
//! once, so nothing downstream re-validates ad hoc.

use rand::Rng;
use serde::Deserialize;
use strum::{Display, EnumString};

/// Reported payment channel. Manual gateways require a receipt photo
/// before the record becomes reviewable; digital gateways are already
/// confirmed on the payer's side and go straight to review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Gateway {
    Manual,
    Digital,
}

impl Gateway {
    /// Map the mini-app's gateway tag onto a recognized channel.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual" | "bank" | "cash" => Some(Gateway::Manual),
            "digital" | "telebirr" | "cbebirr" | "chapa" => Some(Gateway::Digital),
            _ => None,
        }
    }

    pub fn requires_receipt(self) -> bool {
        matches!(self, Gateway::Manual)
    }
}

/// Everything the mini-app may send. Unknown `type` tags fall into
/// [`WebAppPayload::Unknown`] instead of failing deserialization, so a
/// newer form version never crashes an older bot.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum WebAppPayload {
    #[serde(rename = "payment_report")]
    PaymentReport(PaymentReport),
    #[serde(other)]
    Unknown,
}

impl WebAppPayload {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Raw `payment_report` payload, field names matching the form.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentReport {
    pub gateway: String,
    pub purpose: String,
    #[serde(default)]
    pub period: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub penalty: Option<f64>,
    #[serde(default, rename = "totalAmount")]
    pub total_amount: Option<f64>,
    #[serde(default, rename = "payFor")]
    pub pay_for: Option<String>,
    #[serde(default)]
    pub guarantors: Option<Vec<String>>,
    #[serde(default)]
    pub tx_ref: Option<String>,
}

/// A report that passed validation. Only this type crosses into the
/// intake and storage layers.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReport {
    pub gateway: Gateway,
    pub purpose: String,
    pub period: Option<String>,
    pub amount: f64,
    pub penalty: f64,
    pub total_amount: f64,
    pub pay_for: Option<String>,
    pub guarantors: Vec<String>,
    pub tx_ref: String,
}

/// Tolerance for reported totals; the form computes them in floating
/// point client-side.
const AMOUNT_EPSILON: f64 = 0.005;

impl PaymentReport {
    /// Validate and normalize the raw report.
    ///
    /// Rejects unrecognized gateways, empty purposes, non-positive or
    /// non-finite amounts, and totals inconsistent with
    /// `amount + penalty`. A missing `tx_ref` gets a generated one.
    pub fn validate(self) -> Result<ValidatedReport, String> {
        let gateway = Gateway::parse(&self.gateway).ok_or_else(|| format!("Unrecognized gateway: {}", self.gateway))?;

        let purpose = self.purpose.trim().to_string();
        if purpose.is_empty() {
            return Err("Purpose must not be empty".to_string());
        }

        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(format!("Invalid amount: {}", self.amount));
        }

        let penalty = self.penalty.unwrap_or(0.0);
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(format!("Invalid penalty: {penalty}"));
        }

        let computed_total = self.amount + penalty;
        let total_amount = match self.total_amount {
            Some(total) if (total - computed_total).abs() > AMOUNT_EPSILON => {
                return Err(format!(
                    "Total {total} does not match amount {} + penalty {penalty}",
                    self.amount
                ));
            }
            Some(total) => total,
            None => computed_total,
        };

        let tx_ref = self
            .tx_ref
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(generate_tx_ref);

        Ok(ValidatedReport {
            gateway,
            purpose,
            period: self.period.filter(|p| !p.trim().is_empty()),
            amount: self.amount,
            penalty,
            total_amount,
            pay_for: self.pay_for.filter(|p| !p.trim().is_empty()),
            guarantors: self.guarantors.unwrap_or_default(),
            tx_ref,
        })
    }
}

/// Generate a short human-facing transaction reference (`#EUDE7412`).
/// Shown in chats and reports; the durable key stays the row id.
pub fn generate_tx_ref() -> String {
    let n: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("#EUDE{n}")
}
