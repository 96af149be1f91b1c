//! M-Pesa STK push models.
//!
//! This module defines:
//! - `MpesaTransaction`: database entity tracking one STK push
//! - `StkCallbackEnvelope`: the callback body posted by the provider
//! - `CallbackOutcome`: the parsed result of a callback
//! - `MpesaAck`: the fixed acknowledgment returned to the provider
//!
//! # Callback Shape
//!
//! ```json
//! {
//!   "Body": {
//!     "stkCallback": {
//!       "MerchantRequestID": "29115-34620561-1",
//!       "CheckoutRequestID": "ws_CO_191220191020363925",
//!       "ResultCode": 0,
//!       "ResultDesc": "The service request is processed successfully.",
//!       "CallbackMetadata": {
//!         "Item": [
//!           { "Name": "Amount", "Value": 1.00 },
//!           { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
//!           { "Name": "Balance" },
//!           { "Name": "TransactionDate", "Value": 20191219102115 },
//!           { "Name": "PhoneNumber", "Value": 254708374149 }
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Failed or cancelled pushes carry a non-zero `ResultCode` and no
//! `CallbackMetadata`.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// `TransactionDate` values are East Africa Time.
const EAT_OFFSET_SECONDS: i32 = 3 * 3600;

/// Represents an M-Pesa transaction record from the database.
///
/// Created as `pending` when the SPA initiates an STK push, then moved to
/// `completed` or `failed` by the callback.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct MpesaTransaction {
    pub id: Uuid,
    pub loan_id: Option<Uuid>,
    pub phone_number: String,
    pub amount_cents: i64,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: String,
    pub status: String,
    pub result_code: Option<i32>,
    pub result_desc: Option<String>,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/mpesa/transactions`.
#[derive(Debug, Deserialize)]
pub struct CreateMpesaTransactionRequest {
    pub loan_id: Option<Uuid>,
    pub phone_number: String,
    pub amount_cents: i64,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: String,
}

impl CreateMpesaTransactionRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount_cents <= 0 {
            return Err("Amount must be positive".to_string());
        }
        if self.phone_number.trim().is_empty() {
            return Err("phone_number is required".to_string());
        }
        if self.checkout_request_id.trim().is_empty() {
            return Err("checkout_request_id is required".to_string());
        }
        Ok(())
    }
}

/// Outer wrapper of the STK callback.
#[derive(Debug, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,

    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,

    #[serde(rename = "ResultCode", deserialize_with = "int_or_string")]
    pub result_code: i64,

    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,

    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,

    /// Absent for informational items such as `Balance`
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

/// Details of a successful STK push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPayment {
    pub amount_cents: i64,
    pub receipt_number: String,
    pub phone_number: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Parsed result of an STK callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Completed(CompletedPayment),
    Failed {
        result_code: i64,
        result_desc: Option<String>,
    },
}

impl StkCallback {
    /// Value of the metadata item called `name`, if present.
    pub fn item(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
            .and_then(|item| item.value.as_ref())
    }

    /// Interpret the callback.
    ///
    /// A zero result code must carry both `Amount` and
    /// `MpesaReceiptNumber`; otherwise the callback is rejected as
    /// malformed.
    /// Outcome to store. A success report that cannot be settled (no
    /// amount or receipt) is stored as failed with the reason appended.
    pub fn settlement(&self) -> CallbackOutcome {
        self.outcome().unwrap_or_else(|reason| CallbackOutcome::Failed {
            result_code: self.result_code,
            result_desc: Some(match &self.result_desc {
                Some(desc) => format!("{desc} ({reason})"),
                None => reason,
            }),
        })
    }

    pub fn outcome(&self) -> Result<CallbackOutcome, String> {
        if self.result_code != 0 {
            return Ok(CallbackOutcome::Failed {
                result_code: self.result_code,
                result_desc: self.result_desc.clone(),
            });
        }

        let amount_cents = self
            .item("Amount")
            .and_then(amount_to_cents)
            .ok_or_else(|| "Callback is missing a usable Amount".to_string())?;

        let receipt_number = self
            .item("MpesaReceiptNumber")
            .and_then(value_to_string)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| "Callback is missing MpesaReceiptNumber".to_string())?;

        let phone_number = self.item("PhoneNumber").and_then(value_to_string);

        let transaction_date = self
            .item("TransactionDate")
            .and_then(value_to_string)
            .and_then(|raw| parse_transaction_date(&raw));

        Ok(CallbackOutcome::Completed(CompletedPayment {
            amount_cents,
            receipt_number,
            phone_number,
            transaction_date,
        }))
    }
}

/// Fixed acknowledgment returned for every callback.
///
/// Anything else makes the provider retry the delivery.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MpesaAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,

    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl MpesaAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

/// Convert a shilling amount (number or numeric string) to cents.
fn amount_to_cents(value: &Value) -> Option<i64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }

    Some((amount * 100.0).round() as i64)
}

/// Render a string or integer item as text.
///
/// Phone numbers and dates arrive as JSON numbers.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => n
            .as_u64()
            .map(|v| v.to_string())
            .or_else(|| n.as_i64().map(|v| v.to_string()))
            .or_else(|| n.as_f64().map(|v| format!("{:.0}", v))),
        _ => None,
    }
}

/// Parse `YYYYMMDDhhmmss` in East Africa Time into UTC.
pub fn parse_transaction_date(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S").ok()?;
    let eat = FixedOffset::east_opt(EAT_OFFSET_SECONDS)?;

    eat.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("ResultCode must be an integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom("ResultCode must be an integer")),
        _ => Err(serde::de::Error::custom("ResultCode must be an integer")),
    }
}
