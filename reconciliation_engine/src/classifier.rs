//! Maps the raw status/type strings of an event onto a [`LifecycleIntent`].
//!
//! The first non-empty field out of `event_type`, `type`, `event` and `status` is the classification input. It is
//! matched, case-insensitively, against one synonym set per intent. Anything that matches none of the sets is
//! `Unknown`, and the raw input is kept so that the synonym tables can be extended later.
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::{db_types::ConversionError, extractor::StatusFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum LifecycleIntent {
    Created,
    Succeeded,
    Failed,
    Refunded,
    Unknown,
}

impl Display for LifecycleIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleIntent::Created => write!(f, "Created"),
            LifecycleIntent::Succeeded => write!(f, "Succeeded"),
            LifecycleIntent::Failed => write!(f, "Failed"),
            LifecycleIntent::Refunded => write!(f, "Refunded"),
            LifecycleIntent::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for LifecycleIntent {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Succeeded" => Ok(Self::Succeeded),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            "Unknown" => Ok(Self::Unknown),
            s => Err(ConversionError(format!("lifecycle intent: {s}"))),
        }
    }
}

const CREATED_SYNONYMS: &[&str] = &[
    "payment.created",
    "payment_intent.created",
    "payment.pending",
    "charge.pending",
    "created",
    "pending",
    "initiated",
    "processing",
];

const SUCCEEDED_SYNONYMS: &[&str] = &[
    "payment.succeeded",
    "payment_intent.succeeded",
    "charge.succeeded",
    "payment.completed",
    "payment.paid",
    "payment.captured",
    "succeeded",
    "success",
    "successful",
    "paid",
    "completed",
    "captured",
];

const FAILED_SYNONYMS: &[&str] = &[
    "payment.failed",
    "payment_intent.payment_failed",
    "charge.failed",
    "payment.declined",
    "failed",
    "failure",
    "declined",
];

const REFUNDED_SYNONYMS: &[&str] = &[
    "payment.refunded",
    "charge.refunded",
    "refund.succeeded",
    "refund.completed",
    "refunded",
];

/// Synonym sets in matching order.
pub const SYNONYM_TABLE: [(LifecycleIntent, &[&str]); 4] = [
    (LifecycleIntent::Created, CREATED_SYNONYMS),
    (LifecycleIntent::Succeeded, SUCCEEDED_SYNONYMS),
    (LifecycleIntent::Failed, FAILED_SYNONYMS),
    (LifecycleIntent::Refunded, REFUNDED_SYNONYMS),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: LifecycleIntent,
    /// The payload field the classification input came from
    pub source_field: Option<&'static str>,
    /// The raw classification input, as received
    pub raw: Option<String>,
}

pub fn classify(status: &StatusFields) -> Classification {
    let Some((source_field, raw)) = status.classification_input() else {
        return Classification { intent: LifecycleIntent::Unknown, source_field: None, raw: None };
    };
    let normalized = raw.trim().to_ascii_lowercase();
    let intent = SYNONYM_TABLE
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&normalized.as_str()))
        .map(|(intent, _)| *intent)
        .unwrap_or(LifecycleIntent::Unknown);
    Classification { intent, source_field: Some(source_field), raw: Some(raw.to_string()) }
}
