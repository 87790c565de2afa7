/// Ordered alias lists, one per extracted field. The first alias that resolves to a non-empty value wins.
///
/// Aliases are dotted paths into the payload, so `customer.email` reads `{"customer": {"email": ...}}`. Root-level
/// names come first in every default list, and processor envelope paths (`data.object.*`) follow at lower priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    pub transaction_id: &'static [&'static str],
    pub reference: &'static [&'static str],
    pub amount: &'static [&'static str],
    pub amount_unit: &'static [&'static str],
    pub currency: &'static [&'static str],
    pub charge_id: &'static [&'static str],
    pub refund_id: &'static [&'static str],
    pub refund_amount: &'static [&'static str],
    pub failure_reason: &'static [&'static str],
    pub failure_code: &'static [&'static str],
    pub customer_name: &'static [&'static str],
    pub customer_email: &'static [&'static str],
    pub description: &'static [&'static str],
    pub metadata: &'static [&'static str],
}

pub const DEFAULT_ALIASES: FieldAliases = FieldAliases {
    transaction_id: &["payment_id", "id", "transaction_id", "reference", "data.payment_id", "data.id", "data.object.id"],
    reference: &[
        "reference",
        "merchant_reference",
        "order_reference",
        "client_reference_id",
        "metadata.reference",
        "metadata.order_id",
        "data.reference",
        "data.object.metadata.reference",
    ],
    amount: &["amount", "amount_total", "total", "total_amount", "data.amount", "data.object.amount"],
    amount_unit: &["amount_unit", "amount_format", "data.amount_unit"],
    currency: &["currency", "currency_code", "data.currency", "data.object.currency"],
    charge_id: &["charge_id", "latest_charge", "charge", "data.object.latest_charge"],
    refund_id: &["refund_id", "refund.id", "data.object.refund_id"],
    refund_amount: &["refund_amount", "amount_refunded", "refund.amount", "data.object.amount_refunded"],
    failure_reason: &[
        "failure_reason",
        "failure_message",
        "error_message",
        "error.message",
        "last_payment_error.message",
    ],
    failure_code: &["failure_code", "error_code", "decline_code", "error.code", "last_payment_error.code"],
    customer_name: &[
        "customer_name",
        "client_name",
        "name",
        "customer.name",
        "billing_details.name",
        "metadata.customer_name",
    ],
    customer_email: &[
        "customer_email",
        "client_email",
        "email",
        "receipt_email",
        "customer.email",
        "billing_details.email",
        "metadata.customer_email",
    ],
    description: &["description", "statement_descriptor", "metadata.description"],
    metadata: &["metadata", "data.object.metadata"],
};

impl Default for FieldAliases {
    fn default() -> Self {
        DEFAULT_ALIASES
    }
}

/// The fields the classifier reads, in the order it reads them.
pub const STATUS_FIELDS: [&str; 4] = ["event_type", "type", "event", "status"];
