use std::time::Duration;

use rec_common::CurrencyCode;

use crate::{amount::AmountUnitPolicy, db_types::GatewayId, extractor::FieldAliases};

pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_AUDIT_TIMEOUT: Duration = Duration::from_millis(2000);
/// One initial attempt, plus one retry after a stale write.
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;

/// Tunables for the [`crate::ReconciliationApi`].
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Stamped on every record this engine creates
    pub gateway: GatewayId,
    /// Used when an event carries no currency, or an invalid one
    pub default_currency: CurrencyCode,
    pub amount_policy: AmountUnitPolicy,
    pub aliases: FieldAliases,
    /// Bound on each individual ledger read or write
    pub ledger_timeout: Duration,
    pub audit_timeout: Duration,
    pub max_attempts: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayId::default(),
            default_currency: CurrencyCode::default(),
            amount_policy: AmountUnitPolicy::default(),
            aliases: FieldAliases::default(),
            ledger_timeout: DEFAULT_LEDGER_TIMEOUT,
            audit_timeout: DEFAULT_AUDIT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_gateway<G: Into<GatewayId>>(mut self, gateway: G) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn with_default_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = currency;
        self
    }

    pub fn with_amount_policy(mut self, policy: AmountUnitPolicy) -> Self {
        self.amount_policy = policy;
        self
    }

    pub fn with_aliases(mut self, aliases: FieldAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_ledger_timeout(mut self, timeout: Duration) -> Self {
        self.ledger_timeout = timeout;
        self
    }

    pub fn with_audit_timeout(mut self, timeout: Duration) -> Self {
        self.audit_timeout = timeout;
        self
    }
}
