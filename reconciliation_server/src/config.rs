use std::{env, fmt::Display, net::IpAddr, str::FromStr, time::Duration};

use log::*;
use rec_common::{
    helpers::{non_blank, parse_boolean_flag},
    CurrencyCode,
    Secret,
};
use reconciliation_engine::{AmountUnitPolicy, ReconcilerConfig};

const DEFAULT_RPS_HOST: &str = "127.0.0.1";
const DEFAULT_RPS_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/reconciliation.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_SIGNATURE_HEADER: &str = "X-Webhook-Signature";
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub webhook: WebhookConfig,
    /// The bearer key for the ledger read API. When it is not set, the read API refuses every request.
    pub api_key: Option<Secret<String>>,
    /// Buffer size of each notification hook channel
    pub event_buffer_size: usize,
    pub reconciler: ReconcilerConfig,
}

/// How inbound processor deliveries are authenticated.
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
    /// The header that carries the payload signature
    pub signature_header: String,
    /// If supplied, webhook calls are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            hmac_secret: Secret::default(),
            hmac_checks: true,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            whitelist: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPS_HOST.to_string(),
            port: DEFAULT_RPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            use_x_forwarded_for: false,
            use_forwarded: false,
            webhook: WebhookConfig::default(),
            api_key: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RPS_HOST").ok().unwrap_or_else(|| DEFAULT_RPS_HOST.into());
        let port = parse_env("RPS_PORT", DEFAULT_RPS_PORT);
        let database_url = env::var("RPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ RPS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.into()
        });
        let max_connections = parse_env("RPS_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let use_x_forwarded_for = parse_boolean_flag(env::var("RPS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("RPS_USE_FORWARDED").ok(), false);
        let api_key =
            env::var("RPS_API_KEY").ok().as_deref().and_then(non_blank).map(|key| Secret::new(key.to_string()));
        if api_key.is_none() {
            info!("🪛️ RPS_API_KEY is not set. The ledger read API is disabled.");
        }
        let event_buffer_size = parse_env("RPS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        Self {
            host,
            port,
            database_url,
            max_connections,
            use_x_forwarded_for,
            use_forwarded,
            webhook: WebhookConfig::from_env_or_default(),
            api_key,
            event_buffer_size,
            reconciler: reconciler_config_from_env(),
        }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_checks = parse_boolean_flag(env::var("RPS_WEBHOOK_HMAC_CHECKS").ok(), true);
        let hmac_secret = env::var("RPS_WEBHOOK_HMAC_SECRET").ok().unwrap_or_default();
        match (hmac_checks, hmac_secret.is_empty()) {
            (true, true) => error!(
                "🚨️ RPS_WEBHOOK_HMAC_SECRET is not set, but signature checks are enabled. Every webhook call will be \
                 rejected until the secret is configured."
            ),
            (false, _) => warn!(
                "🚨️ Webhook signature checks are disabled. Anyone who can reach the webhook endpoint can move \
                 payments in the ledger."
            ),
            (true, false) => debug!("🪛️ Webhook signature checks are enabled"),
        }
        let signature_header =
            env::var("RPS_WEBHOOK_SIGNATURE_HEADER").ok().unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.into());
        let whitelist = env::var("RPS_WEBHOOK_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't \
                     accept any webhook calls."
                );
            },
            None => {
                info!("🪛️ No webhook IP whitelist is set. Only signature validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Webhook IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks, signature_header, whitelist }
    }
}

fn reconciler_config_from_env() -> ReconcilerConfig {
    let mut config = ReconcilerConfig::default();
    if let Some(gateway) = env::var("RPS_GATEWAY").ok().as_deref().and_then(non_blank) {
        config = config.with_gateway(gateway);
    }
    if let Ok(code) = env::var("RPS_DEFAULT_CURRENCY") {
        match CurrencyCode::from_str(&code) {
            Ok(currency) => config = config.with_default_currency(currency),
            Err(e) => warn!("🪛️ Invalid value for RPS_DEFAULT_CURRENCY. {e}. Using {}.", config.default_currency),
        }
    }
    let policy = env::var("RPS_AMOUNT_UNIT_POLICY")
        .map_err(|_| debug!("🪛️ RPS_AMOUNT_UNIT_POLICY is not set. Using the heuristic policy."))
        .and_then(|s| {
            AmountUnitPolicy::from_str(&s)
                .map_err(|e| warn!("🪛️ Invalid configuration value for RPS_AMOUNT_UNIT_POLICY. {e}"))
        })
        .unwrap_or_default();
    let policy = match policy {
        AmountUnitPolicy::Heuristic { threshold } => {
            let threshold = env::var("RPS_MINOR_UNIT_THRESHOLD")
                .ok()
                .and_then(|s| {
                    s.parse::<i64>()
                        .map_err(|e| warn!("🪛️ Invalid configuration value for RPS_MINOR_UNIT_THRESHOLD. {e}"))
                        .ok()
                })
                .map(|t| t.into())
                .unwrap_or(threshold);
            AmountUnitPolicy::Heuristic { threshold }
        },
        other => other,
    };
    info!("🪛️ Amount unit policy: {policy}");
    config = config.with_amount_policy(policy);
    if let Some(ms) = env::var("RPS_LEDGER_TIMEOUT_MS").ok().and_then(|s| parse_millis("RPS_LEDGER_TIMEOUT_MS", &s)) {
        config = config.with_ledger_timeout(ms);
    }
    if let Some(ms) = env::var("RPS_AUDIT_TIMEOUT_MS").ok().and_then(|s| parse_millis("RPS_AUDIT_TIMEOUT_MS", &s)) {
        config = config.with_audit_timeout(ms);
    }
    config
}

/// Parses a comma-separated list of IP addresses. "none", "false" and "0" disable the whitelist. Invalid entries are
/// skipped.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Webhook IP whitelist is disabled. If this is not what you want, set RPS_WEBHOOK_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in RPS_WEBHOOK_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect();
    Some(ip_addrs)
}

fn parse_millis(name: &str, s: &str) -> Option<Duration> {
    match s.trim().parse::<u64>() {
        Ok(0) => {
            warn!("🪛️ {name} must be greater than zero. Using the default.");
            None
        },
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {name}. {e}. Using the default.");
            None
        },
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
