use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, info, trace, warn};
use regex::Regex;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(parse_forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

/// Extracts the first `for=` address of a `Forwarded` header. Quoted and bracketed IPv6 forms are accepted.
fn parse_forwarded_for(header: &str) -> Option<IpAddr> {
    let re = Regex::new(r#"(?i)for="?\[?(?P<ip>[0-9a-f.:]+?)\]?(:\d+)?"?(;|,|$)"#).ok()?;
    let caps = re.captures(header)?;
    IpAddr::from_str(caps.name("ip")?.as_str()).ok()
}

/// Checks the peer against the whitelist. With no whitelist configured, every peer is allowed.
pub fn is_whitelisted(peer: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if allowed {
                info!("🔐️ Webhook call from {ip}");
            } else {
                warn!("🔐️ Webhook call from {ip}, which is not in the whitelist. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("🔐️ No IP address found in webhook request. Denying access.");
            false
        },
    }
}

/// Calculates the hex-encoded HMAC-SHA256 of `data`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(data);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Decodes a signature header value. Processors send either hex or base64, sometimes prefixed with `sha256=`.
pub fn decode_signature(value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    let value = match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("sha256=") => &value[7..],
        _ => value,
    };
    let is_hex = value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit());
    if is_hex {
        hex::decode(value).ok()
    } else {
        base64::decode(value).ok()
    }
}

/// Checks `signature` against the HMAC-SHA256 of `data`. The comparison is constant-time.
pub fn verify_signature(secret: &str, data: &[u8], signature: &str) -> bool {
    let Some(expected) = decode_signature(signature) else {
        debug!("🔐️ The signature is neither hex nor base64");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

/// Compares two strings without short-circuiting on the first difference.
pub fn constant_time_eq(left: &str, right: &str) -> bool {
    let (left, right) = (left.as_bytes(), right.as_bytes());
    if left.len() != right.len() {
        return false;
    }
    left.iter().zip(right).fold(0u8, |diff, (a, b)| diff | (a ^ b)) == 0
}
