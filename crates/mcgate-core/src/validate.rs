//! Nickname and IP address validation
//!
//! Each check runs in a fixed order and stops at the first failure, so a
//! value is always rejected for the most basic reason that applies:
//!
//! - nickname: trim, lowercase, `Empty`, `LengthOutOfRange`, `InvalidCharacters`, `NicknameTaken`
//! - IP: trim, `Empty`, `IpTaken`, `MalformedIp`, `ReservedAddress`, IPv6 segment count
//!
//! The syntax halves ([`canonical_nickname`], [`check_ip_syntax`]) are pure.
//! The full checks additionally consult the [`AccountStore`] for uniqueness.
//! Uniqueness is checked again by the store itself at commit time.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{ConflictError, Field, Result, ValidationError};
use crate::traits::AccountStore;

/// Shortest accepted nickname
pub const NICKNAME_MIN_LEN: usize = 3;

/// Longest accepted nickname
pub const NICKNAME_MAX_LEN: usize = 16;

/// Trim and lowercase a nickname, then check its length and alphabet
pub fn canonical_nickname(raw: &str) -> std::result::Result<String, ValidationError> {
    let nickname = raw.trim().to_lowercase();
    if nickname.is_empty() {
        return Err(ValidationError::Empty(Field::Nickname));
    }

    let len = nickname.chars().count();
    if !(NICKNAME_MIN_LEN..=NICKNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::LengthOutOfRange {
            min: NICKNAME_MIN_LEN,
            max: NICKNAME_MAX_LEN,
            actual: len,
        });
    }

    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_';
    if !nickname.chars().all(allowed) {
        return Err(ValidationError::InvalidCharacters);
    }

    Ok(nickname)
}

/// Validate a submitted nickname, including uniqueness
///
/// # Returns
///
/// The canonical lowercase nickname.
pub async fn validate_nickname(store: &dyn AccountStore, raw: &str) -> Result<String> {
    let nickname = canonical_nickname(raw)?;
    if store.nickname_holder(&nickname).await?.is_some() {
        return Err(ConflictError::NicknameTaken(nickname).into());
    }
    Ok(nickname)
}

/// Parse a trimmed IP string and apply the address policy
///
/// Does not check emptiness or uniqueness.
pub fn check_ip_syntax(ip: &str) -> std::result::Result<IpAddr, ValidationError> {
    let addr: IpAddr = ip
        .parse()
        .map_err(|_| ValidationError::MalformedIp(ip.to_string()))?;

    if is_special_purpose(&addr) {
        return Err(ValidationError::ReservedAddress(ip.to_string()));
    }

    if addr.is_ipv6() && ip.split(':').count() < 3 {
        return Err(ValidationError::MalformedIp(ip.to_string()));
    }

    Ok(addr)
}

/// Validate a submitted IP address, including uniqueness
///
/// # Returns
///
/// The trimmed textual address, exactly as it will be stored.
pub async fn validate_ip(store: &dyn AccountStore, raw: &str) -> Result<String> {
    let ip = raw.trim();
    if ip.is_empty() {
        return Err(ValidationError::Empty(Field::Ip).into());
    }

    if store.ip_holder(ip).await?.is_some() {
        return Err(ConflictError::IpTaken(ip.to_string()).into());
    }

    check_ip_syntax(ip)?;
    Ok(ip.to_string())
}

/// Loopback, link-local, multicast or reserved
pub fn is_special_purpose(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_special_v4(v4),
        IpAddr::V6(v6) => is_special_v6(v6),
    }
}

fn is_special_v4(addr: &Ipv4Addr) -> bool {
    // 240.0.0.0/4, broadcast included
    let reserved = addr.octets()[0] >= 240;
    addr.is_loopback() || addr.is_link_local() || addr.is_multicast() || reserved
}

fn is_special_v6(addr: &Ipv6Addr) -> bool {
    let first = addr.segments()[0];
    let link_local = first & 0xffc0 == 0xfe80;
    // Anything outside global unicast, ULA, link-local, site-local and multicast.
    // Covers ::/8, so the unspecified and IPv4-mapped forms land here too.
    let reserved = !(first & 0xe000 == 0x2000
        || first & 0xfe00 == 0xfc00
        || first & 0xffc0 == 0xfe80
        || first & 0xffc0 == 0xfec0
        || first & 0xff00 == 0xff00);
    addr.is_loopback() || link_local || addr.is_multicast() || reserved
}
