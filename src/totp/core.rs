//! HOTP / TOTP generation per RFC 4226 and RFC 6238.
//!
//! Codes are always six digits. Every time-dependent operation has an
//! `_at` variant taking an explicit unix timestamp so behaviour can be
//! pinned in tests; the plain variants read the system clock.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::totp::base32;
use crate::totp::types::{Algorithm, CodeReading, TotpAccount, TotpError, TotpErrorKind, TotpResult};

/// Number of digits in every generated code.
pub const CODE_DIGITS: usize = 6;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HOTP (RFC 4226)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate an HOTP code for a raw key and counter value.
pub fn hotp(key: &[u8], counter: u64, algorithm: Algorithm) -> TotpResult<String> {
    if key.is_empty() {
        return Err(TotpError::new(
            TotpErrorKind::InvalidEncoding,
            "secret decodes to zero bytes",
        ));
    }
    let digest = compute_hmac(key, &counter.to_be_bytes(), algorithm)?;
    Ok(truncate(&digest))
}

fn compute_hmac(key: &[u8], data: &[u8], algorithm: Algorithm) -> TotpResult<Vec<u8>> {
    match algorithm {
        Algorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(hash_failure)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(hash_failure)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(hash_failure)?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }
    }
}

fn hash_failure(e: hmac::digest::InvalidLength) -> TotpError {
    TotpError::new(TotpErrorKind::HashComputationFailure, e.to_string())
}

/// RFC 4226 dynamic truncation: take 31 bits at the offset named by the
/// digest's low nibble, reduce modulo 10^6, left-pad with zeros.
fn truncate(digest: &[u8]) -> String {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);
    let code = binary % 10u32.pow(CODE_DIGITS as u32);
    format!("{:0>width$}", code, width = CODE_DIGITS)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP (RFC 6238)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counter value for a timestamp: how many whole time steps have
/// elapsed since the unix epoch.
pub fn time_step_counter(unix_seconds: i64, time_step: i64) -> i64 {
    unix_seconds.div_euclid(time_step)
}

/// Generate a TOTP code for an explicit timestamp.
pub fn totp_at(
    key: &[u8],
    algorithm: Algorithm,
    time_step: i64,
    unix_seconds: i64,
) -> TotpResult<String> {
    if time_step <= 0 {
        return Err(TotpError::new(
            TotpErrorKind::NonPositiveTimeStep,
            format!("time step must be positive, got {}", time_step),
        ));
    }
    let counter = time_step_counter(unix_seconds, time_step);
    hotp(key, counter as u64, algorithm)
}

/// Generate a TOTP code for the current system time.
pub fn totp(key: &[u8], algorithm: Algorithm, time_step: i64) -> TotpResult<String> {
    totp_at(key, algorithm, time_step, current_unix_time())
}

/// Percentage of the current time step still remaining at a timestamp.
///
/// Returns exactly 100.0 at the first second of a step and decreases
/// from there; never negative. A non-positive step yields 0.0.
pub fn remaining_percent_at(time_step: i64, unix_seconds: i64) -> f64 {
    if time_step <= 0 {
        return 0.0;
    }
    let step_start = unix_seconds.div_euclid(time_step) * time_step;
    let remaining = (step_start + time_step - unix_seconds).max(0);
    (remaining as f64 / time_step as f64 * 100.0).max(0.0)
}

/// Percentage of the current time step still remaining right now.
pub fn remaining_percent(time_step: i64) -> f64 {
    remaining_percent_at(time_step, current_unix_time())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Account readings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an account's reading for an explicit timestamp.
///
/// Code and percentage come from the same instant, so the pair is
/// internally consistent.
pub fn reading_at(account: &TotpAccount, unix_seconds: i64) -> TotpResult<CodeReading> {
    if account.time_step <= 0 {
        return Err(TotpError::new(
            TotpErrorKind::NonPositiveTimeStep,
            format!(
                "account '{}' has non-positive time step {}",
                account.label, account.time_step
            ),
        ));
    }
    let key = base32::decode(&account.secret)?;
    let code = totp_at(&key, account.algorithm, account.time_step, unix_seconds)?;
    Ok(CodeReading {
        code,
        remaining_percent: remaining_percent_at(account.time_step, unix_seconds),
    })
}

/// Compute an account's reading for the current system time.
pub fn reading(account: &TotpAccount) -> TotpResult<CodeReading> {
    reading_at(account, current_unix_time())
}

/// Current unix time in whole seconds.
pub fn current_unix_time() -> i64 {
    chrono::Utc::now().timestamp()
}
