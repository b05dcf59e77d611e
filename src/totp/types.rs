//! Core types for the live TOTP authenticator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for HMAC-based OTP.
///
/// Deserialisation is lenient: any unrecognised name falls back to SHA-1,
/// so a hand-edited account file keeps producing codes instead of failing
/// to load. Strict validation surfaces use [`std::str::FromStr`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Algorithm {
    /// Parse from a case-insensitive string.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SHA1" | "SHA-1" | "HMACSHA1" | "HMAC-SHA1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" | "HMACSHA256" | "HMAC-SHA256" => Some(Self::Sha256),
            "SHA512" | "SHA-512" | "HMACSHA512" | "HMAC-SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Parse with the documented fallback: any unrecognised name is SHA-1.
    pub fn from_name_lossy(s: &str) -> Self {
        Self::from_str_loose(s).unwrap_or_default()
    }

    /// Canonical uppercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl From<String> for Algorithm {
    fn from(s: String) -> Self {
        Self::from_name_lossy(&s)
    }
}

impl std::str::FromStr for Algorithm {
    type Err = TotpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| {
            TotpError::new(
                TotpErrorKind::UnsupportedAlgorithm,
                format!("unsupported algorithm '{}'", s),
            )
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Account
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default time-step length in seconds.
pub const DEFAULT_TIME_STEP: i64 = 30;

/// A registered authenticator account.
///
/// Code length is fixed at six digits for every account; it is not a
/// stored field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpAccount {
    /// Unique identifier.
    pub id: String,
    /// Account name shown in the list. Unique across the registry.
    pub label: String,
    /// Base-32 encoded secret, as entered (spaces/dashes allowed).
    pub secret: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Hash algorithm; unknown names fall back to SHA-1 on load.
    #[serde(default)]
    pub algorithm: Algorithm,
    /// Time-step length in seconds (RFC 6238 period, typically 30).
    /// Zero or negative values are rejected at refresh time.
    #[serde(default = "default_time_step")]
    pub time_step: i64,
    /// When the account was added.
    pub added_at: DateTime<Utc>,
}

fn default_time_step() -> i64 {
    DEFAULT_TIME_STEP
}

impl TotpAccount {
    /// Create an account with defaults.
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            secret: secret.into(),
            description: None,
            algorithm: Algorithm::default(),
            time_step: DEFAULT_TIME_STEP,
            added_at: Utc::now(),
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Builder: set time-step length in seconds.
    pub fn with_time_step(mut self, time_step: i64) -> Self {
        self.time_step = time_step;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Published reading
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Placeholder code shown while an account cannot be refreshed.
pub const ERROR_CODE: &str = "------";

/// The code + step-progress pair published after every refresh.
///
/// Both fields come from the same instant; readers always see them as
/// one value, never a code from one time step with another step's
/// percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeReading {
    /// Six-digit OTP, or [`ERROR_CODE`] when the last refresh failed.
    pub code: String,
    /// Percentage of the current time step still remaining (0-100).
    pub remaining_percent: f64,
}

impl CodeReading {
    /// Reading published when a refresh fails.
    pub fn error_sentinel() -> Self {
        Self {
            code: ERROR_CODE.to_string(),
            remaining_percent: 0.0,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Refresh configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default milliseconds between refresh ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

/// Refresh cadence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Milliseconds between refresh ticks.
    pub tick_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TotpErrorKind {
    /// Secret contains a character outside the RFC 4648 alphabet, or
    /// decodes to zero bytes.
    InvalidEncoding,
    /// Algorithm name outside the supported set (strict parsing only;
    /// the lenient path falls back to SHA-1 instead).
    UnsupportedAlgorithm,
    /// Account has a zero or negative time step.
    NonPositiveTimeStep,
    /// HMAC construction failed.
    HashComputationFailure,
    /// No account with the requested id.
    AccountNotFound,
    /// Another account already uses the requested label.
    DuplicateAccount,
    /// Reading or writing the account file failed.
    Storage,
    /// Persisted account data could not be parsed.
    Parse,
}

/// Crate-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpError {
    pub kind: TotpErrorKind,
    pub message: String,
}

pub type TotpResult<T> = Result<T, TotpError>;

impl TotpError {
    pub fn new(kind: TotpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn account_not_found(id: &str) -> Self {
        Self::new(
            TotpErrorKind::AccountNotFound,
            format!("account '{}' not found", id),
        )
    }

    pub fn duplicate_account(label: &str) -> Self {
        Self::new(
            TotpErrorKind::DuplicateAccount,
            format!("an account named '{}' already exists", label),
        )
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(TotpErrorKind::Storage, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(TotpErrorKind::Parse, msg)
    }
}

impl fmt::Display for TotpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for TotpError {}

impl From<TotpError> for String {
    fn from(e: TotpError) -> String {
        e.to_string()
    }
}
