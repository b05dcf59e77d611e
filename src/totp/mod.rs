//! Live TOTP authenticator core: sub-modules.
//!
//! - `types`   - accounts, readings, config, error type
//! - `base32`  - RFC 4648 secret codec
//! - `core`    - HOTP/TOTP arithmetic (RFC 4226 / 6238)
//! - `refresh` - per-account background refresh tasks
//! - `storage` - account persistence (JSON file / in-memory)
//! - `service` - consumer-facing facade

pub mod base32;
pub mod core;
pub mod refresh;
pub mod service;
pub mod storage;
pub mod types;

// Re-export top-level items for convenience.
pub use refresh::{AccountHandle, RefreshScheduler};
pub use service::{AuthenticatorService, AuthenticatorState, ServiceStats};
pub use storage::{AccountStore, JsonFileStore, MemoryStore};
pub use types::*;
