//! # otpdeck - Live TOTP Authenticator Core
//!
//! Keeps a set of user-registered authenticator accounts and their
//! six-digit codes continuously fresh:
//!
//! - **RFC 4226 / 6238** - HOTP and TOTP generation with SHA-1, SHA-256
//!   and SHA-512
//! - **Strict base-32** - RFC 4648 secret decoding that rejects mistyped
//!   input instead of producing codes that never match
//! - **Background refresh** - one 500 ms task per account, publishing
//!   code and time-step progress as one value, with per-account failure
//!   containment
//! - **Persistence** - pretty-printed JSON account store behind a
//!   pluggable interface

pub mod totp;
