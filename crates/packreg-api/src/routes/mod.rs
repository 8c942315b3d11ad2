//! # API Route Modules
//!
//! - `packs` — pack registration, metadata and lifecycle transitions.
//! - `versions` — publishing, version listing and tier-gated downloads.
//! - `license` — license key publication and server-side verification.
//! - `account` — the caller's subject and tier.

pub mod account;
pub mod license;
pub mod packs;
pub mod versions;
