//! # bwo – Bitwarden organization management
//!
//! Clients for the two Bitwarden HTTP surfaces an organization admin needs:
//!
//! - **Public API** – groups, members and collections behind an OAuth2
//!   client-credentials bearer token
//! - **Vault Management API** – the unauthenticated `bw serve` endpoints for
//!   organization collections, member confirmation and lock/unlock/sync
//! - **Token cache** – bearer tokens persisted per client id in SQLite and
//!   reused until they expire

pub mod bitwarden;
