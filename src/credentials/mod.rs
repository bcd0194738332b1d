//! Credential records of both tiers and the identity claim decoding
//! needed to derive location tokens.

pub mod claims;
pub mod record;

pub use record::{
    parse_scope_set, CompanyCredential, CredentialRecord, Expiring, LocationCredential,
};
