//! Shared data model for warden.
//!
//! The OAuth callback core produces [`Account`] records; persistence adapters
//! implementing [`Adapter`] store them together with users, sessions and
//! verification tokens.

pub mod adapter;
pub mod types;

pub use {
    adapter::{Adapter, AdapterError, AdapterResult},
    types::{Account, NewUser, ProviderType, Session, TokenSet, User, VerificationToken},
};
