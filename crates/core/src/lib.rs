//! `tilawa-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod scripture;
pub mod status;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RecitationId, UserId};
pub use scripture::{SurahNumber, VerseRange};
pub use status::RecitationStatus;
