//! Core domain primitives shared across the showbooks crates.
//!
//! This crate provides the vocabulary every other layer speaks: the composite
//! natural keys that identify purchase orders, detail items, and ledger bills,
//! the zero-padded reference numbers derived from them, money arithmetic for
//! the subtotal rollups, and the opaque identifier type assigned by external
//! services.

pub mod ids;
pub mod keys;
pub mod money;

pub use ids::ExternalId;
pub use keys::{BillKey, DetailKey, PoKey, ReferenceError};
pub use money::{round_money, subtotal_of, MONEY_SCALE};
