//! Data carried through a transfer.
//!
//! Everything here is created per request and dropped once the outcome has
//! been reported; nothing is persisted.

pub mod access;
pub mod credentials;
pub mod envelope;
pub mod key;
pub mod notification;
pub mod outcome;
pub mod request;
