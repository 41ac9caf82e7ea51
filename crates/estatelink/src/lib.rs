//! Core of the EstateLink property marketplace: compatibility scoring,
//! match finding, the validation lifecycle that keeps listings and
//! requirements fresh, and the notification fan-out connecting them.
//!
//! Storage, user lookup, localization, and mail are collaborator traits
//! (see [`store`] and [`notify`]); this crate owns the policy, not the I/O.

pub mod batch;
pub mod config;
pub mod domain;
pub mod matching;
pub mod notify;
pub mod store;
pub mod telemetry;
pub mod validation;
