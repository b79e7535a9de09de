//! Domain workflows of the campus platform.
//!
//! Everything here runs against a SeaORM connection and is independent of the
//! HTTP layer: seat reservation for enrollments, attendance bookkeeping and
//! statistics, the course lifecycle and payment reconciliation. Side effects
//! leaving the process go through the [`notify::Notifier`] and
//! [`payment::PaymentGateway`] traits.

pub mod attendance;
pub mod enrollment;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod payment;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ComputeError, Result};
