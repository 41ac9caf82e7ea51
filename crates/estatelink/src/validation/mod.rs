//! Validation lifecycle: reminder and expiry sweeps, token confirmation,
//! owner reactivation, and the scheduler driving the recurring jobs.

mod lifecycle;
pub mod router;
mod scheduler;

pub use lifecycle::{ValidationError, ValidationLifecycle};
pub use router::{validation_router, ValidationRouterState};
pub use scheduler::SweepScheduler;
