//! Lifecycle driver for the issue and pull request lifecycle manager.
//!
//! Sequences calls between the decision engine in the [`lifecycle`] crate and
//! the infrastructure behind its port traits: enumerate issues, resolve
//! member-activity signals, evaluate, apply.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The driver contains no lifecycle rules of its own;
//! every decision comes from [`lifecycle::evaluate`].
//!
//! ## Failure model
//!
//! A failed lookup or mutation abandons that issue only. A repository whose
//! issues cannot be listed is abandoned while the others carry on. Nothing is
//! retried; the next sweep re-derives whatever was left undone.

pub mod driver;
pub mod executor;
pub mod observer;

pub use driver::{
    Collaborators, LifecycleManager, ManagerConfig, RepositoryReport, SweepError, SweepReport,
};
pub use executor::ActionExecutor;
pub use observer::{SweepObserver, TracingObserver};
