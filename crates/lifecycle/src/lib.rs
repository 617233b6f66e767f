//! Core domain for the issue and pull request lifecycle manager.
//!
//! This crate contains every domain concept, newtype identifier, policy record
//! and error type used by the lifecycle manager, along with the decision engine
//! itself. Infrastructure crates implement the traits defined in [`ports`];
//! they never add lifecycle rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryId`, `IssueRef`, `IssueNumber`, etc.) |
//! | [`types`] | Value types (`Timestamp`, `Delay`, `Pipeline`, `IssueSnapshot`, etc.) |
//! | [`policy`] | Per-repository policy records and the registry that resolves them |
//! | [`engine`] | The pure decision function [`evaluate`] |
//! | [`actions`] | The engine's output: [`Action`], [`Decision`], [`LifecycleStats`] |
//! | [`ports`] | Traits implemented by infrastructure crates |
//! | [`errors`] | Error taxonomy and retry-policy types |

pub mod actions;
pub mod engine;
pub mod errors;
pub mod identifiers;
pub mod policy;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use actions::{Action, CommentKind, Decision, Disposition, LifecycleStats, BOT_SIGNATURE};
pub use engine::evaluate;
pub use errors::{
    CollaboratorError, DelayParseError, IdentifierError, LifecycleError, PolicyError, RetryPolicy,
};
pub use identifiers::{CommentId, IssueNumber, IssueRef, OrgLogin, RepoName, RepositoryId, SweepId};
pub use policy::{PolicyOverride, PolicyRecord, PolicyRegistry, StalenessDelays, StalenessKind};
pub use ports::{ActivityResolver, IssueMutator, IssueSource, PipelineResolver, PolicyStore};
pub use types::{ActivitySignals, Delay, IssueSnapshot, IssueState, Pipeline, Timestamp};
