//! GitHub and ZenHub infrastructure adapter for the lifecycle manager.
//!
//! Implements the port traits defined in the [`lifecycle`] crate
//! (`IssueSource`, `IssueMutator`, `ActivityResolver`, `PipelineResolver`)
//! over the GitHub and ZenHub REST APIs.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain lifecycle rules.
//! All API details (rate limiting, pagination, authentication, comment
//! signatures) are handled here; the [`lifecycle`] crate never sees them.

pub mod activity;
pub mod client;
mod issues;
mod models;
pub mod zenhub;

pub use activity::MemberActivityResolver;
pub use client::{GithubClient, GithubConfig, GithubError};
pub use zenhub::{NoPipelines, ZenhubClient, ZenhubConfig};
