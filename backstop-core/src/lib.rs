#![warn(missing_docs)]
//! # backstop-core
//!
//! Core types shared by the backstop resilience layer.
//!
//! Remote calls made by tool handlers pass through a small set of components
//! (rate limiting, polling, cancellation, caching and URL validation). This
//! crate holds the vocabulary they share so that collaborator code can depend
//! on it without pulling in the runtime pieces:
//!
//! - **Keys** for memoized lookups ([`CacheKey`], [`KeyPart`])
//! - **Identifiers** for cancellable operations ([`OperationId`])
//! - **Tasks** submitted to a remote service ([`TaskId`], [`TaskStatus`], [`SubmittedTask`])
//! - **Collaborator traits** driven by the poller ([`StatusCheck`], [`TaskSubmit`])

pub mod key;
pub mod operation;
pub mod task;

pub use key::{CacheKey, KeyPart, canonical_json};
pub use operation::OperationId;
pub use task::{BoxError, StatusCheck, SubmittedTask, TaskId, TaskStatus, TaskSubmit};
#[doc(hidden)]
pub use smol_str::SmolStr;
