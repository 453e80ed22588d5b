//! Branch differencing over a remote repository.
//!
//! Fetches two branches into a disposable bare repository, either through
//! libgit2 or the `git` binary, and reports the unified diff between their
//! tips, the commits unique to the source branch, and the remote's default
//! branch. Also reads the caller's own checkout for defaults and staged
//! changes.

pub mod engine;
pub mod library;
pub mod local;
pub mod native;
pub mod remote;
pub mod resolver;
pub mod walker;

pub use engine::{analyze, diff_only, Acquire, DiffRequest, FetchPlan, Session};
pub use library::LibraryStrategy;
pub use local::{has_local_branch, staged_diff, LocalCheckout};
pub use native::NativeStrategy;
