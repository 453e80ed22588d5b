//! Branch differencing orchestration.
//!
//! Picks an acquisition strategy, resolves the default branch, materializes
//! the diff, and enumerates unique commits. Commit enumeration is best
//! effort; everything else aborts the call on failure.

use std::path::{Path, PathBuf};

use branchbrief_core::{
    BranchbriefError, CommitRecord, DiffResult, Strategy, DEFAULT_BRANCH_CANDIDATES,
    MAX_UNIQUE_COMMITS,
};

use crate::library::LibraryStrategy;
use crate::native::NativeStrategy;
use crate::remote::RemoteListing;
use crate::resolver::{resolve_default_branch, strip_remote_prefix};

/// Fetch depth when only the diff is needed.
pub const DIFF_DEPTH: u32 = 50;

/// Fetch depth when unique commits are enumerated too.
pub const HISTORY_DEPTH: u32 = 100;

/// Input to the differencing engine.
///
/// # Examples
///
/// ```
/// use branchbrief_core::Strategy;
/// use branchbrief_git::DiffRequest;
///
/// let request = DiffRequest::new("git@github.com:owner/repo.git", "origin/feature", "main")
///     .with_strategy(Strategy::Native);
/// assert_eq!(request.source, "origin/feature");
/// assert_eq!(request.history_depth, 100);
/// ```
#[derive(Debug, Clone)]
pub struct DiffRequest {
    /// Repository location, passed to the fetch unchanged.
    pub location: String,
    /// Source branch, optionally `origin/`-qualified.
    pub source: String,
    /// Target branch, optionally `origin/`-qualified.
    pub target: String,
    /// Acquisition strategy.
    pub strategy: Strategy,
    /// Depth for [`diff_only`].
    pub diff_depth: u32,
    /// Depth for [`analyze`].
    pub history_depth: u32,
    /// Default-branch names tried when the remote HEAD is unknown.
    pub candidates: Vec<String>,
    /// Caller's working copy, consulted to spot unpushed branches.
    pub local_checkout: Option<PathBuf>,
}

impl DiffRequest {
    /// Request with default depths, candidates, and the library strategy.
    pub fn new(
        location: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            source: source.into(),
            target: target.into(),
            strategy: Strategy::default(),
            diff_depth: DIFF_DEPTH,
            history_depth: HISTORY_DEPTH,
            candidates: DEFAULT_BRANCH_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            local_checkout: None,
        }
    }

    /// Select the acquisition strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override both fetch depths.
    pub fn with_depths(mut self, diff_depth: u32, history_depth: u32) -> Self {
        self.diff_depth = diff_depth;
        self.history_depth = history_depth;
        self
    }

    /// Override the default-branch candidates.
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Attach the caller's working copy.
    pub fn with_local_checkout(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_checkout = Some(path.into());
        self
    }

    fn plan(&self, depth: u32) -> FetchPlan<'_> {
        FetchPlan {
            location: self.location.trim(),
            source: strip_remote_prefix(&self.source),
            target: strip_remote_prefix(&self.target),
            depth,
            local_checkout: self.local_checkout.as_deref(),
        }
    }
}

/// Normalized parameters handed to an [`Acquire`] implementation.
#[derive(Debug, Clone, Copy)]
pub struct FetchPlan<'a> {
    /// Repository location.
    pub location: &'a str,
    /// Source branch short name.
    pub source: &'a str,
    /// Target branch short name.
    pub target: &'a str,
    /// Shallow fetch depth.
    pub depth: u32,
    /// Caller's working copy, if any.
    pub local_checkout: Option<&'a Path>,
}

/// An acquisition strategy: builds a disposable mirror holding both branches.
pub trait Acquire {
    /// Initialise a scratch repository and fetch both branches of `plan`.
    ///
    /// # Errors
    ///
    /// [`BranchbriefError::RemoteAccess`] for transport failures,
    /// [`BranchbriefError::BranchNotFound`] or
    /// [`BranchbriefError::RemoteRefMissing`] for absent branches.
    fn acquire(&self, plan: &FetchPlan<'_>) -> Result<Box<dyn Session>, BranchbriefError>;
}

/// A fetched scratch repository. Dropping it removes its directory.
pub trait Session {
    /// Refs advertised by the remote at fetch time.
    fn listing(&self) -> &RemoteListing;

    /// Unified diff from `target` to `source`.
    ///
    /// # Errors
    ///
    /// [`BranchbriefError::DiffGeneration`] when no patch can be produced.
    fn diff(&self, source: &str, target: &str) -> Result<String, BranchbriefError>;

    /// Up to `cap` commits on `source` that `target` cannot reach, newest first.
    ///
    /// # Errors
    ///
    /// Any failure; the engine downgrades it to an empty list.
    fn unique_commits(
        &self,
        source: &str,
        target: &str,
        cap: usize,
    ) -> Result<Vec<CommitRecord>, BranchbriefError>;

    /// Scratch directory backing this session.
    fn path(&self) -> &Path;
}

/// Strategy implementation for a [`Strategy`] tag.
pub fn acquirer(strategy: Strategy) -> Box<dyn Acquire> {
    match strategy {
        Strategy::Library => Box::new(LibraryStrategy),
        Strategy::Native => Box::new(NativeStrategy::default()),
    }
}

/// Diff and unique commits between two remote branches.
///
/// Fetches [`DiffRequest::history_depth`] commits of each branch. A failure
/// while enumerating commits is logged and reported through
/// [`DiffResult::commits_degraded`] instead of failing the call.
///
/// # Errors
///
/// Remote access, branch resolution, and diff generation failures.
///
/// # Examples
///
/// ```no_run
/// use branchbrief_git::{analyze, DiffRequest};
///
/// let request = DiffRequest::new("https://github.com/owner/repo.git", "feature", "main");
/// let result = analyze(&request).unwrap();
/// println!("{} commits ahead of {}", result.commits.len(), result.default_branch);
/// ```
pub fn analyze(request: &DiffRequest) -> Result<DiffResult, BranchbriefError> {
    run(
        acquirer(request.strategy).as_ref(),
        &request.plan(request.history_depth),
        &request.candidates,
        true,
    )
}

/// Diff between two remote branches without enumerating commits.
///
/// Fetches only [`DiffRequest::diff_depth`] commits of each branch.
///
/// # Errors
///
/// Same as [`analyze`].
pub fn diff_only(request: &DiffRequest) -> Result<DiffResult, BranchbriefError> {
    run(
        acquirer(request.strategy).as_ref(),
        &request.plan(request.diff_depth),
        &request.candidates,
        false,
    )
}

/// Run the differencing pipeline over any [`Acquire`] implementation.
///
/// # Errors
///
/// Same as [`analyze`], plus [`BranchbriefError::Config`] for a zero depth.
pub fn run(
    acquire: &dyn Acquire,
    plan: &FetchPlan<'_>,
    candidates: &[String],
    with_commits: bool,
) -> Result<DiffResult, BranchbriefError> {
    // libgit2 reads depth 0 as a full fetch while `git fetch --depth=0` fails.
    if plan.depth == 0 {
        return Err(BranchbriefError::Config(
            "fetch depth must be at least 1".into(),
        ));
    }
    tracing::debug!(
        source = plan.source,
        target_branch = plan.target,
        depth = plan.depth,
        "acquiring branches"
    );
    let session = acquire.acquire(plan)?;

    let default_branch = resolve_default_branch(session.listing(), candidates);
    let diff_text = session.diff(plan.source, plan.target)?;

    let (commits, commits_degraded) = if with_commits {
        match session.unique_commits(plan.source, plan.target, MAX_UNIQUE_COMMITS) {
            Ok(commits) => (commits, false),
            Err(e) => {
                let degraded = BranchbriefError::CommitEnumerationDegraded(e.to_string());
                tracing::warn!("{degraded}");
                (Vec::new(), true)
            }
        }
    } else {
        (Vec::new(), false)
    };

    tracing::debug!(
        diff_bytes = diff_text.len(),
        commits = commits.len(),
        default_branch = %default_branch,
        "branches analyzed"
    );

    Ok(DiffResult {
        diff_text,
        commits,
        default_branch,
        commits_degraded,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::DateTime;

    use super::*;

    struct FakeSession {
        listing: RemoteListing,
        diff: Result<String, String>,
        commits: Result<Vec<CommitRecord>, String>,
    }

    impl Session for FakeSession {
        fn listing(&self) -> &RemoteListing {
            &self.listing
        }

        fn diff(&self, _source: &str, _target: &str) -> Result<String, BranchbriefError> {
            self.diff.clone().map_err(BranchbriefError::DiffGeneration)
        }

        fn unique_commits(
            &self,
            _source: &str,
            _target: &str,
            cap: usize,
        ) -> Result<Vec<CommitRecord>, BranchbriefError> {
            assert_eq!(cap, MAX_UNIQUE_COMMITS);
            self.commits.clone().map_err(BranchbriefError::Git)
        }

        fn path(&self) -> &Path {
            Path::new("/nonexistent")
        }
    }

    struct FakeAcquire {
        diff: Result<String, String>,
        commits: Result<Vec<CommitRecord>, String>,
        seen_depth: Cell<u32>,
    }

    impl FakeAcquire {
        fn new(diff: Result<&str, &str>, commits: Result<Vec<CommitRecord>, &str>) -> Self {
            Self {
                diff: diff.map(String::from).map_err(String::from),
                commits: commits.map_err(String::from),
                seen_depth: Cell::new(u32::MAX),
            }
        }
    }

    impl Acquire for FakeAcquire {
        fn acquire(&self, plan: &FetchPlan<'_>) -> Result<Box<dyn Session>, BranchbriefError> {
            self.seen_depth.set(plan.depth);
            Ok(Box::new(FakeSession {
                listing: RemoteListing::from_refs(None, ["refs/heads/master"]),
                diff: self.diff.clone(),
                commits: self.commits.clone(),
            }))
        }
    }

    fn commit(hash: &str) -> CommitRecord {
        let when = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+00:00").unwrap();
        CommitRecord::new(hash, "msg", "a", "a@example.com", when)
    }

    fn plan(depth: u32) -> FetchPlan<'static> {
        FetchPlan {
            location: "https://example.com/r.git",
            source: "feature",
            target: "master",
            depth,
            local_checkout: None,
        }
    }

    fn candidates() -> Vec<String> {
        vec!["main".into(), "master".into()]
    }

    #[test]
    fn successful_run_fills_every_field() {
        let acquire = FakeAcquire::new(Ok("diff --git a/x b/x\n"), Ok(vec![commit("abc")]));
        let result = run(&acquire, &plan(100), &candidates(), true).unwrap();
        assert_eq!(result.diff_text, "diff --git a/x b/x\n");
        assert_eq!(result.commits.len(), 1);
        assert_eq!(result.default_branch, "master");
        assert!(!result.commits_degraded);
        assert_eq!(acquire.seen_depth.get(), 100);
    }

    #[test]
    fn commit_failure_degrades_instead_of_failing() {
        let acquire = FakeAcquire::new(Ok("diff"), Err("revwalk exploded"));
        let result = run(&acquire, &plan(100), &candidates(), true).unwrap();
        assert_eq!(result.diff_text, "diff");
        assert!(result.commits.is_empty());
        assert!(result.commits_degraded);
    }

    #[test]
    fn diff_failure_is_fatal() {
        let acquire = FakeAcquire::new(Err("bad object"), Ok(vec![]));
        let err = run(&acquire, &plan(50), &candidates(), true).unwrap_err();
        assert!(matches!(err, BranchbriefError::DiffGeneration(_)));
    }

    #[test]
    fn diff_only_skips_commit_enumeration() {
        let acquire = FakeAcquire::new(Ok("diff"), Err("must not be called"));
        let result = run(&acquire, &plan(50), &candidates(), false).unwrap();
        assert!(result.commits.is_empty());
        assert!(!result.commits_degraded);
    }

    #[test]
    fn zero_depth_is_rejected_before_fetching() {
        let acquire = FakeAcquire::new(Ok("diff"), Ok(vec![]));
        let err = run(&acquire, &plan(0), &candidates(), true).unwrap_err();
        assert!(matches!(err, BranchbriefError::Config(_)), "{err:?}");
        assert_eq!(acquire.seen_depth.get(), u32::MAX, "acquire must not run");

        let request = DiffRequest::new("r", "s", "t").with_depths(0, 0);
        assert!(matches!(
            diff_only(&request).unwrap_err(),
            BranchbriefError::Config(_)
        ));
    }

    #[test]
    fn request_plan_strips_origin_prefix() {
        let request = DiffRequest::new(" https://example.com/r.git ", "origin/feature/a", "origin/main");
        let plan = request.plan(request.history_depth);
        assert_eq!(plan.location, "https://example.com/r.git");
        assert_eq!(plan.source, "feature/a");
        assert_eq!(plan.target, "main");
        assert_eq!(plan.depth, HISTORY_DEPTH);
    }

    #[test]
    fn request_defaults() {
        let request = DiffRequest::new("r", "s", "t");
        assert_eq!(request.strategy, Strategy::Library);
        assert_eq!(request.diff_depth, DIFF_DEPTH);
        assert_eq!(request.candidates, vec!["main", "master", "dev", "develop"]);
        assert!(request.local_checkout.is_none());
    }
}
