//! Ancestor-filtered commit walk.
//!
//! Walks the source tip's ancestry newest first with the target tip's history
//! hidden, so the walk never runs past the target. Only commits the target tip
//! cannot reach are kept. The walk ends at the target boundary, at the cap, or
//! when the (possibly shallow) history runs out.

use branchbrief_core::{BranchbriefError, CommitRecord};
use chrono::{DateTime, FixedOffset};
use git2::{ErrorCode, Oid, Repository, Sort};

/// Lazily walked ancestry, newest first.
pub type Ancestry<'a, Id> = Box<dyn Iterator<Item = Result<Id, BranchbriefError>> + 'a>;

/// Commit graph the walker runs over.
pub trait CommitGraph {
    /// Commit identifier.
    type Id: Copy + Eq;

    /// Commits reachable from `tip` but not from `hide`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk cannot be started; per-item errors are
    /// yielded by the iterator.
    fn ancestry<'a>(
        &'a self,
        tip: Self::Id,
        hide: Self::Id,
    ) -> Result<Ancestry<'a, Self::Id>, BranchbriefError>;

    /// Whether `ancestor` is reachable from `of` (a commit is its own ancestor).
    fn is_ancestor(&self, ancestor: Self::Id, of: Self::Id) -> Result<bool, BranchbriefError>;

    /// Whether the two commits have a common ancestor in the available history.
    fn shares_history(&self, a: Self::Id, b: Self::Id) -> Result<bool, BranchbriefError>;

    /// Load the record for a commit.
    fn record(&self, id: Self::Id) -> Result<CommitRecord, BranchbriefError>;
}

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// Every commit above the target's history was visited.
    ReachedTarget,
    /// `cap` unique commits were collected.
    CapReached,
    /// The available ancestry ran out without meeting the target's history.
    Exhausted,
}

/// Commits unique to the source branch and how the walk ended.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Unique commits, newest first.
    pub commits: Vec<CommitRecord>,
    /// Termination reason.
    pub end: WalkEnd,
}

/// Collect at most `cap` commits reachable from `source` but not from `target`.
///
/// The result is the `target..source` range, so source commits older than a
/// merge of the target back into the source are still found.
///
/// # Errors
///
/// Propagates graph errors. Reaching the target or the cap is not an error.
pub fn collect_unique_commits<G: CommitGraph>(
    graph: &G,
    source: G::Id,
    target: G::Id,
    cap: usize,
) -> Result<WalkOutcome, BranchbriefError> {
    let mut commits = Vec::new();
    if cap == 0 {
        return Ok(WalkOutcome {
            commits,
            end: WalkEnd::CapReached,
        });
    }

    for id in graph.ancestry(source, target)? {
        let id = id?;
        if graph.is_ancestor(id, target)? {
            continue;
        }
        commits.push(graph.record(id)?);
        if commits.len() == cap {
            return Ok(WalkOutcome {
                commits,
                end: WalkEnd::CapReached,
            });
        }
    }

    let end = if graph.shares_history(source, target)? {
        WalkEnd::ReachedTarget
    } else {
        WalkEnd::Exhausted
    };
    Ok(WalkOutcome { commits, end })
}

/// [`CommitGraph`] over a `git2` repository.
pub struct Git2Graph<'r> {
    repo: &'r Repository,
}

impl<'r> Git2Graph<'r> {
    /// Wrap an open repository.
    pub fn new(repo: &'r Repository) -> Self {
        Self { repo }
    }
}

impl CommitGraph for Git2Graph<'_> {
    type Id = Oid;

    fn ancestry<'a>(&'a self, tip: Oid, hide: Oid) -> Result<Ancestry<'a, Oid>, BranchbriefError> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| BranchbriefError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| BranchbriefError::Git(format!("failed to sort revwalk: {e}")))?;
        revwalk
            .push(tip)
            .map_err(|e| BranchbriefError::Git(format!("failed to push {tip}: {e}")))?;
        revwalk
            .hide(hide)
            .map_err(|e| BranchbriefError::Git(format!("failed to hide {hide}: {e}")))?;
        Ok(Box::new(revwalk.map(|oid| {
            oid.map_err(|e| BranchbriefError::Git(format!("revwalk error: {e}")))
        })))
    }

    fn is_ancestor(&self, ancestor: Oid, of: Oid) -> Result<bool, BranchbriefError> {
        if ancestor == of {
            return Ok(true);
        }
        self.repo
            .graph_descendant_of(of, ancestor)
            .map_err(|e| BranchbriefError::Git(format!("ancestry check failed: {e}")))
    }

    fn shares_history(&self, a: Oid, b: Oid) -> Result<bool, BranchbriefError> {
        match self.repo.merge_base(a, b) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(BranchbriefError::Git(format!("merge base lookup failed: {e}"))),
        }
    }

    fn record(&self, id: Oid) -> Result<CommitRecord, BranchbriefError> {
        let commit = self
            .repo
            .find_commit(id)
            .map_err(|e| BranchbriefError::Git(format!("failed to find commit: {e}")))?;
        let author = commit.author();
        let message = String::from_utf8_lossy(commit.message_bytes());
        Ok(CommitRecord::new(
            id.to_string(),
            &message,
            author.name().unwrap_or("unknown"),
            author.email().unwrap_or(""),
            signature_time(&author.when()),
        ))
    }
}

/// Convert a `git2` timestamp to a chrono time in the author's offset.
pub(crate) fn signature_time(time: &git2::Time) -> DateTime<FixedOffset> {
    let utc = DateTime::from_timestamp(time.seconds(), 0).unwrap_or_default();
    match FixedOffset::east_opt(time.offset_minutes() * 60) {
        Some(offset) => utc.with_timezone(&offset),
        None => utc.fixed_offset(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Parent links keyed by id; ids double as timestamps, larger is newer.
    struct FakeGraph {
        parents: HashMap<u32, Vec<u32>>,
    }

    impl FakeGraph {
        fn new(edges: Vec<(u32, Vec<u32>)>) -> Self {
            Self {
                parents: edges.into_iter().collect(),
            }
        }

        fn reachable(&self, tip: u32) -> Vec<u32> {
            let mut seen = vec![tip];
            let mut stack = vec![tip];
            while let Some(id) = stack.pop() {
                for parent in self.parents.get(&id).into_iter().flatten() {
                    if !seen.contains(parent) {
                        seen.push(*parent);
                        stack.push(*parent);
                    }
                }
            }
            seen.sort_unstable_by(|a, b| b.cmp(a));
            seen
        }
    }

    impl CommitGraph for FakeGraph {
        type Id = u32;

        fn ancestry<'a>(&'a self, tip: u32, hide: u32) -> Result<Ancestry<'a, u32>, BranchbriefError> {
            let hidden = self.reachable(hide);
            let visible: Vec<u32> = self
                .reachable(tip)
                .into_iter()
                .filter(|id| !hidden.contains(id))
                .collect();
            Ok(Box::new(visible.into_iter().map(Ok)))
        }

        fn is_ancestor(&self, ancestor: u32, of: u32) -> Result<bool, BranchbriefError> {
            Ok(self.reachable(of).contains(&ancestor))
        }

        fn shares_history(&self, a: u32, b: u32) -> Result<bool, BranchbriefError> {
            let theirs = self.reachable(b);
            Ok(self.reachable(a).iter().any(|id| theirs.contains(id)))
        }

        fn record(&self, id: u32) -> Result<CommitRecord, BranchbriefError> {
            let when = DateTime::from_timestamp(i64::from(id), 0)
                .unwrap()
                .fixed_offset();
            Ok(CommitRecord::new(
                format!("{id:040}"),
                &format!("commit {id}"),
                "dev",
                "dev@example.com",
                when,
            ))
        }
    }

    fn ids(outcome: &WalkOutcome) -> Vec<String> {
        outcome.commits.iter().map(|c| c.message.clone()).collect()
    }

    #[test]
    fn linear_branch_returns_new_commits_newest_first() {
        // A(1) -> B(2) -> C(3) shared, D(4) -> E(5) on source.
        let graph = FakeGraph::new(vec![(1, vec![]), (2, vec![1]), (3, vec![2]), (4, vec![3]), (5, vec![4])]);
        let outcome = collect_unique_commits(&graph, 5, 3, 20).unwrap();
        assert_eq!(ids(&outcome), vec!["commit 5", "commit 4"]);
        assert_eq!(outcome.end, WalkEnd::ReachedTarget);
    }

    #[test]
    fn cap_limits_output() {
        let mut edges = vec![(1, vec![])];
        for id in 2..=26 {
            edges.push((id, vec![id - 1]));
        }
        let graph = FakeGraph::new(edges);

        let outcome = collect_unique_commits(&graph, 26, 1, 20).unwrap();
        assert_eq!(outcome.commits.len(), 20);
        assert_eq!(outcome.end, WalkEnd::CapReached);
        assert_eq!(outcome.commits[0].message, "commit 26");
        assert_eq!(outcome.commits[19].message, "commit 7");
    }

    #[test]
    fn commits_merged_into_target_are_skipped() {
        // Target 6 merged side commit 3; source 5 also contains 3.
        // 1 <- 2 <- 4 <- 5 (source), 1 <- 3, 2 <- 6 <- 3 merged (target).
        let graph = FakeGraph::new(vec![
            (1, vec![]),
            (2, vec![1]),
            (3, vec![1]),
            (4, vec![2, 3]),
            (5, vec![4]),
            (6, vec![2, 3]),
        ]);
        let outcome = collect_unique_commits(&graph, 5, 6, 20).unwrap();
        assert_eq!(ids(&outcome), vec!["commit 5", "commit 4"]);
        assert_eq!(outcome.end, WalkEnd::ReachedTarget);
    }

    #[test]
    fn target_merged_back_into_source_keeps_older_source_commits() {
        // main 1 <- 2 <- 4; feature 2 <- 3 <- 5 (merges 4) <- 6.
        // The target tip 4 is newer than the source-only commit 3.
        let graph = FakeGraph::new(vec![
            (1, vec![]),
            (2, vec![1]),
            (3, vec![2]),
            (4, vec![2]),
            (5, vec![3, 4]),
            (6, vec![5]),
        ]);
        let outcome = collect_unique_commits(&graph, 6, 4, 20).unwrap();
        assert_eq!(ids(&outcome), vec!["commit 6", "commit 5", "commit 3"]);
        assert_eq!(outcome.end, WalkEnd::ReachedTarget);
    }

    #[test]
    fn source_behind_target_yields_nothing() {
        let graph = FakeGraph::new(vec![(1, vec![]), (2, vec![1]), (3, vec![2])]);
        let outcome = collect_unique_commits(&graph, 2, 3, 20).unwrap();
        assert!(outcome.commits.is_empty());
        assert_eq!(outcome.end, WalkEnd::ReachedTarget);
    }

    #[test]
    fn unrelated_histories_walk_to_the_end() {
        let graph = FakeGraph::new(vec![(1, vec![]), (2, vec![1]), (10, vec![]), (11, vec![10])]);
        let outcome = collect_unique_commits(&graph, 2, 11, 20).unwrap();
        assert_eq!(ids(&outcome), vec!["commit 2", "commit 1"]);
        assert_eq!(outcome.end, WalkEnd::Exhausted);
    }

    #[test]
    fn zero_cap_returns_immediately() {
        let graph = FakeGraph::new(vec![(1, vec![])]);
        let outcome = collect_unique_commits(&graph, 1, 1, 0).unwrap();
        assert!(outcome.commits.is_empty());
        assert_eq!(outcome.end, WalkEnd::CapReached);
    }
}
