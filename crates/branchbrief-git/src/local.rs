//! The caller's own working copy.
//!
//! Supplies defaults for the repository location and branch names, and the
//! staged diff used by `preview`.

use std::path::{Path, PathBuf};

use branchbrief_core::BranchbriefError;
use git2::{BranchType, Repository};

use crate::library::patch_text;
use crate::resolver::FALLBACK_DEFAULT_BRANCH;

/// Facts read from a local checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCheckout {
    /// Working directory root.
    pub root: PathBuf,
    /// `remote.origin.url`, if configured.
    pub origin_url: Option<String>,
    /// Short name of the checked-out branch; `None` when HEAD is detached or unborn.
    pub current_branch: Option<String>,
    /// Branch `refs/remotes/origin/HEAD` points at, else `main`.
    pub default_branch: String,
}

impl LocalCheckout {
    /// Inspect the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::Config`] when `path` is not inside a git
    /// repository.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use branchbrief_git::LocalCheckout;
    ///
    /// let checkout = LocalCheckout::detect(Path::new(".")).unwrap();
    /// println!("{:?} on {:?}", checkout.origin_url, checkout.current_branch);
    /// ```
    pub fn detect(path: &Path) -> Result<Self, BranchbriefError> {
        let repo = open(path)?;
        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();

        let origin_url = repo
            .find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(String::from));

        let current_branch = repo.head().ok().and_then(|head| {
            if head.is_branch() {
                head.shorthand().map(String::from)
            } else {
                None
            }
        });

        let default_branch = repo
            .find_reference("refs/remotes/origin/HEAD")
            .ok()
            .and_then(|r| r.symbolic_target().map(String::from))
            .and_then(|target| target.rsplit('/').next().map(String::from))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_DEFAULT_BRANCH.to_string());

        Ok(Self {
            root,
            origin_url,
            current_branch,
            default_branch,
        })
    }
}

/// Whether the repository at `path` has a local branch called `name`.
///
/// Any failure to open the repository counts as "no".
pub fn has_local_branch(path: &Path, name: &str) -> bool {
    Repository::discover(path)
        .map(|repo| repo.find_branch(name, BranchType::Local).is_ok())
        .unwrap_or(false)
}

/// Unified diff of the index against `HEAD`.
///
/// On an unborn branch everything staged is reported as added.
///
/// # Errors
///
/// [`BranchbriefError::Config`] outside a repository,
/// [`BranchbriefError::Git`] if the index or `HEAD` cannot be read.
pub fn staged_diff(path: &Path) -> Result<String, BranchbriefError> {
    let repo = open(path)?;
    let head_tree = match repo.head() {
        Ok(head) => Some(
            head.peel_to_tree()
                .map_err(|e| BranchbriefError::Git(format!("failed to read HEAD tree: {e}")))?,
        ),
        Err(_) => None,
    };
    let index = repo
        .index()
        .map_err(|e| BranchbriefError::Git(format!("failed to read index: {e}")))?;
    let diff = repo
        .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)
        .map_err(|e| BranchbriefError::Git(format!("failed to diff index: {e}")))?;
    patch_text(&diff)
}

fn open(path: &Path) -> Result<Repository, BranchbriefError> {
    Repository::discover(path).map_err(|_| {
        BranchbriefError::Config(format!(
            "{} is not inside a git repository; pass --repo, --source and --target",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use git2::Signature;

    use super::*;

    fn commit_file(repo: &Repository, name: &str, content: &str) {
        let root = repo.workdir().unwrap();
        std::fs::write(root.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parents: Vec<_> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<_> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parent_refs)
            .unwrap();
    }

    #[test]
    fn detect_reads_origin_and_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "a\n");
        repo.remote("origin", "git@github.com:owner/repo.git").unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("feature/x", &head, false).unwrap();
        repo.set_head("refs/heads/feature/x").unwrap();

        let checkout = LocalCheckout::detect(dir.path()).unwrap();
        assert_eq!(checkout.origin_url.as_deref(), Some("git@github.com:owner/repo.git"));
        assert_eq!(checkout.current_branch.as_deref(), Some("feature/x"));
        assert_eq!(checkout.default_branch, "main");
    }

    #[test]
    fn detect_uses_origin_head() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "a\n");
        repo.reference_symbolic(
            "refs/remotes/origin/HEAD",
            "refs/remotes/origin/develop",
            true,
            "test",
        )
        .unwrap();

        let checkout = LocalCheckout::detect(dir.path()).unwrap();
        assert_eq!(checkout.default_branch, "develop");
    }

    #[test]
    fn detect_outside_repository_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalCheckout::detect(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, BranchbriefError::Config(_)));
    }

    #[test]
    fn local_branch_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "a\n");
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("wip", &head, false).unwrap();

        assert!(has_local_branch(dir.path(), "wip"));
        assert!(!has_local_branch(dir.path(), "nope"));
    }

    #[test]
    fn staged_diff_shows_index_changes_only() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.txt", "one\n");

        std::fs::write(dir.path().join("a.txt"), "two\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.txt")).unwrap();
        index.write().unwrap();
        std::fs::write(dir.path().join("unstaged.txt"), "ignored\n").unwrap();

        let diff = staged_diff(dir.path()).unwrap();
        assert!(diff.contains("-one"));
        assert!(diff.contains("+two"));
        assert!(!diff.contains("unstaged.txt"));
    }

    #[test]
    fn staged_diff_on_unborn_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("new.txt"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("new.txt")).unwrap();
        index.write().unwrap();

        let diff = staged_diff(dir.path()).unwrap();
        assert!(diff.contains("+hello"));
    }
}
