//! What the remote advertised when we connected, and branch presence checks.

use std::collections::BTreeSet;
use std::path::Path;

use branchbrief_core::BranchbriefError;

use crate::local;
use crate::resolver::RefLookup;

/// Prefix of branch refs as advertised by a remote.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Remote-tracking ref for a fetched branch.
///
/// # Examples
///
/// ```
/// use branchbrief_git::remote::tracking_ref;
///
/// assert_eq!(tracking_ref("feature/x"), "refs/remotes/origin/feature/x");
/// ```
pub fn tracking_ref(branch: &str) -> String {
    format!("refs/remotes/origin/{branch}")
}

/// Forced refspec mapping a remote branch onto its tracking ref.
pub fn refspec(branch: &str) -> String {
    format!("+{HEADS_PREFIX}{branch}:{}", tracking_ref(branch))
}

/// Branches and symbolic HEAD advertised by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    /// Target of the remote's `HEAD`, e.g. `refs/heads/main`.
    pub head: Option<String>,
    /// Short names of every advertised branch.
    pub branches: BTreeSet<String>,
}

impl RemoteListing {
    /// Build a listing from advertised ref names.
    pub fn from_refs<'a>(head: Option<String>, refs: impl IntoIterator<Item = &'a str>) -> Self {
        let branches = refs
            .into_iter()
            .filter_map(|name| name.strip_prefix(HEADS_PREFIX))
            .map(String::from)
            .collect();
        Self { head, branches }
    }

    /// Fail unless both `branches` are advertised.
    ///
    /// A branch absent on the remote but present in `local_checkout` is
    /// reported as [`BranchbriefError::RemoteRefMissing`] so the user gets a
    /// push hint.
    ///
    /// # Errors
    ///
    /// Returns [`BranchbriefError::BranchNotFound`] or
    /// [`BranchbriefError::RemoteRefMissing`] for the first missing branch.
    pub fn require(
        &self,
        branches: &[&str],
        local_checkout: Option<&Path>,
    ) -> Result<(), BranchbriefError> {
        match branches.iter().find(|b| !self.branches.contains(**b)) {
            Some(missing) => Err(missing_branch(missing, local_checkout)),
            None => Ok(()),
        }
    }
}

impl RefLookup for RemoteListing {
    fn remote_head_target(&self) -> Option<String> {
        self.head.clone()
    }

    fn has_remote_branch(&self, name: &str) -> bool {
        self.branches.contains(name)
    }
}

/// Classify a branch the remote does not have.
pub fn missing_branch(branch: &str, local_checkout: Option<&Path>) -> BranchbriefError {
    let branch = branch.to_string();
    match local_checkout {
        Some(path) if local::has_local_branch(path, &branch) => {
            BranchbriefError::RemoteRefMissing { branch }
        }
        _ => BranchbriefError::BranchNotFound { branch },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> RemoteListing {
        RemoteListing::from_refs(
            Some("refs/heads/main".into()),
            ["HEAD", "refs/heads/main", "refs/heads/feature/a", "refs/tags/v1"],
        )
    }

    #[test]
    fn only_heads_become_branches() {
        let listing = listing();
        let names: Vec<_> = listing.branches.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["feature/a", "main"]);
    }

    #[test]
    fn require_passes_when_present() {
        assert!(listing().require(&["feature/a", "main"], None).is_ok());
    }

    #[test]
    fn require_names_the_missing_branch() {
        let err = listing().require(&["main", "feature/b"], None).unwrap_err();
        match err {
            BranchbriefError::BranchNotFound { branch } => assert_eq!(branch, "feature/b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn refspec_is_forced_and_tracking() {
        assert_eq!(
            refspec("dev"),
            "+refs/heads/dev:refs/remotes/origin/dev"
        );
    }
}
