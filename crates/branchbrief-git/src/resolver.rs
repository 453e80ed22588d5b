//! Default-branch resolution.
//!
//! Pure over [`RefLookup`], so the same algorithm runs against either
//! acquisition strategy and against in-memory fakes in tests.

/// Name returned when neither the remote HEAD nor any candidate is known.
pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// Read-only view of the remote-tracking references of an acquired repository.
pub trait RefLookup {
    /// Full ref name the remote's symbolic HEAD points at, e.g. `refs/heads/main`.
    fn remote_head_target(&self) -> Option<String>;

    /// Whether the remote advertises a branch with this short name.
    fn has_remote_branch(&self, name: &str) -> bool;
}

/// Determine the remote's default branch.
///
/// Tries the symbolic HEAD first, then `candidates` in order, then
/// [`FALLBACK_DEFAULT_BRANCH`]. Never fails.
///
/// # Examples
///
/// ```
/// use branchbrief_git::resolver::{resolve_default_branch, RefLookup};
///
/// struct Heads(&'static [&'static str]);
///
/// impl RefLookup for Heads {
///     fn remote_head_target(&self) -> Option<String> {
///         None
///     }
///     fn has_remote_branch(&self, name: &str) -> bool {
///         self.0.contains(&name)
///     }
/// }
///
/// let candidates = vec!["main".to_string(), "master".to_string()];
/// assert_eq!(resolve_default_branch(&Heads(&["master", "x"]), &candidates), "master");
/// assert_eq!(resolve_default_branch(&Heads(&["x"]), &candidates), "main");
/// ```
pub fn resolve_default_branch(lookup: &dyn RefLookup, candidates: &[String]) -> String {
    if let Some(name) = lookup
        .remote_head_target()
        .as_deref()
        .and_then(last_segment)
    {
        return name.to_string();
    }

    candidates
        .iter()
        .find(|candidate| lookup.has_remote_branch(candidate))
        .cloned()
        .unwrap_or_else(|| {
            tracing::debug!("no default branch candidate found, assuming {FALLBACK_DEFAULT_BRANCH}");
            FALLBACK_DEFAULT_BRANCH.to_string()
        })
}

/// Strip a leading `origin/` from a user-supplied branch name.
///
/// # Examples
///
/// ```
/// use branchbrief_git::resolver::strip_remote_prefix;
///
/// assert_eq!(strip_remote_prefix("origin/feature/x"), "feature/x");
/// assert_eq!(strip_remote_prefix("feature/x"), "feature/x");
/// ```
pub fn strip_remote_prefix(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix("origin/").unwrap_or(name)
}

// Final path segment of a ref name, ignoring empty targets.
fn last_segment(full: &str) -> Option<&str> {
    full.trim()
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        head: Option<&'static str>,
        branches: Vec<&'static str>,
    }

    impl RefLookup for Fake {
        fn remote_head_target(&self) -> Option<String> {
            self.head.map(String::from)
        }

        fn has_remote_branch(&self, name: &str) -> bool {
            self.branches.contains(&name)
        }
    }

    fn candidates() -> Vec<String> {
        branchbrief_core::DEFAULT_BRANCH_CANDIDATES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn symbolic_head_wins() {
        let fake = Fake {
            head: Some("refs/heads/trunk"),
            branches: vec!["main", "trunk"],
        };
        assert_eq!(resolve_default_branch(&fake, &candidates()), "trunk");
    }

    #[test]
    fn candidates_are_tried_in_order() {
        let fake = Fake {
            head: None,
            branches: vec!["develop", "dev", "feature"],
        };
        assert_eq!(resolve_default_branch(&fake, &candidates()), "dev");
    }

    #[test]
    fn falls_back_to_main() {
        let fake = Fake {
            head: None,
            branches: vec!["feature"],
        };
        assert_eq!(resolve_default_branch(&fake, &candidates()), "main");
    }

    #[test]
    fn custom_candidate_list_is_respected() {
        let fake = Fake {
            head: None,
            branches: vec!["master", "stable"],
        };
        let custom = vec!["stable".to_string(), "master".to_string()];
        assert_eq!(resolve_default_branch(&fake, &custom), "stable");
    }

    #[test]
    fn empty_head_target_is_ignored() {
        let fake = Fake {
            head: Some("refs/heads/"),
            branches: vec!["master"],
        };
        assert_eq!(resolve_default_branch(&fake, &candidates()), "master");
    }

    #[test]
    fn origin_prefix_is_stripped_once() {
        assert_eq!(strip_remote_prefix(" origin/main "), "main");
        assert_eq!(strip_remote_prefix("origin/origin/x"), "origin/x");
        assert_eq!(strip_remote_prefix("upstream/x"), "upstream/x");
    }
}
