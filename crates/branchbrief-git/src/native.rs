//! Native acquisition by invoking the `git` binary.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use branchbrief_core::url::display_url;
use branchbrief_core::{BranchbriefError, CommitRecord};
use tempfile::TempDir;

use crate::engine::{Acquire, FetchPlan, Session};
use crate::remote::{self, RemoteListing};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
// Match libgit2's defaults: no renames, no color, no external drivers.
const DIFF_FLAGS: [&str; 3] = ["--no-renames", "--no-color", "--no-ext-diff"];
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1e";

/// Acquisition through an external `git` process.
#[derive(Debug, Clone)]
pub struct NativeStrategy {
    git: PathBuf,
}

impl NativeStrategy {
    /// Use a specific `git` executable.
    pub fn with_binary(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }
}

impl Default for NativeStrategy {
    fn default() -> Self {
        Self::with_binary("git")
    }
}

impl Acquire for NativeStrategy {
    fn acquire(&self, plan: &FetchPlan<'_>) -> Result<Box<dyn Session>, BranchbriefError> {
        Ok(Box::new(NativeSession::fetch(self.git.clone(), plan)?))
    }
}

/// Output of a failed `git` invocation.
#[derive(Debug)]
struct GitFailure {
    command: String,
    output: String,
}

impl GitFailure {
    fn into_remote(self, what: &str) -> BranchbriefError {
        BranchbriefError::RemoteAccess {
            message: format!("{what}: `{}` failed", self.command),
            output: Some(self.output),
        }
    }
}

/// A bare scratch repository driven by the `git` binary.
pub struct NativeSession {
    git: PathBuf,
    listing: RemoteListing,
    dir: TempDir,
}

impl NativeSession {
    /// Create the scratch repository and fetch both branches.
    ///
    /// # Errors
    ///
    /// See [`Acquire::acquire`].
    pub fn fetch(git: PathBuf, plan: &FetchPlan<'_>) -> Result<Self, BranchbriefError> {
        let shown = display_url(plan.location);
        let dir = tempfile::Builder::new()
            .prefix("branchbrief-")
            .tempdir()?;
        let mut session = Self {
            git,
            listing: RemoteListing::default(),
            dir,
        };

        session
            .run(["init", "--bare", "--quiet"])
            .map_err(|f| f.into_remote("failed to initialise scratch repository"))?;
        session
            .run(["remote", "add", "origin", plan.location])
            .map_err(|f| f.into_remote(&format!("invalid remote {shown}")))?;

        let advertised = session
            .run(["ls-remote", "--symref", "origin"])
            .map_err(|f| f.into_remote(&format!("failed to list refs of {shown}")))?;
        session.listing = parse_ls_remote(&advertised);
        session
            .listing
            .require(&[plan.source, plan.target], plan.local_checkout)?;

        let depth = format!("--depth={}", plan.depth);
        let source_spec = remote::refspec(plan.source);
        let target_spec = remote::refspec(plan.target);
        tracing::debug!(remote = %shown, depth = plan.depth, "fetching with git");
        session
            .run([
                "fetch",
                "--no-tags",
                "--quiet",
                depth.as_str(),
                "origin",
                source_spec.as_str(),
                target_spec.as_str(),
            ])
            .map_err(|f| {
                if f.output.contains("couldn't find remote ref") {
                    return remote::missing_branch(
                        missing_ref_name(&f.output).unwrap_or(plan.source),
                        plan.local_checkout,
                    );
                }
                f.into_remote(&format!("failed to fetch from {shown}"))
            })?;

        Ok(session)
    }

    fn run<I, S>(&self, args: I) -> Result<String, GitFailure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let command = std::iter::once("git".to_string())
            .chain(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ");

        let output = Command::new(&self.git)
            .arg("-C")
            .arg(self.dir.path())
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GitFailure {
                command: command.clone(),
                output: format!("could not run {}: {e}", self.git.display()),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}\n{}", stdout.trim(), stderr.trim())
            .trim()
            .to_string();
        tracing::debug!(%command, output = %combined, "git command failed");
        Err(GitFailure {
            command,
            output: combined,
        })
    }
}

impl Session for NativeSession {
    fn listing(&self) -> &RemoteListing {
        &self.listing
    }

    fn diff(&self, source: &str, target: &str) -> Result<String, BranchbriefError> {
        let args = |old: &str, new: &str| {
            let mut args = vec!["diff".to_string()];
            args.extend(DIFF_FLAGS.iter().map(|f| f.to_string()));
            args.extend([old.to_string(), new.to_string()]);
            args
        };
        match self.run(args(&format!("origin/{target}"), &format!("origin/{source}"))) {
            Ok(text) => Ok(text),
            Err(first) => {
                tracing::debug!(output = %first.output, "retrying diff with qualified refs");
                self.run(args(&remote::tracking_ref(target), &remote::tracking_ref(source)))
                    .map_err(|second| {
                        BranchbriefError::DiffGeneration(format!(
                            "`{}` failed: {}",
                            second.command, second.output
                        ))
                    })
            }
        }
    }

    fn unique_commits(
        &self,
        source: &str,
        target: &str,
        cap: usize,
    ) -> Result<Vec<CommitRecord>, BranchbriefError> {
        let range = format!(
            "{}..{}",
            remote::tracking_ref(target),
            remote::tracking_ref(source)
        );
        let max = format!("--max-count={cap}");
        let out = self
            .run(["log", "--date-order", max.as_str(), LOG_FORMAT, range.as_str()])
            .map_err(|f| BranchbriefError::Git(format!("`{}` failed: {}", f.command, f.output)))?;
        parse_log(&out)
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Parse `git ls-remote --symref` output.
fn parse_ls_remote(output: &str) -> RemoteListing {
    let mut head = None;
    let mut refs = Vec::new();
    for line in output.lines() {
        if let Some(symref) = line.strip_prefix("ref: ") {
            if let Some((target, "HEAD")) = symref.split_once('\t') {
                head = Some(target.to_string());
            }
            continue;
        }
        if let Some((_, name)) = line.split_once('\t') {
            refs.push(name.trim());
        }
    }
    RemoteListing::from_refs(head, refs)
}

// "fatal: couldn't find remote ref refs/heads/foo" → "foo"
fn missing_ref_name(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.split("couldn't find remote ref ").nth(1))
        .map(|name| name.trim().trim_start_matches(remote::HEADS_PREFIX))
}

fn parse_log(output: &str) -> Result<Vec<CommitRecord>, BranchbriefError> {
    output
        .split(RECORD_SEP)
        .map(str::trim_start)
        .filter(|record| !record.is_empty())
        .map(|record| {
            let fields: Vec<&str> = record.splitn(5, FIELD_SEP).collect();
            let [hash, name, email, date, message] = fields[..] else {
                return Err(BranchbriefError::Git(format!(
                    "unexpected git log record: {record:?}"
                )));
            };
            let when = chrono::DateTime::parse_from_rfc3339(date.trim())
                .map_err(|e| BranchbriefError::Git(format!("bad author date {date:?}: {e}")))?;
            Ok(CommitRecord::new(hash.trim(), message, name, email, when))
        })
        .collect()
}
