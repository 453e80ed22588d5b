use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use branchbrief_core::{
    split_ids, BranchbriefConfig, DiffResult, OutputFormat, ParsedOutput, Strategy,
    CONFIG_FILE_NAME,
};
use branchbrief_describe::prompt::load_template;
use branchbrief_describe::{issue_context, DescribeRequest, Describer, LlmClient};
use branchbrief_git::{analyze, staged_diff, DiffRequest, LocalCheckout};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "BRANCHBRIEF_LOG";

#[derive(Parser)]
#[command(
    name = "branchbrief",
    version,
    about = "Pull request descriptions from the difference between two branches",
    long_about = "branchbrief fetches two branches of a repository into a scratch mirror,\n\
                   collects the diff and the commits unique to the source branch, and asks a\n\
                   language model for a pull request title and body.\n\n\
                   Examples:\n  \
                     branchbrief                                   Describe the current branch against the default branch\n  \
                     branchbrief --source feature/x --target main  Describe an explicit branch pair\n  \
                     branchbrief --repo git@github.com:o/r.git --source a --target b\n  \
                     branchbrief preview                           Describe the staged changes\n  \
                     branchbrief init                              Write a .branchbrief.toml template"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Repository URL or path (default: origin of the current checkout)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Branch with the changes (default: current branch)
    #[arg(long, short, global = true)]
    source: Option<String>,

    /// Branch the changes go into (default: remote default branch)
    #[arg(long, short, global = true)]
    target: Option<String>,

    /// Issue or task description passed to the model as context
    #[arg(long, short, global = true)]
    description: Option<String>,

    /// ClickUp personal access token
    #[arg(long, global = true)]
    clickup_token: Option<String>,

    /// ClickUp task IDs to use as context, comma-separated
    #[arg(long, global = true, value_name = "IDS")]
    clickup_tasks: Option<String>,

    /// Jira site URL, e.g. https://acme.atlassian.net
    #[arg(long, global = true)]
    jira_base_url: Option<String>,

    /// Jira account email
    #[arg(long, global = true)]
    jira_username: Option<String>,

    /// Jira API token
    #[arg(long, global = true)]
    jira_api_token: Option<String>,

    /// Jira issue keys to use as context, comma-separated
    #[arg(long, global = true, value_name = "KEYS")]
    jira_issues: Option<String>,

    /// Text-generation provider: openai, ollama, gemini, openwebui
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key for the provider
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Base URL of the provider API
    #[arg(long, global = true)]
    provider_base_url: Option<String>,

    /// Repository acquisition strategy
    #[arg(
        long,
        global = true,
        long_help = "How the branches are fetched.\n\n\
                       Strategies:\n  \
                         library  Embedded libgit2 (default)\n  \
                         native   The git binary on PATH (alias: fast)"
    )]
    strategy: Option<Strategy>,

    /// Shorthand for --strategy native
    #[arg(long, global = true, conflicts_with = "strategy")]
    fast: bool,

    /// Language of the generated description (default: en)
    #[arg(long, global = true)]
    language: Option<String>,

    /// File replacing the built-in system prompt
    #[arg(long, global = true)]
    system_prompt: Option<PathBuf>,

    /// Also write the description as markdown to this file
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: nearest .branchbrief.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for the generated description.\n\n\
                       Formats:\n  \
                         text      Title and description (default)\n  \
                         json      {\"title\": ..., \"body\": ...}\n  \
                         markdown  # Title followed by the body"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Describe the difference between two branches (default)
    #[command(long_about = "Describe the difference between two branches.\n\n\
        Missing --repo, --source, and --target values are taken from the current\n\
        checkout: the origin URL, the checked-out branch, and origin's default branch.\n\
        The source branch must be pushed.\n\n\
        Examples:\n  branchbrief generate\n  branchbrief generate --source feature/login --fast\n  \
        branchbrief generate -d 'Fixes #42: login times out' --format markdown\n  \
        branchbrief generate --jira-issues HIP-1234,HIP-1250")]
    Generate,
    /// Describe the staged changes of the current checkout
    #[command(long_about = "Describe the staged changes of the current checkout.\n\n\
        Uses the index against HEAD instead of a remote branch pair, so nothing\n\
        needs to be pushed.\n\n\
        Examples:\n  git add -p && branchbrief preview\n  branchbrief preview --provider ollama --model llama3")]
    Preview,
    /// Create a .branchbrief.toml config file with defaults
    #[command(long_about = "Create a .branchbrief.toml config file in the current directory.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .branchbrief.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# branchbrief configuration
# Precedence: command-line flags > BRANCHBRIEF_* environment variables > this file.

[git]
# Repository URL or path (default: origin of the current checkout)
# repo = "https://github.com/owner/repo.git"
# source = "feature/x"
# target = "main"

# "library" (libgit2) or "native" (the git binary)
strategy = "library"

# Fetch depth for diff-only runs and for runs that also list commits
diff_depth = 50
history_depth = 100

# Tried in order when the remote does not advertise its HEAD
default_branch_candidates = ["main", "master", "dev", "develop"]

[llm]
# openai | ollama | gemini | openwebui
provider = "openai"
model = "gpt-4o"
# ${VAR} references are expanded from the environment
# api_key = "${OPENAI_API_KEY}"
# base_url = "http://localhost:11434"

[output]
language = "en"
# File replacing the built-in system prompt
# system_prompt = "prompts/pull-request.md"
# Write the final description to this file as markdown
# file = "pr-description.md"

[issues]
# Tasks are usually passed per run: --clickup-tasks id1,id2 or --jira-issues KEY-1,KEY-2
# clickup_token = "${CLICKUP_TOKEN}"
# jira_base_url = "https://yourcompany.atlassian.net"
# jira_username = "you@yourcompany.com"
# jira_api_token = "${JIRA_API_TOKEN}"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.exists() {
                miette::bail!("{CONFIG_FILE_NAME} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE_NAME} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "branchbrief", &mut std::io::stdout());
        }
        Some(Command::Preview) => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            let config = load_config(&cli, &cwd)?;
            run_preview(&cli, &config, &cwd).await?;
        }
        None | Some(Command::Generate) => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            let config = load_config(&cli, &cwd)?;
            run_generate(&cli, &config, &cwd).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// File, then environment, then flags.
fn load_config(cli: &Cli, cwd: &Path) -> Result<BranchbriefConfig> {
    let mut config = BranchbriefConfig::load(cli.config.as_deref(), cwd)
        .wrap_err("failed to load configuration")?;
    config.apply_env(&|name| std::env::var(name).ok());
    apply_flags(cli, &mut config);

    if cli.verbose {
        eprintln!(
            "provider: {} ({}), strategy: {}, format: {}",
            config.llm.provider, config.llm.model, config.git.strategy, cli.format
        );
    }
    Ok(config)
}

fn apply_flags(cli: &Cli, config: &mut BranchbriefConfig) {
    let git = &mut config.git;
    if let Some(repo) = &cli.repo {
        git.repo = Some(repo.clone());
    }
    if let Some(source) = &cli.source {
        git.source = Some(source.clone());
    }
    if let Some(target) = &cli.target {
        git.target = Some(target.clone());
    }
    if cli.fast {
        git.strategy = Strategy::Native;
    } else if let Some(strategy) = cli.strategy {
        git.strategy = strategy;
    }

    let llm = &mut config.llm;
    if let Some(provider) = &cli.provider {
        llm.provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        llm.model = model.clone();
    }
    if let Some(key) = &cli.api_key {
        llm.api_key = Some(key.clone());
    }
    if let Some(url) = &cli.provider_base_url {
        llm.base_url = Some(url.clone());
    }

    let output = &mut config.output;
    if let Some(language) = &cli.language {
        output.language = language.clone();
    }
    if let Some(path) = &cli.system_prompt {
        output.system_prompt = Some(path.clone());
    }
    if let Some(path) = &cli.output {
        output.file = Some(path.clone());
    }

    let issues = &mut config.issues;
    if let Some(token) = &cli.clickup_token {
        issues.clickup_token = Some(token.clone());
    }
    if let Some(ids) = &cli.clickup_tasks {
        issues.clickup_tasks = split_ids(ids);
    }
    if let Some(url) = &cli.jira_base_url {
        issues.jira_base_url = Some(url.clone());
    }
    if let Some(username) = &cli.jira_username {
        issues.jira_username = Some(username.clone());
    }
    if let Some(token) = &cli.jira_api_token {
        issues.jira_api_token = Some(token.clone());
    }
    if let Some(keys) = &cli.jira_issues {
        issues.jira_issues = split_ids(keys);
    }
}

/// Repository location and branch pair after filling gaps from the local checkout.
struct Target {
    location: String,
    source: String,
    target: String,
    checkout: Option<PathBuf>,
}

fn resolve_target(config: &BranchbriefConfig, cwd: &Path) -> Result<Target> {
    let git = &config.git;
    let complete = git.repo.is_some() && git.source.is_some() && git.target.is_some();
    let checkout = if complete {
        LocalCheckout::detect(cwd).ok()
    } else {
        Some(LocalCheckout::detect(cwd)?)
    };

    let location = git
        .repo
        .clone()
        .or_else(|| checkout.as_ref().and_then(|c| c.origin_url.clone()))
        .ok_or_else(|| miette::miette!("no repository location: pass --repo or configure an origin remote"))?;
    let source = git
        .source
        .clone()
        .or_else(|| checkout.as_ref().and_then(|c| c.current_branch.clone()))
        .ok_or_else(|| miette::miette!("no source branch: pass --source or check out a branch"))?;
    let target = git
        .target
        .clone()
        .or_else(|| checkout.as_ref().map(|c| c.default_branch.clone()))
        .ok_or_else(|| miette::miette!("no target branch: pass --target"))?;

    Ok(Target {
        location,
        source,
        target,
        checkout: checkout.map(|c| c.root),
    })
}

async fn run_generate(cli: &Cli, config: &BranchbriefConfig, cwd: &Path) -> Result<()> {
    let client = LlmClient::new(&config.llm)?;
    config.issues.validate()?;
    let template = load_prompt_template(config)?;
    let target = resolve_target(config, cwd)?;
    tracing::debug!(
        source = %target.source,
        target_branch = %target.target,
        strategy = %config.git.strategy,
        "resolved branch pair"
    );

    let mut request = DiffRequest::new(&target.location, &target.source, &target.target)
        .with_strategy(config.git.strategy)
        .with_depths(config.git.diff_depth, config.git.history_depth)
        .with_candidates(config.git.default_branch_candidates.clone());
    if let Some(root) = &target.checkout {
        request = request.with_local_checkout(root.clone());
    }

    let spinner = spinner(format!(
        "Comparing {} with {}...",
        target.source, target.target
    ));
    let diff = tokio::task::spawn_blocking(move || analyze(&request))
        .await
        .into_diagnostic()
        .wrap_err("branch differencing task failed")?
        .inspect_err(|_e| {
            if let Some(pb) = &spinner {
                pb.finish_with_message("Failed");
            }
        })?;
    if let Some(pb) = spinner {
        pb.finish_with_message(format!(
            "Found {} commit(s), {} bytes of diff",
            diff.commits.len(),
            diff.diff_text.len()
        ));
    }

    if diff.is_empty() {
        eprintln!(
            "warning: {} and {} have no differences",
            target.source, target.target
        );
    }
    if diff.commits_degraded {
        eprintln!("warning: commit history unavailable, describing the diff alone");
    }

    let context = fetch_issue_context(cli, config).await?;
    let request = DescribeRequest {
        issue_context: context.as_deref(),
        repo_location: Some(target.location.as_str()),
        language: &config.output.language,
        template: template.as_deref(),
    };
    let parsed = describe(client, &diff, &request).await?;
    emit(&parsed, cli.format, config.output.file.as_deref())
}

async fn run_preview(cli: &Cli, config: &BranchbriefConfig, cwd: &Path) -> Result<()> {
    let checkout = LocalCheckout::detect(cwd)?;
    let diff_text = staged_diff(&checkout.root).wrap_err("failed to read staged changes")?;
    if diff_text.trim().is_empty() {
        eprintln!("No staged changes found. Run 'git add' to stage your changes first.");
        return Ok(());
    }

    let client = LlmClient::new(&config.llm)?;
    let template = load_prompt_template(config)?;
    let context = fetch_issue_context(cli, config).await?;
    let location = config.git.repo.clone().or(checkout.origin_url);
    let diff = DiffResult {
        diff_text,
        commits: Vec::new(),
        default_branch: config
            .git
            .target
            .clone()
            .unwrap_or(checkout.default_branch),
        commits_degraded: false,
    };

    let request = DescribeRequest {
        issue_context: context.as_deref(),
        repo_location: location.as_deref(),
        language: &config.output.language,
        template: template.as_deref(),
    };
    let parsed = describe(client, &diff, &request).await?;
    emit(&parsed, cli.format, config.output.file.as_deref())
}

async fn fetch_issue_context(cli: &Cli, config: &BranchbriefConfig) -> Result<Option<String>> {
    let issues = &config.issues;
    let tracked = issues.clickup_tasks.len() + issues.jira_issues.len();
    let spinner = (tracked > 0).then(|| spinner(format!("Fetching {tracked} issue(s)..."))).flatten();
    let context = issue_context(issues, cli.description.as_deref())
        .await
        .inspect_err(|_e| {
            if let Some(pb) = &spinner {
                pb.finish_with_message("Failed");
            }
        })?;
    if let Some(pb) = spinner {
        pb.finish_with_message("Issues fetched");
    }
    Ok(context)
}

fn load_prompt_template(config: &BranchbriefConfig) -> Result<Option<String>> {
    config
        .output
        .system_prompt
        .as_deref()
        .map(load_template)
        .transpose()
        .wrap_err("failed to read system prompt")
}

async fn describe(
    client: LlmClient,
    diff: &DiffResult,
    request: &DescribeRequest<'_>,
) -> Result<ParsedOutput> {
    let spinner = spinner(format!(
        "Generating pull request description with {} ({})...",
        client.provider(),
        client.model()
    ));
    let parsed = Describer::new(client)
        .describe(diff, request)
        .await
        .inspect_err(|_e| {
            if let Some(pb) = &spinner {
                pb.finish_with_message("Failed");
            }
        })?;
    if let Some(pb) = spinner {
        pb.finish_with_message("Done");
    }
    Ok(parsed)
}

fn spinner(message: String) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn emit(parsed: &ParsedOutput, format: OutputFormat, file: Option<&Path>) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(parsed).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            print!("{}", parsed.to_markdown());
        }
        OutputFormat::Text => {
            println!("Title: {}\n", parsed.title);
            println!("Description:\n{}", parsed.body);
        }
    }

    if let Some(path) = file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, parsed.to_markdown())
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
