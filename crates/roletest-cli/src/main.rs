//! ansible-role-test - docker based testing utility for ansible roles

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use roletest_cli::playbook::{PlaybookArgs, RoleSource};
use roletest_cli::runner::{self, TestPlan};
use roletest_config::{GlobalConfig, PluginPaths, RolePaths, ANSIBLE_VERSIONS};
use roletest_provider::{DaemonClient, DockerDaemon};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "ansible-role-test")]
#[command(author, version, about = "Docker based testing utility for ansible roles")]
#[command(
    long_about = "Docker based testing utility for ansible roles.\n\n\
                  ROLE can be either a local path, a git repository or an ansible-galaxy role name."
)]
struct Cli {
    /// Paths file to use for the tests
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Search path for non-galaxy roles that might be required as dependencies
    #[arg(long, value_name = "ROLES_PATH")]
    roles_path: Option<PathBuf>,

    /// Search path for custom ansible modules
    #[arg(long, value_name = "LIBRARY_PATH", env = "ANSIBLE_LIBRARY")]
    library_path: Option<PathBuf>,

    /// Search path for custom action plugins
    #[arg(long, value_name = "PLUGINS_ACTION_PATH", env = "ANSIBLE_ACTION_PLUGINS")]
    plugins_action_path: Option<PathBuf>,

    /// Search path for custom filter plugins
    #[arg(long, value_name = "PLUGINS_FILTER_PATH", env = "ANSIBLE_FILTER_PLUGINS")]
    plugins_filter_path: Option<PathBuf>,

    /// Search path for custom lookup plugins
    #[arg(long, value_name = "PLUGINS_LOOKUP_PATH", env = "ANSIBLE_LOOKUP_PLUGINS")]
    plugins_lookup_path: Option<PathBuf>,

    /// Set additional variables as key=value or YAML/JSON
    #[arg(short, long, value_name = "EXTRA_VARS")]
    extra_vars: Vec<String>,

    /// Limit selected hosts to a given pattern
    #[arg(short, long, value_name = "SUBSET")]
    limit: Option<String>,

    /// Only run plays and tasks whose tags do not match these values
    #[arg(long, value_name = "SKIP_TAGS")]
    skip_tags: Option<String>,

    /// Only run plays and tasks tagged with these values
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,

    /// Verbose mode (-vvv for more, -vvvv to enable connection debugging)
    #[arg(short = 'v', action = ArgAction::Count)]
    verbosity: u8,

    /// The ansible version to use
    #[arg(long, default_value = "latest", value_parser = ANSIBLE_VERSIONS.to_vec())]
    ansible_version: String,

    /// Run the test container privileged
    #[arg(long)]
    privileged: bool,

    /// Image to test in, overriding the one configured for the ansible version
    #[arg(long)]
    image: Option<String>,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Role to test
    role: String,
}

impl Cli {
    /// Command-line search paths, anchored at the working directory
    fn role_paths(&self) -> anyhow::Result<RolePaths> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let paths = RolePaths {
            roles: self.roles_path.clone(),
            library: self.library_path.clone(),
            plugins: PluginPaths {
                action: self.plugins_action_path.clone(),
                filter: self.plugins_filter_path.clone(),
                lookup: self.plugins_lookup_path.clone(),
            },
        }
        .resolved(&cwd)?;

        match &self.config {
            Some(file) => Ok(paths.merge(RolePaths::load_from(file)?)),
            None => Ok(paths),
        }
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(i32::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i64> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = GlobalConfig::load().context("Failed to load configuration")?;
    let paths = cli.role_paths()?;
    let role = RoleSource::parse(&cli.role)?;

    let image = match &cli.image {
        Some(image) => image.clone(),
        None => config
            .defaults
            .image_for(&cli.ansible_version)
            .ok_or_else(|| anyhow!("No image configured for ansible {}", cli.ansible_version))?,
    };

    let plan = TestPlan {
        image,
        role,
        paths,
        args: PlaybookArgs {
            extra_vars: cli.extra_vars,
            limit: cli.limit,
            skip_tags: cli.skip_tags,
            tags: cli.tags,
            verbosity: cli.verbosity,
        },
        privileged: cli.privileged || config.defaults.privileged,
        stop_timeout: config.daemon.stop_timeout_secs,
    };

    let daemon = DockerDaemon::connect(&config.daemon).await?;
    let client: Arc<dyn DaemonClient> = Arc::new(daemon);

    runner::run(client, plan, std::io::stdout()).await
}
