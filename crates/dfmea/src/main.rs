mod account;
mod analysis;
mod cli;
mod output;
mod uploads;
mod workbench;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, LogFormat, parse_cli};

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format);
    run(cli)
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Human => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;
    tracing::debug!(
        workspace = %workspace.display(),
        log_format = cli.log_format.as_str(),
        "starting"
    );

    match cli.command {
        Commands::Login(args) => account::run_login_command(&workspace, args),
        Commands::Logout => account::run_logout_command(&workspace),
        Commands::Whoami(args) => account::run_whoami_command(&workspace, args),
        Commands::Theme(args) => account::run_theme_command(&workspace, args),
        Commands::Init(args) => account::run_init_command(&workspace, args),
        Commands::Options(args) => analysis::run_options_command(&workspace, args),
        Commands::Generate(args) => analysis::run_generate_command(&workspace, args),
        Commands::Upload(args) => uploads::run_upload_command(&workspace, args),
        Commands::Files(args) => uploads::run_files_command(&workspace, args),
    }
}
