use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use automacro::cli::args::{Cli, Commands};
use automacro::cli::commands::{self, Workspace};
use automacro::config::LogSettings;
use automacro::error::AutomacroError;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        let code = e
            .downcast_ref::<AutomacroError>()
            .map_or(1, AutomacroError::exit_code);
        std::process::exit(code);
    }
}

/// Log to stderr. `RUST_LOG` wins over the configured level.
fn init_logging(settings: &LogSettings, verbose: bool) {
    let level = if verbose { "debug" } else { settings.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("automacro={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    if let Commands::Completions { shell } = cli.command {
        commands::completions(shell, &mut std::io::stdout())?;
        return Ok(());
    }

    let workspace = Workspace::open(cli.config.as_deref(), cli.document)?;
    init_logging(&workspace.config.log, cli.verbose);

    let output = match cli.command {
        Commands::Run(args) => commands::run(&workspace, &args, format)?,
        Commands::Tick { count, no_save } => commands::tick(&workspace, count, !no_save, format)?,
        Commands::List => commands::list(&workspace, format)?,
        Commands::Show { name } => commands::show(&workspace, &name, format)?,
        Commands::Variables => commands::variables(&workspace, format)?,
        Commands::Validate => commands::validate(&workspace, format)?,
        Commands::Migrate { to } => commands::migrate(&workspace, to, format)?,
        Commands::RunMacro { name } => commands::run_macro(&workspace, &name, format)?,
        Commands::Pause { name } => commands::set_paused(&workspace, &name, true, format)?,
        Commands::Unpause { name } => commands::set_paused(&workspace, &name, false, format)?,
        Commands::Completions { .. } => String::new(),
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
