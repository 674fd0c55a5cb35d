use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "automacro")]
#[command(about = "Evaluate condition/action macros on a fixed schedule")]
#[command(long_about = "automacro - a macro scheduling and evaluation engine

A document holds named macros and shared variables. Every pass checks each
unpaused macro's conditions, folds the results with their logic operators,
and runs the macro's actions when the result is true.

QUICK START:
  automacro list                 List macros and their state
  automacro tick --count 3       Evaluate three passes and report
  automacro run                  Evaluate until Ctrl-C, then save
  automacro migrate              Re-save the document at the current version

Every command accepts -o json for output meant for other programs.
See 'automacro <command> --help' for per-command options.")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// How results are printed: colored text or JSON
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Config file (default: ~/.automacro/config.yaml)
    #[arg(long, global = true, env = "AUTOMACRO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Macro document (default: from config, or ~/.automacro/macros.json)
    #[arg(short, long, global = true, env = "AUTOMACRO_DOCUMENT")]
    pub document: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored text for a terminal.
    #[default]
    Pretty,
    /// A JSON document on stdout.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    ///
    /// Loads the document, evaluates it every interval on a background
    /// thread, and saves it when stopped with Ctrl-C or after --ticks
    /// passes.
    ///
    /// # Examples
    ///
    ///   automacro run                   Run until Ctrl-C
    ///   automacro run --interval 100    Evaluate every 100 ms
    ///   automacro run --ticks 50        Stop after 50 passes
    Run(RunArgs),

    /// Evaluate passes synchronously and report
    ///
    /// Runs the given number of passes back to back on the current thread,
    /// prints what matched and ran, and saves the document.
    ///
    /// # Examples
    ///
    ///   automacro tick                  One pass
    ///   automacro tick --count 5 -o json
    Tick {
        /// Number of passes
        #[arg(short, long, default_value_t = 1)]
        count: u64,

        /// Do not save the document afterwards
        #[arg(long)]
        no_save: bool,
    },

    /// List macros with their state
    #[command(alias = "ls")]
    List,

    /// Show a macro's conditions and actions
    Show {
        /// Macro name
        name: String,
    },

    /// List variables with their values
    #[command(alias = "vars")]
    Variables,

    /// Load the document and report problems without running it
    Validate,

    /// Load the document and save it at the current version
    ///
    /// Older documents are upgraded on load; this writes the upgraded form
    /// back, either in place or to --to.
    Migrate {
        /// Write here instead of overwriting the document
        #[arg(long, value_name = "PATH")]
        to: Option<PathBuf>,
    },

    /// Run a macro's actions once, ignoring its conditions and pause flag
    RunMacro {
        /// Macro name
        name: String,
    },

    /// Pause a macro
    Pause {
        /// Macro name
        name: String,
    },

    /// Unpause a macro
    Unpause {
        /// Macro name
        name: String,
    },

    /// Generate shell completions
    ///
    /// # Examples
    ///
    ///   automacro completions bash > /etc/bash_completion.d/automacro
    ///   automacro completions zsh > ~/.zfunc/_automacro
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many passes
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Pass interval in milliseconds (overrides the config)
    #[arg(long)]
    pub interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from([
            "automacro",
            "tick",
            "--count",
            "3",
            "-o",
            "json",
            "--document",
            "/tmp/doc.json",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.document, Some(PathBuf::from("/tmp/doc.json")));
        assert!(matches!(cli.command, Commands::Tick { count: 3, no_save: false }));
    }

    #[test]
    fn test_parse_run_macro() {
        let cli = Cli::parse_from(["automacro", "run-macro", "greet"]);
        assert!(matches!(cli.command, Commands::RunMacro { ref name } if name == "greet"));
    }
}
