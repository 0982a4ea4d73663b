//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// How kernel output is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Rendered text, like a terminal console
    Text,
    /// One JSON message per line
    Json,
}

/// CLI arguments for nbkernel
#[derive(Parser, Debug)]
#[command(name = "nbkernel")]
#[command(author, version, about = "Run code on Jupyter kernels from the command line")]
#[command(long_about = r#"
nbkernel starts (or attaches to) a Jupyter kernel, runs code on it and
prints the kernel's output.

Configuration files are loaded from (in priority order):
1. NBKERNEL_* environment variables
2. --config <path>       Explicit config file
3. ./nbkernel.toml       Project-level config
4. ~/.config/nbkernel/config.toml   Global config

Pressing Ctrl-C interrupts the running code. A kernel that does not
acknowledge the interrupt within session.interrupt_timeout_ms is restarted.

Example:
  nbkernel kernelspecs
  nbkernel run --kernel python3 "print('hello')"
  nbkernel run --file analysis.py
  nbkernel connect ~/.local/share/jupyter/runtime/kernel-1234.json "x + 1"
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress the kernel status spinner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Record every protocol message as JSONL
    #[arg(long, value_name = "PATH", global = true)]
    pub message_log: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a kernel, run code on it, then shut it down
    Run {
        /// Kernelspec name (defaults to `kernel.default` from config)
        #[arg(short, long, value_name = "NAME")]
        kernel: Option<String>,

        /// Read code from a file
        #[arg(short, long, value_name = "PATH", conflicts_with = "code")]
        file: Option<PathBuf>,

        /// Code to run; read from stdin when neither this nor --file is given
        code: Option<String>,
    },

    /// Attach to a running kernel through its connection file and run code
    Connect {
        /// The kernel's connection file
        connection_file: PathBuf,

        /// Code to run; read from stdin when omitted
        code: Option<String>,

        /// Ask the kernel to shut down afterwards
        #[arg(long)]
        shutdown: bool,
    },

    /// List installed kernelspecs
    Kernelspecs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_kernel() {
        let cli = Cli::parse_from(["nbkernel", "run", "--kernel", "python3", "print(1)"]);
        assert_eq!(
            cli.command,
            Some(Command::Run {
                kernel: Some("python3".to_string()),
                file: None,
                code: Some("print(1)".to_string()),
            })
        );
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["nbkernel", "kernelspecs", "-vv", "--output", "json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.command, Some(Command::Kernelspecs));
    }

    #[test]
    fn test_file_conflicts_with_code() {
        let result = Cli::try_parse_from(["nbkernel", "run", "--file", "a.py", "print(1)"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
