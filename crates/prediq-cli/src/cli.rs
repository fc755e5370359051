//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// When to color diagnostic output. `Auto` colors only when diagnostics
/// actually land on a terminal, and honors the `NO_COLOR` convention.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolves the mode against the environment. Diagnostics go to stderr,
    /// so that is the stream probed.
    pub fn enabled(self) -> bool {
        use std::io::IsTerminal;

        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::env::var_os("NO_COLOR").is_none_or(|v| v.is_empty())
                    && std::io::stderr().is_terminal()
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "prediq", bin_name = "prediq")]
#[command(about = "Boolean predicate engine for attribute-keyed documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// When to color diagnostic output
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub color: ColorMode,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a predicate and report diagnostics
    #[command(after_help = r#"EXAMPLES:
  prediq check "errors contains 'CPU load'"
  prediq check "x = 3 and environment != 'test'""#)]
    Check {
        /// Predicate source text
        predicate: String,
    },

    /// Render the AST of a predicate
    #[command(after_help = r#"EXAMPLES:
  prediq describe "name is 'Jack' and age > 40"
  prediq describe "x = 3 and x = 4" --optimize"#)]
    Describe {
        /// Predicate source text
        predicate: String,

        /// Show the optimized tree instead of the parsed one
        #[arg(long)]
        optimize: bool,
    },

    /// Evaluate a predicate against a JSON document
    #[command(after_help = r#"EXAMPLES:
  prediq eval "name is 'Jack'" --doc '{"name": "Jack"}'
  prediq eval "errors contains 'CPU load'" --doc '{"errors": []}' --explain"#)]
    Eval {
        /// Predicate source text
        predicate: String,

        /// JSON object to evaluate against
        #[arg(long, value_name = "JSON")]
        doc: String,

        /// Print the failure trail and observed literals as JSON
        #[arg(long)]
        explain: bool,
    },

    /// Match a document against a file of predicates (one per line)
    #[command(after_help = r#"EXAMPLES:
  prediq match --preds subscriptions.txt --doc '{"event": "deploy"}'
  prediq match --preds subscriptions.txt --doc '{"event": "deploy"}' --simple"#)]
    Match {
        /// File with one predicate per line; blank lines and # comments skip
        #[arg(long, value_name = "FILE")]
        preds: PathBuf,

        /// JSON object to evaluate against
        #[arg(long, value_name = "JSON")]
        doc: String,

        /// Use the linear set instead of the compiled decision tree
        #[arg(long)]
        simple: bool,
    },
}
