mod cli;
mod commands;

use clap::Parser;

use cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    let colored = cli.color.enabled();

    let code = match cli.command {
        Command::Check { predicate } => commands::check::run(&predicate, colored),
        Command::Describe {
            predicate,
            optimize,
        } => commands::describe::run(&predicate, optimize, colored),
        Command::Eval {
            predicate,
            doc,
            explain,
        } => commands::eval::run(&predicate, &doc, explain, colored),
        Command::Match { preds, doc, simple } => {
            commands::matches::run(&preds, &doc, simple, colored)
        }
    };

    std::process::exit(code);
}
