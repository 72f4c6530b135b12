// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod globals;
mod theme;

use clap::{Parser as ClapParser, Subcommand};
use cliclack::{input, intro, set_theme};
use es_vm::Engine;
use theme::DefaultTheme;

/// An embeddable ECMAScript interpreter
#[derive(Debug, ClapParser)]
#[command(name = "es")]
#[command(about = "An embeddable ECMAScript interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parses a file and prints its AST
    Parse {
        /// The path of the file to parse
        path: String,
    },

    /// Evaluates one or more files
    Eval {
        /// Evaluates the last file as an ECMAScript module
        #[arg(short, long)]
        module: bool,

        /// Prints the completion value of every file, not just errors
        #[arg(short, long)]
        verbose: bool,

        /// The files to evaluate
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Runs the REPL
    Repl,
}

fn exit_with_parse_error(err: &es_parser::ParseError, path: &str) -> ! {
    eprintln!("{path}: parse error at {:?}: {}", err.span, err.message);
    std::process::exit(1);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Cli::parse();

    match args.command {
        Command::Parse { path } => {
            let source = std::fs::read_to_string(&path)?;
            match es_parser::parse(&source, false) {
                Ok(out) => println!("{:#?}", out.arena[out.program]),
                Err(err) => exit_with_parse_error(&err, &path),
            }
        }
        Command::Eval { module, verbose, paths } => {
            let mut engine = Engine::new();
            globals::install(&mut engine);
            let last_index = paths.len() - 1;
            for (index, path) in paths.into_iter().enumerate() {
                let source = std::fs::read_to_string(&path)?;
                let result = if module && index == last_index {
                    engine.evaluate_module(&source)
                } else {
                    engine.evaluate_async(&source)
                };
                match result {
                    Ok(value) => {
                        if verbose {
                            println!("{}", value.to_display_string());
                        }
                    }
                    Err(err) => {
                        eprintln!("{path}: {err}");
                        std::process::exit(1);
                    }
                }
            }
            engine.run_pending_tasks();
        }
        Command::Repl => {
            let mut engine = Engine::new();
            globals::install(&mut engine);
            set_theme(DefaultTheme);
            println!("\n");
            let mut placeholder = "Enter a line of JavaScript".to_string();

            let _ = ctrlc::set_handler(|| {
                std::process::exit(0);
            });

            loop {
                intro("es_cli repl")?;
                let line: String = input("").placeholder(&placeholder).interact()?;

                if line == "exit" {
                    std::process::exit(0);
                }
                placeholder = line.clone();

                match engine.evaluate(&line) {
                    Ok(value) => println!("{}\n", value.to_display_string()),
                    Err(err) => eprintln!("Uncaught exception: {err}\n"),
                }
                engine.run_pending_tasks();
            }
        }
    }
    Ok(())
}
