//! Shell-rewrite binary entry point.

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use shell_rewrite::cli::{self, print_help, print_version};
use shell_rewrite::{logging, Config, InputStream, MemoryBackend, Shell};
use tokio::io::BufReader;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'shell-rewrite --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    logging::init_with_level(config.log_filter());
    info!("shell-rewrite v{}", env!("CARGO_PKG_VERSION"));

    let mut shell = Shell::new(Arc::new(MemoryBackend::new()), &config);
    let swept = shell.editor().scratch().sweep_stale();
    debug!(swept, "scratch directory ready");

    match args.eval {
        Some(code) => eval_and_exit(&mut shell, &code).await,
        None => run_interactive(&mut shell).await,
    }
}

/// Evaluate one line, print its output and exit.
async fn eval_and_exit(shell: &mut Shell, code: &str) -> ExitCode {
    let result = shell.process_line(code).await;
    for line in shell.take_printed() {
        println!("{}", line);
    }
    match result {
        Ok(reply) => {
            for line in reply.lines {
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_interactive(shell: &mut Shell) -> ExitCode {
    shell.set_interactive(std::io::stdin().is_terminal());
    let mut input = InputStream::new(BufReader::new(tokio::io::stdin()));
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();

    match shell.run(&mut input, &mut stdout, &mut stderr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
