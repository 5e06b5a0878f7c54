//! Command-line interface for shell-rewrite.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Database to start in.
    pub db: Option<String>,
    /// Editor command for `edit` (overrides config file).
    pub editor: Option<String>,
    /// Code to evaluate instead of reading input.
    pub eval: Option<String>,
    /// Documents shown per cursor batch.
    pub batch_size: Option<usize>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('d') | Long("db") => {
                result.db = Some(parser.value()?.parse()?);
            }
            Long("editor") => {
                result.editor = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("eval") => {
                result.eval = Some(parser.value()?.parse()?);
            }
            Long("batch-size") => {
                let value: String = parser.value()?.parse()?;
                let size = value
                    .parse::<usize>()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or(ArgsError::InvalidValue("batch-size", value))?;
                result.batch_size = Some(size);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-rewrite {version}
Interactive shell that awaits pending calls for you

USAGE:
    shell-rewrite [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -d, --db <NAME>         Database to start in [default: test]
        --editor <CMD>      Editor command used by `edit`
    -e, --eval <CODE>       Evaluate CODE, print the result and exit
        --batch-size <N>    Documents shown per cursor batch [default: 20]
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_REWRITE_DB         Database to start in (overrides config)
    SHELL_REWRITE_EDITOR     Editor command (overrides config)
    SHELL_REWRITE_LOG_LEVEL  Log level (overrides config)
    EDITOR                   Editor used when none is configured
    RUST_LOG                 Alternative log level setting

EXAMPLES:
    # Start an interactive shell
    shell-rewrite

    # Evaluate one line against another database
    shell-rewrite -d shop -e "db.orders.countDocuments()"

    # Edit with VS Code (--wait is added automatically)
    shell-rewrite --editor code
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-rewrite {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
