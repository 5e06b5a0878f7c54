//! Shell verbs handled before evaluation.
//!
//! A verb is only recognised when its first word matches and the rest of
//! the line has the verb's shape. Anything else, such as `use = 1`, is
//! evaluated as code.

use crate::error::{Result, ShellError};

pub const HELP_TEXT: &str = "\
Shell commands:
  use <db>                     Set the current database
  show dbs                     List databases
  show collections             List collections of the current database
  it                           Show the next batch of the last cursor
  config                       List settings
  config get <key>             Show a setting
  config set <key> <value>     Change a setting
  edit [expression]            Edit a line or a variable in an external editor
  help                         Show this help
  exit                         Leave the shell

Calls that return pending operations are awaited automatically.";

/// What `show` lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget {
    Databases,
    Collections,
}

/// Sub-command of `config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    List,
    Get(String),
    Set(String, String),
}

/// A recognised shell verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Use(String),
    Show(ShowTarget),
    It,
    Config(ConfigAction),
    Edit(String),
    Help,
    Exit,
}

/// Recognise a verb in `line`.
///
/// Returns `None` for ordinary code and `Some(Err(_))` for a verb whose
/// arguments are malformed.
pub fn parse_verb(line: &str) -> Option<Result<Verb>> {
    let line = line.trim();
    let words: Vec<&str> = line.split_whitespace().collect();
    let (&first, rest) = words.split_first()?;

    let verb = match (first, rest) {
        ("use", [name]) if is_database_name(name) => Verb::Use(name.to_string()),
        ("show", ["dbs" | "databases"]) => Verb::Show(ShowTarget::Databases),
        ("show", ["collections" | "tables"]) => Verb::Show(ShowTarget::Collections),
        ("it", []) => Verb::It,
        ("help", []) => Verb::Help,
        ("exit" | "quit", []) => Verb::Exit,
        ("config", []) => Verb::Config(ConfigAction::List),
        ("config", ["get", key]) => Verb::Config(ConfigAction::Get(key.to_string())),
        ("config", ["get", ..]) => return Some(Err(usage("config get <key>"))),
        ("config", ["set", key, _, ..]) => {
            let value = after_words(line, 3);
            Verb::Config(ConfigAction::Set(key.to_string(), unquote(value)))
        }
        ("config", ["set", ..]) => return Some(Err(usage("config set <key> <value>"))),
        ("edit", rest) if rest.first().map_or(true, |w| !w.starts_with('=')) => {
            Verb::Edit(after_words(line, 1).to_string())
        }
        _ => return None,
    };
    Some(Ok(verb))
}

fn usage(form: &str) -> ShellError {
    ShellError::Usage(form.to_string())
}

fn is_database_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The text of `line` after its first `n` words.
fn after_words(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

/// A single quoted word is unquoted; anything else is kept verbatim.
fn unquote(value: &str) -> String {
    match shlex::split(value) {
        Some(words) if words.len() == 1 => words.into_iter().next().unwrap_or_default(),
        _ => value.to_string(),
    }
}
