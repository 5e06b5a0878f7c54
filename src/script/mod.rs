//! The script language evaluated by the shell.
//!
//! A small JavaScript-like language: declarations, functions, arrow
//! functions, `if`/`else`, object and array literals, and an explicit
//! `await` marker. Calls to backend methods produce pending operations
//! that only run once awaited; the [`rewrite`](crate::rewrite) module
//! inserts the missing `await`s.

pub mod ast;
mod interpreter;
pub mod lexer;
mod parser;
mod scope;
mod source;
mod value;

pub use interpreter::{Interpreter, MAX_CALL_DEPTH};
pub use parser::parse;
pub use scope::Scope;
pub use source::{SourceId, Span};
pub use value::{format_number, object_key, quote_string, Builtin, Object, PendingOp, Value};
