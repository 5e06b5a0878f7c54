//! # shell-rewrite
//!
//! Interactive shell core that awaits asynchronous calls for the user.
//!
//! Database calls in the shell's script language return pending values.
//! Instead of making users write `await` in front of each of them, every
//! line is first run in a sandbox that records which calls suspend, then
//! rewritten with the missing `await`s and evaluated for real.
//!
//! ## Features
//!
//! - **Transparent await**: `db.users.find().length` just works
//! - **External editor**: `edit` opens a line or a function in `$EDITOR`
//!   and feeds the result back as the next input line
//! - **Async I/O**: Non-blocking evaluation and editor processes using tokio
//! - **Lightweight**: Minimal dependencies, small binary size
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shell_rewrite::{Config, MemoryBackend, Shell};
//!
//! #[tokio::main]
//! async fn main() -> shell_rewrite::Result<()> {
//!     // Initialize logging
//!     shell_rewrite::logging::try_init(None).ok();
//!
//!     // Create a shell over an in-memory backend
//!     let mut shell = Shell::new(Arc::new(MemoryBackend::new()), &Config::default());
//!
//!     shell.process_line("db.users.insertOne({ name: 'ada' })").await?;
//!     let reply = shell.process_line("db.users.findOne().name").await?;
//!     println!("{}", reply.lines.join("\n"));
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod logging;
pub mod rewrite;
pub mod script;
pub mod shell;

// Re-export commonly used types
pub use backend::{Backend, BackendCall, MemoryBackend, Target};
pub use config::Config;
pub use editor::{EditorBridge, ScratchDir, SourceLookup};
pub use error::{BackendError, EditorError, EvalError, Result, ShellError};
pub use rewrite::{rewrite, AsyncRewriteEvaluator, EvaluationSession, SourceLocation};
pub use script::{Interpreter, Value};
pub use shell::{InputStream, Reply, Shell};
