//! The `edit` command: external editor round trips.

mod bridge;
mod classify;
mod command;
mod scratch;

pub use bridge::{
    normalize_line_endings, prepare_result, ContentKind, EditorBridge, EditorSession,
    SourceLookup,
};
pub use classify::{is_bare_identifier, is_editor_application_family, EDITOR_APPLICATION_FAMILY};
pub use command::{
    resolve_editor_command, EditorCommand, EDITOR_CONFIG_KEY, EDITOR_ENV, WAIT_FLAG,
};
pub use scratch::{pid_from_name, ScratchDir, SCRATCH_DIR_NAME};
