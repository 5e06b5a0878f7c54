//! Pure text classification used by the editor bridge.

use crate::script::lexer::{is_ident_continue, is_ident_start, KEYWORDS};

/// Executable names of editors that return immediately unless told to wait
/// for the window to close.
pub const EDITOR_APPLICATION_FAMILY: &[&str] = &["code", "code-insiders", "codium", "subl", "atom"];

/// True if `command_path` names an editor from [`EDITOR_APPLICATION_FAMILY`].
///
/// Only the final path segment counts. Either separator is accepted, the
/// comparison ignores case, and a `.exe` suffix is ignored.
pub fn is_editor_application_family(command_path: &str) -> bool {
    let name = command_path
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let name = name.strip_suffix(".exe").unwrap_or(&name);
    EDITOR_APPLICATION_FAMILY.contains(&name)
}

/// True if `code` is a dotted identifier path such as `db.test.find` or
/// `$something`.
///
/// Anything with calls, indexing, literals, operators or braces is a
/// statement instead.
pub fn is_bare_identifier(code: &str) -> bool {
    let code = code.trim();
    let mut segments = code.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    is_name(first) && !KEYWORDS.contains(&first) && segments.all(is_name)
}

fn is_name(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars.next().is_some_and(is_ident_start) && chars.all(is_ident_continue)
}
