//! Subscribe/unsubscribe command builders.
//!
//! Channel names are sent as quoted identifiers so that mixed-case names
//! and names containing dots or dashes (e.g. a role name like
//! `"ws.operator"`) reach the server unchanged.

/// Build the `LISTEN` command for `channel`.
pub fn listen_command(channel: &str) -> String {
    format!("LISTEN {}", quote_ident(channel))
}

/// Build the `UNLISTEN` command for `channel`.
pub fn unlisten_command(channel: &str) -> String {
    format!("UNLISTEN {}", quote_ident(channel))
}

/// Wrap `ident` in double quotes, doubling any embedded quote.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
