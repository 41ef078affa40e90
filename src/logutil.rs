//! Helpers for keeping journal entries and log lines single-line.
//!
//! Several message bodies legitimately contain newlines (the station ident
//! does, and inbound payloads may), but the journal format is strictly one
//! line per entry. Bodies pass through [`flatten`] before hitting disk.

/// Escape a string so it occupies exactly one line:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Any other control character is rendered as `\xNN`.
pub fn flatten(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// [`flatten`] with a hard character cap, for debug-logging inbound payloads
/// without flooding the process log.
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return flatten(s);
    }
    let head: String = s.chars().take(max_chars).collect();
    let mut out = flatten(&head);
    out.push('…');
    out
}
