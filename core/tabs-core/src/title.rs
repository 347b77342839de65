//! Tab title formatting and sanitizing.
//!
//! Titles look like `3: myproject [nvim]`. Everything that reaches kitty goes
//! through [`sanitize_title`] first, since directory names and command lines
//! are user-controlled and may carry control or bidi-override characters.

pub const UNTITLED: &str = "untitled";
pub const DEFAULT_MAX_TITLE_LENGTH: usize = 256;
const ELLIPSIS: &str = "...";

/// Truncates to `max_len` characters, ending in `...` when anything was cut.
///
/// A truncated result is exactly `max_len` characters long.
pub fn truncate_with_ellipsis(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(&ELLIPSIS[..max_len.min(ELLIPSIS.len())]);
    truncated
}

/// Strips one trailing separator; the root stays `/`.
pub fn normalize_cwd(cwd: &str) -> &str {
    if cwd == "/" {
        return cwd;
    }
    cwd.strip_suffix('/').unwrap_or(cwd)
}

/// Final path segment, truncated for display.
pub fn display_dir(normalized_cwd: &str, max_len: usize) -> String {
    let name = match normalized_cwd.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => normalized_cwd,
    };
    truncate_with_ellipsis(name, max_len)
}

pub fn format_title(
    tab_index: Option<usize>,
    show_tab_index: bool,
    display_dir: &str,
    command: Option<&str>,
) -> String {
    let mut title = String::new();
    if let Some(index) = tab_index.filter(|_| show_tab_index) {
        title.push_str(&format!("{}: ", index));
    }
    title.push_str(display_dir);
    if let Some(command) = command {
        title.push_str(&format!(" [{}]", command));
    }
    title
}

fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    // Zero-width, bidi embedding/override/isolate, and BOM characters.
    !matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}' | '\u{FEFF}'
    )
}

/// Makes a title safe to hand to the emulator.
///
/// Non-printable characters are removed, an empty result becomes `untitled`,
/// and the title is cut to `max_length` characters.
pub fn sanitize_title(title: &str, max_length: usize) -> String {
    let printable: String = title.chars().filter(|c| is_printable(*c)).collect();
    let trimmed = printable.trim();
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    trimmed.chars().take(max_length.max(1)).collect()
}
