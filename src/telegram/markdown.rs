//! MarkdownV2 helpers.

/// Escape user-supplied text for Telegram MarkdownV2.
///
/// Purposes, usernames, and tx refs all flow into formatted messages;
/// anything dynamic goes through here first.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        match c {
            '\\' | '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|' | '{' | '}'
            | '.' | '!' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    result
}

/// Format a birr amount for display, then escape it (the decimal point
/// is a MarkdownV2 special).
pub fn escape_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        escape_markdown_v2(&format!("{amount:.2}"))
    }
}
