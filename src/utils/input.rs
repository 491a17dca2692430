//! Cleanup of pasted text before it lands in the one-line chat input.

/// Flattens pasted text onto one line.
///
/// Tabs become four spaces, each line break (`\r\n`, `\r` or `\n`) becomes a
/// single space, and remaining control characters are dropped so they cannot
/// corrupt the terminal.
pub fn flatten_paste(text: &str) -> String {
    let mut flattened = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\t' => flattened.push_str("    "),
            '\r' => {
                chars.next_if_eq(&'\n');
                flattened.push(' ');
            }
            '\n' => flattened.push(' '),
            _ if !c.is_control() => flattened.push(c),
            _ => {}
        }
    }

    flattened
}
