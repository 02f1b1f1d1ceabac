//! XML character escaping
//!
//! Characters outside the XML 1.0 `Char` production (other than tab,
//! LF and CR below 0x20, plus U+FFFE and U+FFFF) are written as
//! hexadecimal character references.

use std::fmt::Write;

/// Escape text content
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    push_text(&mut out, s);
    out
}

/// Escape an attribute value (double-quoted)
pub fn escape_attribute(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    push_attribute(&mut out, s);
    out
}

pub(crate) fn push_text(out: &mut String, s: &str) {
    for c in s.chars() {
        push_char(out, c, false);
    }
}

pub(crate) fn push_attribute(out: &mut String, s: &str) {
    for c in s.chars() {
        push_char(out, c, true);
    }
}

fn push_char(out: &mut String, c: char, attribute: bool) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '"' if attribute => out.push_str("&quot;"),
        '>' if attribute => out.push_str("&gt;"),
        '\t' | '\n' | '\r' => out.push(c),
        '\u{FFFE}' | '\u{FFFF}' => push_reference(out, c),
        c if (c as u32) < 0x20 => push_reference(out, c),
        c => out.push(c),
    }
}

fn push_reference(out: &mut String, c: char) {
    // Writing to a String cannot fail
    let _ = write!(out, "&#x{:x};", c as u32);
}
