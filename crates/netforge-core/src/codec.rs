//! Text format codec
//!
//! Parses and emits the line-oriented configuration format:
//!
//! ```text
//! config interface 'wan'
//!     option proto 'static'
//!     option ipaddr '192.168.1.1'
//!     list dns '1.1.1.1'
//! ```
//!
//! The emitted form is always accepted by the parser, and
//! `parse(emit(doc))` is semantically equal to `doc`. Single quotes and
//! backslashes in values are escaped on emit and unescaped on parse. The
//! codec performs no I/O.

use crate::errors::{parse_error, Result};
use crate::model::{ConfigDocument, Section};

/// Parse a configuration document from text
///
/// Blank lines and `#` comments are ignored. Errors carry the 1-based
/// line number of the offending line.
pub fn parse(input: &str) -> Result<ConfigDocument> {
    let mut doc = ConfigDocument::new();
    let mut current: Option<Section> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("config ") {
            // Flush the previous section before opening a new one
            if let Some(section) = current.take() {
                doc.push_section(section);
            }

            let parts = split_tokens(rest);
            if parts.is_empty() {
                return Err(parse_error(line_no, "invalid config line"));
            }
            let name = parts.get(1).cloned().unwrap_or_default();
            current = Some(Section::new(parts[0].clone(), name));
        } else if let Some(rest) = line.strip_prefix("option ") {
            let section = current
                .as_mut()
                .ok_or_else(|| parse_error(line_no, "option outside of section"))?;
            let parts = split_tokens(rest);
            if parts.len() != 2 {
                return Err(parse_error(line_no, "invalid option line"));
            }
            section.set_option(parts[0].clone(), parts[1].clone());
        } else if let Some(rest) = line.strip_prefix("list ") {
            let section = current
                .as_mut()
                .ok_or_else(|| parse_error(line_no, "list outside of section"))?;
            let parts = split_tokens(rest);
            if parts.len() != 2 {
                return Err(parse_error(line_no, "invalid list line"));
            }
            section.push_list_value(parts[0].clone(), parts[1].clone());
        } else {
            return Err(parse_error(line_no, format!("unknown syntax: {line}")));
        }
    }

    if let Some(section) = current {
        doc.push_section(section);
    }

    Ok(doc)
}

/// Emit a configuration document as text
///
/// Sections are separated by a single blank line; there is no blank line
/// before the first section. Options and lists are indented with one tab
/// and single-quoted.
pub fn emit(doc: &ConfigDocument) -> String {
    let mut out = String::new();

    for (i, section) in doc.sections().enumerate() {
        if i > 0 {
            out.push('\n');
        }

        if section.name().is_empty() {
            out.push_str(&format!("config {}\n", section.section_type()));
        } else {
            out.push_str(&format!(
                "config {} '{}'\n",
                section.section_type(),
                escape_value(section.name())
            ));
        }

        for (key, value) in section.options() {
            out.push_str(&format!("\toption '{}' '{}'\n", key, escape_value(value)));
        }

        for (key, values) in section.lists() {
            for value in values {
                out.push_str(&format!("\tlist '{}' '{}'\n", key, escape_value(value)));
            }
        }
    }

    out
}

/// Split a line into quoted or unquoted tokens
///
/// Example: `interface 'wan'` -> `["interface", "wan"]`. Inside quotes a
/// backslash escapes the active quote character and itself, so emitted
/// values containing quotes round-trip.
fn split_tokens(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    // Escape sequence: only the quote char and backslash
                    // are special; anything else passes through verbatim.
                    match chars.next() {
                        Some(next) if next == q || next == '\\' => current.push(next),
                        Some(next) => {
                            current.push('\\');
                            current.push(next);
                        }
                        None => current.push('\\'),
                    }
                } else if c == q {
                    quote = None;
                    parts.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                } else if c == ' ' || c == '\t' {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                    }
                } else {
                    current.push(c);
                }
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
