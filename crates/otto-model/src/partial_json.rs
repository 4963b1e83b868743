// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Fault-tolerant parsing of streamed JSON prefixes.
//!
//! Tool-call arguments arrive as concatenated fragments of a JSON object.
//! After every fragment the accumulated prefix is re-parsed so partial
//! arguments are usable before the call is complete.  Closed structural
//! delimiters bind; an unclosed string value is closed where the input ends;
//! a trailing incomplete token (dangling key, half literal, partial escape)
//! is dropped back to the last point where the prefix was completable.
//! The result is always a JSON object.

use serde_json::{Map, Value};

/// Parse a (possibly truncated) JSON object prefix, returning the best
/// partial object so far.  Unparseable input degrades to `{}`.
pub fn parse_partial(fragment: &str) -> Value {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return Value::Object(Map::new());
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return into_object(value);
    }
    match complete_prefix(trimmed) {
        Some(repaired) => match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => into_object(value),
            Err(_) => Value::Object(Map::new()),
        },
        None => Value::Object(Map::new()),
    }
}

fn into_object(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        Value::Object(Map::new())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Frame {
    Object,
    Array,
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// Top level, before any value
    TopValue,
    /// Top level, after the value
    TopDone,
    /// Inside an object, expecting a key or `}`
    Key,
    /// Inside an object, expecting `:`
    Colon,
    /// Inside an object, expecting a value
    ObjValue,
    /// Inside a container, expecting `,` or the closer
    Comma,
    /// Inside an array, expecting a value or `]`
    ArrValue,
}

/// Try to turn a structurally-truncated JSON prefix into valid JSON.
/// Returns `None` when the input is malformed rather than merely truncated.
fn complete_prefix(s: &str) -> Option<String> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut mode = Mode::TopValue;
    // Byte offset + closer snapshot of the last completable prefix.
    let mut safe: Option<(usize, Vec<char>)> = None;

    let closers = |stack: &[Frame]| -> Vec<char> {
        stack
            .iter()
            .rev()
            .map(|frame| match frame {
                Frame::Object => '}',
                Frame::Array => ']',
            })
            .collect()
    };

    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    'scan: while i < len {
        let c = bytes[i] as char;
        match mode {
            Mode::TopValue | Mode::ObjValue | Mode::ArrValue | Mode::Key => match c {
                ' ' | '\t' | '\n' | '\r' => i += 1,
                '{' if mode != Mode::Key => {
                    stack.push(Frame::Object);
                    mode = Mode::Key;
                    i += 1;
                    safe = Some((i, closers(&stack)));
                }
                '[' if mode != Mode::Key => {
                    stack.push(Frame::Array);
                    mode = Mode::ArrValue;
                    i += 1;
                    safe = Some((i, closers(&stack)));
                }
                '}' if mode == Mode::Key => {
                    // Empty object (or trailing half-pair was never started)
                    stack.pop();
                    i += 1;
                    mode = after_value(&stack);
                    safe = Some((i, closers(&stack)));
                }
                ']' if mode == Mode::ArrValue => {
                    stack.pop();
                    i += 1;
                    mode = after_value(&stack);
                    safe = Some((i, closers(&stack)));
                }
                '"' => {
                    let is_key = mode == Mode::Key;
                    match scan_string(bytes, i + 1) {
                        StringScan::Closed(end) => {
                            i = end;
                            if is_key {
                                mode = Mode::Colon;
                            } else {
                                mode = after_value(&stack);
                                safe = Some((i, closers(&stack)));
                            }
                        }
                        StringScan::Unterminated { safe_end } => {
                            if is_key {
                                // Dangling key: drop back to the last safe point.
                                break 'scan;
                            }
                            // Unclosed string value: close it where it ends.
                            let mut out = String::with_capacity(safe_end + stack.len() + 1);
                            out.push_str(&s[..safe_end]);
                            out.push('"');
                            out.extend(closers(&stack));
                            return Some(out);
                        }
                        StringScan::Malformed => return None,
                    }
                }
                _ if mode == Mode::Key => return None,
                _ => {
                    // Number or literal token
                    let end = scan_token(bytes, i);
                    let token = &s[i..end];
                    if end == len {
                        // Token runs to the end of input: keep it only when
                        // it is already a complete value.
                        if token_is_complete(token) {
                            mode = after_value(&stack);
                            safe = Some((end, closers(&stack)));
                        }
                        break 'scan;
                    }
                    if !token_is_complete(token) {
                        return None;
                    }
                    i = end;
                    mode = after_value(&stack);
                    safe = Some((i, closers(&stack)));
                }
            },
            Mode::Colon => match c {
                ' ' | '\t' | '\n' | '\r' => i += 1,
                ':' => {
                    mode = Mode::ObjValue;
                    i += 1;
                }
                _ => return None,
            },
            Mode::Comma => match c {
                ' ' | '\t' | '\n' | '\r' => i += 1,
                ',' => {
                    mode = match stack.last() {
                        Some(Frame::Object) => Mode::Key,
                        Some(Frame::Array) => Mode::ArrValue,
                        None => return None,
                    };
                    i += 1;
                }
                '}' if matches!(stack.last(), Some(Frame::Object)) => {
                    stack.pop();
                    i += 1;
                    mode = after_value(&stack);
                    safe = Some((i, closers(&stack)));
                }
                ']' if matches!(stack.last(), Some(Frame::Array)) => {
                    stack.pop();
                    i += 1;
                    mode = after_value(&stack);
                    safe = Some((i, closers(&stack)));
                }
                _ => return None,
            },
            Mode::TopDone => break 'scan,
        }
    }

    let (end, close) = safe?;
    let mut out = String::with_capacity(end + close.len());
    out.push_str(&s[..end]);
    out.extend(close);
    Some(out)
}

fn after_value(stack: &[Frame]) -> Mode {
    match stack.last() {
        Some(_) => Mode::Comma,
        None => Mode::TopDone,
    }
}

enum StringScan {
    /// Byte offset just past the closing quote
    Closed(usize),
    /// Input ended inside the string; `safe_end` excludes any partial escape
    Unterminated { safe_end: usize },
    Malformed,
}

/// Scan a string body starting just past the opening quote.
fn scan_string(bytes: &[u8], start: usize) -> StringScan {
    let mut i = start;
    loop {
        if i >= bytes.len() {
            return StringScan::Unterminated { safe_end: i };
        }
        match bytes[i] {
            b'"' => return StringScan::Closed(i + 1),
            b'\\' => {
                if i + 1 >= bytes.len() {
                    // Trailing lone backslash: cut before it
                    return StringScan::Unterminated { safe_end: i };
                }
                match bytes[i + 1] {
                    b'u' => {
                        // \uXXXX needs four hex digits
                        let hex_end = i + 2 + 4;
                        if hex_end > bytes.len() {
                            return StringScan::Unterminated { safe_end: i };
                        }
                        if !bytes[i + 2..hex_end].iter().all(u8::is_ascii_hexdigit) {
                            return StringScan::Malformed;
                        }
                        i = hex_end;
                    }
                    b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => i += 2,
                    _ => return StringScan::Malformed,
                }
            }
            _ => i += 1,
        }
    }
}

/// End offset of a number/literal token starting at `start`.
fn scan_token(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r' => break,
            _ => i += 1,
        }
    }
    i
}

fn token_is_complete(token: &str) -> bool {
    matches!(token, "true" | "false" | "null")
        || (serde_json::from_str::<serde_json::Number>(token).is_ok())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
