//! Rendering of snapshots as Lua table constructors.
//!
//! The output can be logged, diffed, or loaded into another interpreter
//! (`x = <literal>`) to rebuild an equal table.

use std::fmt::{self, Write};
use std::sync::OnceLock;

use regex::Regex;

use crate::table::Table;
use crate::value::{Key, Value};

const RESERVED_WORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

fn identifier_regex() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile")
    })
}

pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_match(name) && !RESERVED_WORDS.contains(&name)
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "0/0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "1/0" } else { "-1/0" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let magnitude = value.abs();
    if magnitude >= 1e15 || magnitude < 1e-5 {
        format!("{:e}", value)
    } else {
        value.to_string()
    }
}

pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_ascii_control() => {
                let _ = write!(out, "\\{:03}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Nil => f.write_str("nil"),
        Value::Boolean(flag) => write!(f, "{}", flag),
        Value::Number(number) => f.write_str(&format_number(*number)),
        Value::Text(text) => f.write_str(&quote_string(text)),
        Value::Table(table) => write!(f, "{}", table),
    }
}

fn write_key(f: &mut fmt::Formatter<'_>, key: &Key) -> fmt::Result {
    match key {
        Key::Number(number) => write!(f, "[{}]=", format_number(*number)),
        Key::Boolean(flag) => write!(f, "[{}]=", flag),
        Key::String(name) if is_identifier(name) => write!(f, "{}=", name),
        Key::String(name) => write!(f, "[{}]=", quote_string(name)),
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('{')?;
        // Positional syntax only while keys run 1, 2, 3, ... without a gap.
        let mut next_position = 1u64;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_char(',')?;
            }
            if key.as_position() == Some(next_position) {
                next_position += 1;
            } else {
                write_key(f, key)?;
            }
            write_value(f, value)?;
        }
        f.write_char('}')
    }
}
