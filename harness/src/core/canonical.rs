//! Canonical step encoding used for hashing.
//!
//! Byte layout is fixed: mapping keys sorted at every depth, `", "` between
//! items, `": "` between key and value, non-ASCII text emitted as UTF-8 and
//! the standard JSON string escapes. Floats use the shortest round-trip
//! digits in `repr` style (`0.5`, `100.0`, `1e+20`, `1.5e-07`). Two steps
//! with equal content always encode to equal bytes, whatever order their
//! arguments were inserted in.

use std::io;

use serde::{Serialize, Serializer};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::core::types::Step;
use crate::error::HarnessError;

/// Encode `step` canonically.
pub fn canonicalize(step: &Step) -> Result<String, HarnessError> {
    canonical_json(&step_value(step))
}

/// Encode any JSON value canonically.
pub fn canonical_json(value: &Value) -> Result<String, HarnessError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    Sorted(value).serialize(&mut ser).map_err(encoding_error)?;
    String::from_utf8(buf).map_err(encoding_error)
}

fn encoding_error(err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Validation(format!("canonical encoding failed: {err}"))
}

fn step_value(step: &Step) -> Value {
    let mut map = Map::new();
    map.insert("args".to_string(), Value::Object(step.args.clone()));
    map.insert(
        "description".to_string(),
        Value::String(step.description.clone()),
    );
    map.insert("id".to_string(), Value::from(step.id));
    map.insert("tool".to_string(), Value::String(step.tool.clone()));
    Value::Object(map)
}

/// Serializes a value with every mapping's keys in sorted order.
struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => serializer.collect_seq(items.iter().map(Sorted)),
            Value::Object(map) => {
                // `Map` iteration order depends on serde_json features.
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                serializer.collect_map(entries.into_iter().map(|(key, item)| (key, Sorted(item))))
            }
            other => other.serialize(serializer),
        }
    }
}

/// Compact JSON with spaced separators and `repr`-style floats.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_repr(value).as_bytes())
    }
}

/// Shortest round-trip digits, positional for decimal exponents in
/// `-4..16` and scientific (signed, at least two exponent digits) otherwise.
fn float_repr(value: f64) -> String {
    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let mut out = String::from(sign);
    if !(-4..16).contains(&exponent) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        out.push_str(&format!("e{exp_sign}{:02}", exponent.unsigned_abs()));
    } else if exponent < 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat((-exponent - 1) as usize));
        out.push_str(&digits);
    } else {
        let int_len = exponent as usize + 1;
        if digits.len() > int_len {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        } else {
            out.push_str(&digits);
            out.push_str(&"0".repeat(int_len - digits.len()));
            out.push_str(".0");
        }
    }
    out
}
