//! Content stream serialization.
//!
//! Writes operands and operators back into PDF content syntax. Numbers
//! use the compact fixed-point form PDF writers conventionally emit: no
//! exponent, five decimals below 1, two decimals up to 32767, integers
//! beyond that, trailing zeros trimmed.

use crate::tokenizer::{Operand, Operator, is_delimiter};

/// Format a number for a content stream.
///
/// Magnitudes below 0.000015 print as `0`; non-finite values print as `0`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut d = value.abs();
    if d < 0.000015 {
        return "0".to_string();
    }
    let body = if d < 1.0 {
        d += 0.000005;
        if d >= 1.0 {
            "1".to_string()
        } else {
            let scaled = (d * 100_000.0) as u32;
            let digits = format!("{scaled:05}");
            format!("0.{}", digits.trim_end_matches('0'))
        }
    } else if d <= 32767.0 {
        d += 0.005;
        let scaled = (d * 100.0) as u64;
        let (whole, frac) = (scaled / 100, scaled % 100);
        if frac == 0 {
            whole.to_string()
        } else {
            let digits = format!("{frac:02}");
            format!("{whole}.{}", digits.trim_end_matches('0'))
        }
    } else {
        ((d + 0.5) as u64).to_string()
    };
    if value < 0.0 { format!("-{body}") } else { body }
}

/// Append a name with `#xx` escapes for bytes outside the regular set.
pub fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &b in name.as_bytes() {
        if b == b'#' || !(0x21..=0x7E).contains(&b) || is_delimiter(b) {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        } else {
            out.push(b);
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for b in bytes {
        out.extend_from_slice(format!("{b:02X}").as_bytes());
    }
    out.push(b'>');
}

/// Append one operand in content stream syntax.
pub fn write_operand(out: &mut Vec<u8>, operand: &Operand) {
    match operand {
        Operand::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Operand::Real(r) => out.extend_from_slice(format_number(*r).as_bytes()),
        Operand::Name(n) => write_name(out, n),
        Operand::LiteralString(s) => write_literal_string(out, s),
        Operand::HexString(s) => write_hex_string(out, s),
        Operand::Array(items) => {
            out.push(b'[');
            write_joined(out, items);
            out.push(b']');
        }
        Operand::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Operand::Null => out.extend_from_slice(b"null"),
        Operand::Dictionary(entries) => {
            out.extend_from_slice(b"<<");
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_name(out, key);
                out.push(b' ');
                write_operand(out, value);
            }
            out.extend_from_slice(b">>");
        }
    }
}

fn write_joined(out: &mut Vec<u8>, operands: &[Operand]) {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        write_operand(out, operand);
    }
}

/// Append an operator with its operands, separated by single spaces.
///
/// Inline images are written back as `BI <entries> ID <data> EI`. No line
/// terminator is added.
pub fn write_operator(out: &mut Vec<u8>, op: &Operator) {
    if let ("BI", [Operand::Array(entries), Operand::LiteralString(data)]) =
        (op.name.as_str(), op.operands.as_slice())
    {
        out.extend_from_slice(b"BI");
        for entry in entries {
            out.push(b' ');
            write_operand(out, entry);
        }
        out.extend_from_slice(b" ID ");
        out.extend_from_slice(data);
        out.extend_from_slice(b"\nEI");
        return;
    }
    write_joined(out, &op.operands);
    if !op.operands.is_empty() {
        out.push(b' ');
    }
    out.extend_from_slice(op.name.as_bytes());
}

/// Append device color components followed by an operator and newline,
/// e.g. `0 1 1 0 k\n`.
pub fn write_color_operator(out: &mut Vec<u8>, components: &[f32], operator: &str) {
    for c in components {
        out.extend_from_slice(format_number(f64::from(*c)).as_bytes());
        out.push(b' ');
    }
    out.extend_from_slice(operator.as_bytes());
    out.push(b'\n');
}
