//! Lenient numeric parsing for tree keys.
//!
//! Keys are strings, but many carry numbers (ranks, offsets, sizes,
//! checksums). These helpers parse a numeric prefix and ignore trailing
//! text, so `"12abc"` reads as 12 and `"abc"` reads as 0. Out-of-range
//! values saturate instead of wrapping.

/// Split off optional leading whitespace and a sign.
fn split_sign(s: &str) -> (bool, &str) {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

/// Pick a radix from the prefix: `0x` means hex, a leading `0` means octal.
fn split_radix(s: &str) -> (u32, &str) {
    if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if rest.starts_with(|c: char| c.is_ascii_hexdigit()) {
            return (16, rest);
        }
        // "0x" with no hex digits parses as the single digit 0
        return (8, "0");
    }
    if s.len() > 1 && s.starts_with('0') {
        return (8, &s[1..]);
    }
    (10, s)
}

/// Accumulate leading digits of `s` in `radix`, saturating at `u64::MAX`.
///
/// Returns `None` if there are no digits at all.
fn accumulate(s: &str, radix: u32) -> Option<(u64, bool)> {
    let mut value: u64 = 0;
    let mut overflow = false;
    let mut any = false;
    for c in s.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        any = true;
        match value
            .checked_mul(radix as u64)
            .and_then(|v| v.checked_add(d as u64))
        {
            Some(v) => value = v,
            None => overflow = true,
        }
    }
    any.then_some((value, overflow))
}

/// Decimal prefix parse into `i32`, 0 when nothing parses.
pub fn atoi(s: &str) -> i32 {
    let (negative, digits) = split_sign(s);
    let Some((value, overflow)) = accumulate(digits, 10) else {
        return 0;
    };
    clamp_signed(negative, value, overflow, i32::MIN as i64, i32::MAX as i64) as i32
}

/// Prefix parse into `u64` with radix detection.
///
/// Returns `None` if no digits are present.
pub fn parse_u64(s: &str) -> Option<u64> {
    let (negative, rest) = split_sign(s);
    let (radix, digits) = split_radix(rest);
    let (value, overflow) = accumulate(digits, radix)?;
    if overflow {
        return Some(u64::MAX);
    }
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Prefix parse into `i64` with radix detection, saturating on overflow.
///
/// Returns `None` if no digits are present.
pub fn parse_i64(s: &str) -> Option<i64> {
    let (negative, rest) = split_sign(s);
    let (radix, digits) = split_radix(rest);
    let (value, overflow) = accumulate(digits, radix)?;
    Some(clamp_signed(negative, value, overflow, i64::MIN, i64::MAX))
}

/// Prefix parse of a floating point number.
///
/// Returns `None` if no number is present.
pub fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim_start();
    // longest prefix that parses as a float
    let end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .filter(|&i| s[..i].parse::<f64>().is_ok())
        .last()?;
    s[..end].parse().ok()
}

fn clamp_signed(negative: bool, value: u64, overflow: bool, min: i64, max: i64) -> i64 {
    if negative {
        if overflow || value > min.unsigned_abs() {
            min
        } else {
            (value as i128).wrapping_neg() as i64
        }
    } else if overflow || value > max as u64 {
        max
    } else {
        value as i64
    }
}
