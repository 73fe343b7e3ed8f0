//! Typed scalar values stored under the key/value convention.
//!
//! Every setter first removes the key, then stores the formatted value as
//! the single child of that key. Getters read it back with
//! [`Tree::get_val`], so a key holding several values reads as absent.
//! [`Tree::get_int`] is the exception: it takes the first child without
//! checking the count.

use tracing::error;

use crate::parse::{atoi, parse_f64, parse_i64, parse_u64};
use crate::tree::Tree;

/// Format a checksum the way it is stored: `0x`-prefixed hex, `0` for zero.
fn format_crc32(crc: u32) -> String {
    if crc == 0 {
        "0".to_string()
    } else {
        format!("{:#x}", crc)
    }
}

impl Tree {
    fn set_scalar(&mut self, key: &str, value: &str) {
        self.unset(key);
        self.set_kv(key, value);
    }

    /// Store an integer under `key`.
    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set_scalar(key, &value.to_string());
    }

    /// Read the first value under `key` as an integer.
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.first_val(key).map(atoi)
    }

    /// Store a byte count under `key`.
    pub fn set_bytecount(&mut self, key: &str, value: u64) {
        self.set_scalar(key, &value.to_string());
    }

    /// Read a byte count from `key`.
    pub fn get_bytecount(&self, key: &str) -> Option<u64> {
        self.get_val(key).and_then(parse_u64)
    }

    /// Store a CRC32 under `key` in hex.
    pub fn set_crc32(&mut self, key: &str, value: u32) {
        self.set_scalar(key, &format_crc32(value));
    }

    /// Read a CRC32 from `key`.
    pub fn get_crc32(&self, key: &str) -> Option<u32> {
        self.get_val(key).and_then(parse_u64).map(|v| v as u32)
    }

    /// Store an unsigned 64-bit integer under `key`.
    pub fn set_u64(&mut self, key: &str, value: u64) {
        self.set_scalar(key, &value.to_string());
    }

    /// Read an unsigned 64-bit integer from `key`.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_val(key).and_then(parse_u64)
    }

    /// Store a signed 64-bit integer under `key`.
    pub fn set_i64(&mut self, key: &str, value: i64) {
        self.set_scalar(key, &value.to_string());
    }

    /// Read a signed 64-bit integer from `key`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_val(key).and_then(parse_i64)
    }

    /// Store a string under `key`.
    pub fn set_str(&mut self, key: &str, value: &str) {
        self.set_scalar(key, value);
    }

    /// Read a string from `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_val(key)
    }

    /// Store a double under `key` with six fractional digits.
    pub fn set_f64(&mut self, key: &str, value: f64) {
        self.set_scalar(key, &format!("{:.6}", value));
    }

    /// Read a double from `key`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        let text = self.get_val(key)?;
        let value = parse_f64(text);
        if value.is_none() {
            error!(target: "kvtree::core", key, value = text, "Failed to parse double");
        }
        value
    }
}
