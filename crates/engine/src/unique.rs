//! Collision-resistant input values
//!
//! Registration-style workflows reject duplicate identifying fields, so
//! scenarios that must succeed need a fresh value on every attempt. Values
//! combine wall-clock milliseconds, a per-process counter and random bits.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;

/// Generator for values that are unique within a process and very unlikely
/// to collide across processes.
#[derive(Debug)]
pub struct UniqueValueGenerator {
    counter: AtomicU64,
    /// Random per-generator tag, distinguishes generators started within the
    /// same millisecond.
    instance: u32,
}

impl UniqueValueGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            instance: rand::thread_rng().gen(),
        }
    }

    /// Generate a fresh value starting with `prefix`.
    ///
    /// The suffix only uses `[0-9a-z]`, so the result stays valid inside the
    /// local part of an email address.
    pub fn generate(&self, prefix: &str) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let entropy: u32 = rand::thread_rng().gen();

        let token = format!(
            "{}{}{:08x}{:04x}",
            base36(millis),
            base36(seq),
            self.instance,
            entropy & 0xffff
        );

        if prefix.is_empty() {
            token
        } else if prefix.ends_with(|c: char| matches!(c, '.' | '-' | '_')) {
            format!("{prefix}{token}")
        } else {
            format!("{prefix}.{token}")
        }
    }

    /// Generate a fresh email address, e.g. `johndoe.test.<token>@example.com`.
    pub fn email(&self, prefix: &str, domain: &str) -> String {
        format!("{}@{}", self.generate(prefix), domain)
    }
}

impl Default for UniqueValueGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
