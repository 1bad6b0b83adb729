use std::time::Instant;

use hqts_common::{BITS_PER_BYTE, MICROS_PER_SEC};

/// Byte-granular token bucket with lazy refill.
///
/// Tokens accrue at `rate_bps` and are clamped to `capacity_bytes`. There is
/// no background refill task: every public operation settles the accrual for
/// the wall time elapsed since the previous settlement, then acts.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity_bytes: u64,
    tokens_bytes: u64,
    rate_bps: u64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a bucket that starts full.
    pub fn new(rate_bps: u64, capacity_bytes: u64) -> Self {
        Self { capacity_bytes, tokens_bytes: capacity_bytes, rate_bps, last_refill: Instant::now() }
    }

    /// Adds `elapsed_us * rate / (8 * 10^6)` bytes of tokens, floor division,
    /// clamped at capacity. Integer arithmetic only.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed_us = now.duration_since(self.last_refill).as_micros() as u64;
        if elapsed_us > 0 {
            let new_tokens =
                elapsed_us.saturating_mul(self.rate_bps) / (BITS_PER_BYTE * MICROS_PER_SEC);
            if new_tokens > 0 {
                self.tokens_bytes = self.capacity_bytes.min(self.tokens_bytes + new_tokens);
            }
        }
        self.last_refill = now;
    }

    /// Debits `tokens` bytes if available. `consume(0)` always succeeds.
    pub fn consume(&mut self, tokens: u64) -> bool {
        self.refill();
        if self.tokens_bytes >= tokens {
            self.tokens_bytes -= tokens;
            true
        } else {
            false
        }
    }

    /// Token count after settling pending accrual.
    pub fn available_tokens(&mut self) -> u64 {
        self.refill();
        self.tokens_bytes
    }

    /// Whether a packet of `len` bytes would conform right now, without
    /// debiting the bucket.
    pub fn is_conforming(&mut self, len: u64) -> bool {
        self.refill();
        self.tokens_bytes >= len
    }

    /// Changes the accrual rate. Pending accrual is settled at the old rate
    /// first.
    pub fn set_rate(&mut self, rate_bps: u64) {
        self.refill();
        self.rate_bps = rate_bps;
    }

    /// Changes the capacity, clamping the current tokens to it.
    pub fn set_capacity(&mut self, capacity_bytes: u64) {
        self.refill();
        self.capacity_bytes = capacity_bytes;
        self.tokens_bytes = self.tokens_bytes.min(capacity_bytes);
    }

    pub fn rate_bps(&self) -> u64 {
        self.rate_bps
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}
