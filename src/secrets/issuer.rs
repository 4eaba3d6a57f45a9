//! Issued secret tracking.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;

use super::SecretError;
use crate::config::{SecretPolicy, SecretsConfig};
use crate::observability::metrics;

/// Random bytes per token (128 bits).
pub const TOKEN_BYTES: usize = 16;

/// Longest gap between two full sweeps triggered by `issue`.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A freshly issued secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken {
    value: String,
    ttl: Duration,
}

impl SecretToken {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

// Keep the token value out of logs.
impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretToken")
            .field("value", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct IssuedSecret {
    issued_at: Instant,
}

impl IssuedSecret {
    fn is_live(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) < ttl
    }
}

/// Issues secrets and tracks which ones are currently valid.
pub struct SecretIssuer {
    secrets: DashMap<String, IssuedSecret>,
    ttl: Duration,
    policy: SecretPolicy,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl SecretIssuer {
    pub fn new(ttl: Duration, policy: SecretPolicy) -> Self {
        Self {
            secrets: DashMap::new(),
            ttl,
            policy,
            sweep_interval: SWEEP_INTERVAL.min(ttl),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Override how often `issue` sweeps expired secrets.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn from_config(config: &SecretsConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.policy)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn policy(&self) -> SecretPolicy {
        self.policy
    }

    /// Generate and record a new secret.
    ///
    /// At most once per sweep interval this also drops every expired entry,
    /// so the set stays bounded by the issue rate over one TTL plus one
    /// interval.
    pub fn issue(&self) -> SecretToken {
        self.issue_at(Instant::now())
    }

    fn issue_at(&self, now: Instant) -> SecretToken {
        self.maybe_sweep(now);

        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let value = to_hex(&bytes);

        self.secrets
            .insert(value.clone(), IssuedSecret { issued_at: now });
        metrics::record_secret_issued();
        tracing::debug!(outstanding = self.secrets.len(), "Secret issued");

        SecretToken {
            value,
            ttl: self.ttl,
        }
    }

    /// Whether `token` is outstanding and unexpired. Expired tokens are
    /// dropped as a side effect.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Instant::now())
    }

    fn validate_at(&self, token: &str, now: Instant) -> bool {
        let live = match self.secrets.get(token) {
            Some(entry) => entry.is_live(self.ttl, now),
            None => return false,
        };
        if !live {
            let ttl = self.ttl;
            self.secrets.remove_if(token, |_, s| !s.is_live(ttl, now));
        }
        live
    }

    /// Invalidate `token`. Unknown tokens are ignored.
    pub fn consume(&self, token: &str) {
        self.secrets.remove(token);
    }

    /// Check `token` for one request, applying the configured policy.
    ///
    /// Under [`SecretPolicy::SingleUse`] the token is removed in the same
    /// step, so of two concurrent requests carrying it only one succeeds.
    pub fn redeem(&self, token: &str) -> Result<(), SecretError> {
        self.redeem_at(token, Instant::now())
    }

    fn redeem_at(&self, token: &str, now: Instant) -> Result<(), SecretError> {
        match self.policy {
            SecretPolicy::SingleUse => match self.secrets.remove(token) {
                Some((_, secret)) if secret.is_live(self.ttl, now) => Ok(()),
                Some(_) => Err(SecretError::Expired),
                None => Err(SecretError::Unknown),
            },
            SecretPolicy::Session => {
                if self.validate_at(token, now) {
                    Ok(())
                } else {
                    Err(SecretError::Unknown)
                }
            }
        }
    }

    /// Sweep if the last sweep is older than the interval. Concurrent
    /// issuers skip rather than wait while another one sweeps.
    fn maybe_sweep(&self, now: Instant) -> Option<usize> {
        let mut last = self.last_sweep.try_lock().ok()?;
        if now.saturating_duration_since(*last) < self.sweep_interval {
            return None;
        }
        *last = now;
        drop(last);
        Some(self.sweep(now))
    }

    /// Drop every expired secret.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        if let Ok(mut last) = self.last_sweep.lock() {
            *last = now;
        }
        self.sweep(now)
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.secrets.len();
        let ttl = self.ttl;
        self.secrets.retain(|_, s| s.is_live(ttl, now));
        let purged = before.saturating_sub(self.secrets.len());
        if purged > 0 {
            tracing::debug!(purged, outstanding = self.secrets.len(), "Expired secrets swept");
        }
        purged
    }

    /// Number of secrets currently held, expired or not.
    pub fn outstanding(&self) -> usize {
        self.secrets.len()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}
