use std::collections::HashMap;
use std::time::{Duration, Instant};

const STATE_TTL: Duration = Duration::from_secs(300); // 5 minutes

/// A pending federated login, keyed by the `state` query parameter sent to
/// the provider.
#[derive(Debug, Clone)]
struct PendingLogin {
    provider: &'static str,
    expires_at: Instant,
}

/// Store for single-use OAuth `state` values.
pub struct OAuthStateStore {
    pending: HashMap<String, PendingLogin>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Issue a fresh state value for a login with `provider`.
    pub fn issue(&mut self, provider: &'static str, now: Instant) -> String {
        self.clear_stale(now);

        let state = generate_state();
        self.pending.insert(
            state.clone(),
            PendingLogin {
                provider,
                expires_at: now + STATE_TTL,
            },
        );
        state
    }

    /// Consume `state`. Succeeds once, only for the provider it was issued
    /// for and only before it expires.
    pub fn take(&mut self, state: &str, provider: &str, now: Instant) -> bool {
        self.clear_stale(now);

        match self.pending.remove(state) {
            Some(pending) if pending.provider == provider => true,
            Some(pending) => {
                tracing::warn!(
                    "OAuth state issued for {} presented to {}",
                    pending.provider,
                    provider
                );
                false
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    fn clear_stale(&mut self, now: Instant) {
        self.pending.retain(|_, pending| now < pending.expires_at);
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_state() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    const STATE_LEN: usize = 32;

    let mut rng = rand::thread_rng();
    (0..STATE_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
