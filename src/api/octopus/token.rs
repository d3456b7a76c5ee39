use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::{api::octopus::Error, prelude::*};

/// Kraken token together with the instant it stops being reused.
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Single-slot token cache scoped to one client.
///
/// The lock is held while a new token is being obtained, so at most one token request
/// is in flight per client.
pub struct TokenCache {
    lifetime: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// Tokens live for an hour, renew a bit earlier.
    pub const LIFETIME: Duration = Duration::from_mins(55);

    pub const fn new(lifetime: Duration) -> Self {
        Self { lifetime, cached: Mutex::new(None) }
    }

    /// Return the cached token, or obtain and cache a new one when it is missing or expired.
    pub fn get_or_obtain(
        &self,
        now: Instant,
        obtain: impl FnOnce() -> Result<String, Error>,
    ) -> Result<String, Error> {
        let mut cached = self.cached.lock().map_err(|_| anyhow!("the token cache is poisoned"))?;
        if let Some(cached) = cached.as_ref()
            && now < cached.expires_at
        {
            trace!("reusing the cached token");
            return Ok(cached.token.clone());
        }
        let token = obtain()?;
        *cached = Some(CachedToken { token: token.clone(), expires_at: now + self.lifetime });
        debug!(lifetime = ?self.lifetime, "obtained a new token");
        Ok(token)
    }

    /// Forget the cached token, so that the next call obtains a new one.
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Self::LIFETIME)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_reuses_until_expiry() -> Result<(), Error> {
        let cache = TokenCache::default();
        let n_calls = Cell::new(0);
        let obtain = || {
            n_calls.set(n_calls.get() + 1);
            Ok(format!("token-{}", n_calls.get()))
        };
        let now = Instant::now();

        assert_eq!(cache.get_or_obtain(now, obtain)?, "token-1");
        assert_eq!(cache.get_or_obtain(now + Duration::from_mins(54), obtain)?, "token-1");
        assert_eq!(cache.get_or_obtain(now + TokenCache::LIFETIME, obtain)?, "token-2");
        assert_eq!(n_calls.get(), 2);
        Ok(())
    }

    #[test]
    fn test_failure_is_not_cached() -> Result<(), Error> {
        let cache = TokenCache::default();
        let now = Instant::now();
        let result = cache.get_or_obtain(now, || Err(Error::Authentication("nope".to_string())));
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(cache.get_or_obtain(now, || Ok("token".to_string()))?, "token");
        Ok(())
    }

    #[test]
    fn test_invalidate() -> Result<(), Error> {
        let cache = TokenCache::default();
        let now = Instant::now();
        cache.get_or_obtain(now, || Ok("old".to_string()))?;
        cache.invalidate();
        assert_eq!(cache.get_or_obtain(now, || Ok("new".to_string()))?, "new");
        Ok(())
    }
}
