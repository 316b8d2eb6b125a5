//! Router Session Tokens
//!
//! Owns the single router session token. Tokens live in memory only, expire
//! lazily against an injectable [`Clock`], and are reacquired on demand.
//!
//! Concurrent callers that find no valid token share one in-flight login:
//! the first caller parks a shared future in the pending slot and everyone
//! else awaits that same future, so the router sees exactly one login.

use crate::error::UpstreamAuthError;
use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Default session token lifetime (5 minutes)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Router login path
const LOGIN_PATH: &str = "/cgi-bin/api/router/login";

/// Time source used for token expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// An acquired router session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    acquired_at: Instant,
    ttl: Duration,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, acquired_at: Instant, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            acquired_at,
            ttl,
        }
    }

    /// Opaque token value, sent as the `Authorization` header
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Valid iff `now < acquired_at + ttl`
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.acquired_at + self.ttl
    }
}

/// Performs the router login call
#[async_trait]
pub trait RouterLogin: Send + Sync {
    /// Log in and return the raw token value
    async fn login(&self) -> Result<String, UpstreamAuthError>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Router login over HTTP
///
/// `POST http://{host}/cgi-bin/api/router/login?_={unix_secs}` with a
/// form-encoded `pwd`, answered by `{"token": "..."}`.
#[derive(Clone)]
pub struct RouterLoginClient {
    client: Client,
    host: String,
    password: Zeroizing<String>,
}

impl RouterLoginClient {
    pub fn new(client: Client, host: impl Into<String>, password: Zeroizing<String>) -> Self {
        Self {
            client,
            host: host.into(),
            password,
        }
    }

    fn login_url(&self) -> String {
        format!("http://{}{}", self.host, LOGIN_PATH)
    }
}

#[async_trait]
impl RouterLogin for RouterLoginClient {
    async fn login(&self) -> Result<String, UpstreamAuthError> {
        info!(host = %self.host, "logging in to router");

        let response = self
            .client
            .post(self.login_url())
            .query(&[("_", chrono::Utc::now().timestamp())])
            .form(&[("pwd", self.password.as_str())])
            .send()
            .await
            .map_err(|e| UpstreamAuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamAuthError::Rejected(status.as_u16()));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| UpstreamAuthError::MalformedResponse(e.to_string()))?;

        match body.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(UpstreamAuthError::MalformedResponse(
                "missing token field".to_string(),
            )),
        }
    }
}

type PendingLogin = Shared<BoxFuture<'static, Result<SessionToken, UpstreamAuthError>>>;

#[derive(Default)]
struct SessionState {
    token: Option<SessionToken>,
    /// In-flight login, tagged with its attempt number
    pending: Option<(u64, PendingLogin)>,
    attempts: u64,
}

/// Process-scoped owner of the router session token
pub struct SessionTokenManager {
    login: Arc<dyn RouterLogin>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl SessionTokenManager {
    pub fn new(login: Arc<dyn RouterLogin>, ttl: Duration) -> Self {
        Self::with_clock(login, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(login: Arc<dyn RouterLogin>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            login,
            clock,
            ttl,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a valid token, logging in only when none is cached and no
    /// login is already in flight.
    ///
    /// The login itself runs on its own task, so it completes and settles
    /// the session state even if every caller waiting on it is dropped.
    pub async fn acquire(&self) -> Result<SessionToken, UpstreamAuthError> {
        let pending = {
            let mut state = self.state.lock();
            let now = self.clock.now();

            if let Some(token) = state.token.as_ref().filter(|t| t.is_valid_at(now)) {
                return Ok(token.clone());
            }
            state.token = None;

            match state.pending.clone() {
                Some((attempt, pending)) => {
                    debug!(attempt, "joining in-flight router login");
                    pending
                }
                None => {
                    state.attempts += 1;
                    let attempt = state.attempts;
                    let pending = self.start_login(attempt);
                    state.pending = Some((attempt, pending.clone()));
                    debug!(attempt, "starting router login");
                    pending
                }
            }
        };

        pending.await
    }

    fn start_login(&self, attempt: u64) -> PendingLogin {
        let login = Arc::clone(&self.login);
        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;

        let task = tokio::spawn(async move {
            let outcome = login
                .login()
                .await
                .map(|value| SessionToken::new(value, clock.now(), ttl));

            let mut state = state.lock();
            if state.pending.as_ref().map(|(a, _)| *a) == Some(attempt) {
                state.pending = None;
                match &outcome {
                    Ok(token) => {
                        info!(attempt, "logged in to router");
                        state.token = Some(token.clone());
                    }
                    Err(e) => warn!(attempt, error = %e, "router login failed"),
                }
            }

            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(UpstreamAuthError::Unreachable(format!("login task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Clock that only moves when told to
    pub(crate) struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.offset.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock()
        }
    }

    /// Login stub that counts calls and answers after a short delay
    pub(crate) struct CountingLogin {
        pub(crate) calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingLogin {
        pub(crate) fn ok(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                fail: false,
            }
        }

        pub(crate) fn failing(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                fail: true,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RouterLogin for CountingLogin {
        async fn login(&self) -> Result<String, UpstreamAuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(UpstreamAuthError::Rejected(403))
            } else {
                Ok(format!("token-{}", n))
            }
        }
    }

    #[test]
    fn test_token_validity_window() {
        let now = Instant::now();
        let token = SessionToken::new("abc", now, Duration::from_secs(10));

        assert!(token.is_valid_at(now));
        assert!(token.is_valid_at(now + Duration::from_secs(9)));
        assert!(!token.is_valid_at(now + Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_logs_in_once() {
        let login = Arc::new(CountingLogin::ok(Duration::from_millis(50)));
        let manager = Arc::new(SessionTokenManager::new(login.clone(), DEFAULT_TOKEN_TTL));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire().await })
            })
            .collect();

        let tokens: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(login.calls(), 1);
        assert!(tokens.iter().all(|t| t.value() == "token-1"));
    }

    #[tokio::test]
    async fn test_concurrent_failure_shared_by_all_waiters() {
        let login = Arc::new(CountingLogin::failing(Duration::from_millis(50)));
        let manager = Arc::new(SessionTokenManager::new(login.clone(), DEFAULT_TOKEN_TTL));

        let results = join_all((0..8).map(|_| manager.acquire())).await;

        assert_eq!(login.calls(), 1);
        assert!(results
            .iter()
            .all(|r| r.as_ref().unwrap_err() == &UpstreamAuthError::Rejected(403)));

        // Nothing cached, the next call tries again
        assert!(manager.acquire().await.is_err());
        assert_eq!(login.calls(), 2);
    }

    #[tokio::test]
    async fn test_cached_token_skips_login() {
        let login = Arc::new(CountingLogin::ok(Duration::ZERO));
        let manager = SessionTokenManager::new(login.clone(), DEFAULT_TOKEN_TTL);

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let login = Arc::new(CountingLogin::ok(Duration::ZERO));
        let clock = Arc::new(ManualClock::new());
        let ttl = Duration::from_secs(300);
        let manager = SessionTokenManager::with_clock(login.clone(), ttl, clock.clone());

        let first = manager.acquire().await.unwrap();

        clock.advance(ttl - Duration::from_secs(1));
        let still = manager.acquire().await.unwrap();
        assert_eq!(still, first);
        assert_eq!(login.calls(), 1);

        clock.advance(Duration::from_secs(1));
        let renewed = manager.acquire().await.unwrap();
        assert_eq!(renewed.value(), "token-2");
        assert_eq!(login.calls(), 2);

        let again = manager.acquire().await.unwrap();
        assert_eq!(again, renewed);
        assert_eq!(login.calls(), 2);
    }

    #[tokio::test]
    async fn test_login_completes_after_waiter_dropped() {
        let login = Arc::new(CountingLogin::ok(Duration::from_millis(100)));
        let manager = SessionTokenManager::new(login.clone(), DEFAULT_TOKEN_TTL);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), manager.acquire()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        let token = manager.acquire().await.unwrap();
        assert_eq!(token.value(), "token-1");
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_login_after_waiter_dropped_retries() {
        let login = Arc::new(CountingLogin::failing(Duration::from_millis(100)));
        let manager = SessionTokenManager::new(login.clone(), DEFAULT_TOKEN_TTL);

        let abandoned = tokio::time::timeout(Duration::from_millis(10), manager.acquire()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(login.calls(), 1);

        // Settled attempt is gone, so this call reaches the router again
        assert!(manager.acquire().await.is_err());
        assert_eq!(login.calls(), 2);
    }

    #[tokio::test]
    async fn test_token_stamped_at_login_time() {
        let login = Arc::new(CountingLogin::ok(Duration::from_millis(50)));
        let clock = Arc::new(ManualClock::new());
        let manager =
            SessionTokenManager::with_clock(login.clone(), DEFAULT_TOKEN_TTL, clock.clone());
        let before = clock.now();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), manager.acquire()).await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_millis(200)).await;

        clock.advance(Duration::from_secs(60));
        let token = manager.acquire().await.unwrap();
        assert_eq!(token.acquired_at(), before);
    }

    #[test]
    fn test_login_url() {
        let client = RouterLoginClient::new(
            Client::new(),
            "192.168.8.1",
            Zeroizing::new("secret".to_string()),
        );
        assert_eq!(
            client.login_url(),
            "http://192.168.8.1/cgi-bin/api/router/login"
        );
    }
}
