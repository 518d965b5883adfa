// src/services/rate_limit.rs
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Paths that get the strict credential bucket
pub const DEFAULT_STRICT_PATHS: &[&str] = &["/api/auth/login", "/api/access/register"];

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_limit: u32,
    pub anonymous_limit: u32,
    pub per_ip_limit: u32,
    pub window_seconds: u32,
    /// Attempts per IP on credential endpoints
    pub strict_limit: u32,
    pub strict_window_seconds: u32,
    pub strict_paths: Vec<String>,
    pub whitelist_ips: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            authenticated_limit: 100, // per minute
            anonymous_limit: 20,
            per_ip_limit: 50,
            window_seconds: 60,
            strict_limit: 5, // per 15 minutes
            strict_window_seconds: 900,
            strict_paths: DEFAULT_STRICT_PATHS.iter().map(|p| p.to_string()).collect(),
            whitelist_ips: Vec::new(),
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    env::var(name).ok().and_then(|v| v.parse::<u32>().ok())
}

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl RateLimitConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // RATE_LIMIT_ENABLED - set to "false" to disable rate limiting
        if let Ok(enabled) = env::var("RATE_LIMIT_ENABLED") {
            config.enabled = enabled.to_lowercase() != "false";
        }
        if let Some(val) = env_u32("RATE_LIMIT_AUTHENTICATED") {
            config.authenticated_limit = val;
        }
        if let Some(val) = env_u32("RATE_LIMIT_ANONYMOUS") {
            config.anonymous_limit = val;
        }
        if let Some(val) = env_u32("RATE_LIMIT_PER_IP") {
            config.per_ip_limit = val;
        }
        if let Some(val) = env_u32("RATE_LIMIT_WINDOW_SECONDS") {
            config.window_seconds = val;
        }
        if let Some(val) = env_u32("RATE_LIMIT_STRICT") {
            config.strict_limit = val;
        }
        if let Some(val) = env_u32("RATE_LIMIT_STRICT_WINDOW_SECONDS") {
            config.strict_window_seconds = val;
        }
        // RATE_LIMIT_STRICT_PATHS - comma-separated exact paths
        if let Ok(paths) = env::var("RATE_LIMIT_STRICT_PATHS") {
            config.strict_paths = comma_list(&paths);
        }
        // RATE_LIMIT_WHITELIST_IPS - comma-separated list of whitelisted IPs
        if let Ok(whitelist) = env::var("RATE_LIMIT_WHITELIST_IPS") {
            config.whitelist_ips = comma_list(&whitelist);
        }

        config
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitState {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl RateLimitState {
    fn new(window: Duration) -> Self {
        Self {
            count: 1,
            window_start: Instant::now(),
            window,
        }
    }

    fn reset(&mut self) {
        self.count = 1;
        self.window_start = Instant::now();
    }

    fn is_expired(&self) -> bool {
        self.window_start.elapsed() > self.window
    }

    fn retry_after(&self) -> u32 {
        self.window
            .saturating_sub(self.window_start.elapsed())
            .as_secs()
            .max(1) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: u32 },
}

/// In-memory fixed-window limiter keyed by caller and by IP
#[derive(Debug, Clone)]
pub struct RateLimitService {
    config: RateLimitConfig,
    rate_limiter: Arc<RwLock<HashMap<String, RateLimitState>>>,
}

impl RateLimitService {
    pub fn new(config: RateLimitConfig) -> Self {
        info!(
            enabled = config.enabled,
            authenticated_limit = config.authenticated_limit,
            anonymous_limit = config.anonymous_limit,
            per_ip_limit = config.per_ip_limit,
            window_seconds = config.window_seconds,
            strict_limit = config.strict_limit,
            strict_window_seconds = config.strict_window_seconds,
            strict_paths = ?config.strict_paths,
            "Initializing RateLimitService"
        );
        Self {
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn is_whitelisted(&self, ip: &str) -> bool {
        self.config.whitelist_ips.iter().any(|allowed| allowed == ip)
    }

    pub fn is_strict_path(&self, path: &str) -> bool {
        self.config.strict_paths.iter().any(|p| p == path)
    }

    /// General per-caller and per-IP limits
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        ip_address: Option<&str>,
        is_authenticated: bool,
    ) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }
        if ip_address.map(|ip| self.is_whitelisted(ip)).unwrap_or(false) {
            return RateLimitResult::Allowed;
        }

        let limit = if is_authenticated {
            self.config.authenticated_limit
        } else {
            self.config.anonymous_limit
        };
        let window = Duration::from_secs(self.config.window_seconds as u64);

        let user_result = self.check_limit_for_key(identifier, limit, window).await;
        if let RateLimitResult::Limited { .. } = user_result {
            return user_result;
        }

        if let Some(ip) = ip_address {
            let ip_key = format!("ip:{}", ip);
            return self
                .check_limit_for_key(&ip_key, self.config.per_ip_limit, window)
                .await;
        }

        RateLimitResult::Allowed
    }

    /// Strict bucket for credential endpoints, counted per path and IP
    pub async fn check_strict(&self, path: &str, ip_address: Option<&str>) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }
        if ip_address.map(|ip| self.is_whitelisted(ip)).unwrap_or(false) {
            return RateLimitResult::Allowed;
        }

        let key = format!("strict:{}:{}", path, ip_address.unwrap_or("unknown"));
        let window = Duration::from_secs(self.config.strict_window_seconds as u64);
        self.check_limit_for_key(&key, self.config.strict_limit, window)
            .await
    }

    async fn check_limit_for_key(&self, key: &str, limit: u32, window: Duration) -> RateLimitResult {
        let mut limiter = self.rate_limiter.write().await;

        let state = match limiter.get_mut(key) {
            Some(state) => state,
            None => {
                if limit == 0 {
                    return RateLimitResult::Limited {
                        retry_after: window.as_secs().max(1) as u32,
                    };
                }
                limiter.insert(key.to_string(), RateLimitState::new(window));
                return RateLimitResult::Allowed;
            }
        };

        if state.is_expired() {
            state.reset();
            return RateLimitResult::Allowed;
        }

        if state.count >= limit {
            return RateLimitResult::Limited {
                retry_after: state.retry_after(),
            };
        }

        state.count += 1;
        RateLimitResult::Allowed
    }

    pub fn log_violation(&self, identifier: &str, ip_address: Option<&str>, endpoint: &str) {
        warn!(
            identifier = %identifier,
            ip_address = ?ip_address,
            endpoint = %endpoint,
            "Rate limit violation detected"
        );
    }

    /// Drop windows that have run out
    pub async fn cleanup_expired(&self) -> usize {
        let mut limiter = self.rate_limiter.write().await;
        let before = limiter.len();
        limiter.retain(|_, state| !state.is_expired());
        let removed = before - limiter.len();
        debug!(removed, remaining = limiter.len(), "Cleaned up expired rate limit entries");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(config: RateLimitConfig) -> RateLimitService {
        RateLimitService::new(config)
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_when_exceeded() {
        let service = service_with(RateLimitConfig {
            authenticated_limit: 3,
            per_ip_limit: 100,
            ..RateLimitConfig::default()
        });

        for _ in 0..3 {
            let result = service
                .check_rate_limit("user123", Some("192.0.2.10"), true)
                .await;
            assert_eq!(result, RateLimitResult::Allowed);
        }

        match service
            .check_rate_limit("user123", Some("192.0.2.10"), true)
            .await
        {
            RateLimitResult::Limited { retry_after } => assert!(retry_after >= 1 && retry_after <= 60),
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_different_users_have_separate_limits() {
        let service = service_with(RateLimitConfig {
            authenticated_limit: 2,
            ..RateLimitConfig::default()
        });

        for _ in 0..3 {
            service.check_rate_limit("user1", Some("192.0.2.1"), true).await;
        }

        let result = service.check_rate_limit("user2", Some("192.0.2.2"), true).await;
        assert_eq!(result, RateLimitResult::Allowed);
    }

    #[tokio::test]
    async fn test_per_ip_limit_spans_identifiers() {
        let service = service_with(RateLimitConfig {
            per_ip_limit: 2,
            ..RateLimitConfig::default()
        });

        assert_eq!(
            service.check_rate_limit("anon:a", Some("198.51.100.7"), false).await,
            RateLimitResult::Allowed
        );
        assert_eq!(
            service.check_rate_limit("anon:b", Some("198.51.100.7"), false).await,
            RateLimitResult::Allowed
        );
        assert!(matches!(
            service.check_rate_limit("anon:c", Some("198.51.100.7"), false).await,
            RateLimitResult::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn test_strict_bucket_is_per_path_and_ip() {
        let service = service_with(RateLimitConfig::default());
        assert!(service.is_strict_path("/api/auth/login"));
        assert!(service.is_strict_path("/api/access/register"));
        assert!(!service.is_strict_path("/api/access/register/abc"));

        for _ in 0..5 {
            assert_eq!(
                service.check_strict("/api/auth/login", Some("203.0.113.9")).await,
                RateLimitResult::Allowed
            );
        }
        match service.check_strict("/api/auth/login", Some("203.0.113.9")).await {
            RateLimitResult::Limited { retry_after } => {
                assert!(retry_after > 800 && retry_after <= 900)
            }
            other => panic!("expected Limited, got {:?}", other),
        }

        // Other path and other IP keep their own counts
        assert_eq!(
            service.check_strict("/api/access/register", Some("203.0.113.9")).await,
            RateLimitResult::Allowed
        );
        assert_eq!(
            service.check_strict("/api/auth/login", Some("203.0.113.10")).await,
            RateLimitResult::Allowed
        );
    }

    #[tokio::test]
    async fn test_whitelist_and_disabled_bypass() {
        let service = service_with(RateLimitConfig {
            strict_limit: 1,
            whitelist_ips: vec!["10.0.0.1".to_string()],
            ..RateLimitConfig::default()
        });
        for _ in 0..10 {
            assert_eq!(
                service.check_strict("/api/auth/login", Some("10.0.0.1")).await,
                RateLimitResult::Allowed
            );
        }

        let disabled = service_with(RateLimitConfig {
            strict_limit: 0,
            ..RateLimitConfig::disabled()
        });
        assert_eq!(
            disabled.check_strict("/api/auth/login", Some("192.0.2.1")).await,
            RateLimitResult::Allowed
        );
    }

    #[tokio::test]
    async fn test_cleanup_keeps_live_windows() {
        let service = service_with(RateLimitConfig::default());
        service.check_rate_limit("user1", None, true).await;
        service.check_strict("/api/auth/login", None).await;

        assert_eq!(service.cleanup_expired().await, 0);
    }
}
