//! Engine configuration.

use crate::conn::DropPolicy;

/// Default `User-Agent` sent when a request carries none of its own.
pub const DEFAULT_USER_AGENT: &str = concat!("pollwire/", env!("CARGO_PKG_VERSION"));

/// Default redirect hop limit for the HTTP engine.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Tunables applied to every task and connection an engine creates.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `User-Agent` value used when the request has none.
    pub user_agent: String,
    /// Redirect hops followed before the request fails.
    pub max_redirects: usize,
    /// What happens to queued outbound units when the last connection
    /// handle is released.
    pub drop_policy: DropPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            drop_policy: DropPolicy::GracefulDrain,
        }
    }
}

impl EngineConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_drop_policy(mut self, drop_policy: DropPolicy) -> Self {
        self.drop_policy = drop_policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert!(config.user_agent.starts_with("pollwire/"));
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(config.drop_policy, DropPolicy::GracefulDrain);
    }

    #[test]
    fn builders_override_fields() {
        let config = EngineConfig::default()
            .with_user_agent("probe/9")
            .with_max_redirects(0)
            .with_drop_policy(DropPolicy::CloseImmediately);
        assert_eq!(config.user_agent, "probe/9");
        assert_eq!(config.max_redirects, 0);
        assert_eq!(config.drop_policy, DropPolicy::CloseImmediately);
    }
}
