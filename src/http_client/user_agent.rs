//! Contact user agents for the filing archive.
//!
//! EDGAR rejects anonymous clients; each request must declare a contact in
//! its User-Agent. Rotating across several contacts on retry spreads the
//! per-identity throttling the archive applies.

pub const USER_AGENT: &str = "form13f/0.3 research-contact@example.org";

/// Ordered set of user agents, rotated by attempt number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: vec![USER_AGENT.to_string()],
        }
    }
}

impl UserAgentPool {
    /// Build a pool from configured values; blank entries are ignored and an
    /// empty list falls back to the default agent.
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let agents: Vec<String> = agents
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if agents.is_empty() {
            Self::default()
        } else {
            Self { agents }
        }
    }

    /// User agent for a zero-based attempt number.
    pub fn for_attempt(&self, attempt: u32) -> &str {
        &self.agents[attempt as usize % self.agents.len()]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool() {
        let pool = UserAgentPool::new(Vec::<String>::new());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.for_attempt(7), USER_AGENT);
    }

    #[test]
    fn test_rotation_skips_blank_entries() {
        let pool = UserAgentPool::new(["a a@x.org", "  ", "b b@y.org"]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.for_attempt(0), "a a@x.org");
        assert_eq!(pool.for_attempt(1), "b b@y.org");
        assert_eq!(pool.for_attempt(2), "a a@x.org");
    }
}
