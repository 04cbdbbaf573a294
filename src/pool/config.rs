use std::time::Duration;

/// Pool configuration builder.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub(crate) pool_size: usize,
    pub(crate) reconnect_backoff: Duration,
    pub(crate) max_queue_depth: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            // implementation-defined, spec requires >= 1s
            reconnect_backoff: Duration::from_secs(1),
            // unbounded, matching the Drogon original (see SPEC_FULL.md Open Questions)
            max_queue_depth: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend connections the pool keeps alive.
    pub fn pool_size(mut self, value: usize) -> Self {
        assert!(value > 0, "pool_size must be at least 1");
        self.pool_size = value;
        self
    }

    /// How long to wait before spawning a replacement after a connection is
    /// lost. Must be at least one second per the design.
    pub fn reconnect_backoff(mut self, value: Duration) -> Self {
        self.reconnect_backoff = value.max(Duration::from_secs(1));
        self
    }

    /// Cap on how many commands may sit in the wait buffer at once. `None`
    /// (the default) means unbounded. Exceeding the cap fails the
    /// submission immediately with [`crate::ErrorKind::BackpressureExceeded`].
    pub fn max_queue_depth(mut self, value: impl Into<Option<usize>>) -> Self {
        self.max_queue_depth = value.into();
        self
    }
}
