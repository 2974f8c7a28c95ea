use std::{default::Default, time::Duration};

/// Matches any client version
pub const ANY_VERSION: &str = "*";

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Connections beyond this many peers are refused with a `full` warning
    pub max_clients: usize,
    /// How many times per second the application is expected to call
    /// `Server::send_all_updates`
    pub send_rate: u32,
    /// Peers announcing a different version are refused. `"*"` accepts any
    /// version.
    pub version: String,
    /// While false, every new connection is refused
    pub accepting_clients: bool,
    /// Determines whether a `dataRequest` waits for `Server::accept_join`
    /// instead of joining right away
    pub require_join_accept: bool,
    /// Compress every payload. Only takes effect with the `zstd_support`
    /// feature.
    pub compression: bool,
}

impl ServerConfig {
    /// Time between two calls to `Server::send_all_updates` at `send_rate`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.send_rate.max(1)
    }

    pub(crate) fn accepts_version(&self, version: &str) -> bool {
        self.version == ANY_VERSION || self.version == version
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_clients: 64,
            send_rate: 35,
            version: ANY_VERSION.to_string(),
            accepting_clients: true,
            require_join_accept: false,
            compression: false,
        }
    }
}
