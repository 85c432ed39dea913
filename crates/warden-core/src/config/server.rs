//! Server configuration.

use serde::{Deserialize, Serialize};

/// Server settings observable by the core.
///
/// The transport stack itself lives outside this service; the advertise
/// address is the only server-level input the core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address advertised to the gateway (host:port).
    #[serde(default = "default_advertise_address")]
    pub advertise_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            advertise_address: default_advertise_address(),
        }
    }
}

fn default_advertise_address() -> String {
    "127.0.0.1:9000".to_string()
}
