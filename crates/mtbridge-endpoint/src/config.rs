use mtbridge_frame::FrameConfig;
use mtbridge_transport::{ANY_HOST, DEFAULT_PORT};

/// Where an [`Endpoint`](crate::Endpoint) listens and how it frames messages.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Bind host. `*` and `0.0.0.0` listen on every interface.
    pub host: String,
    /// Bind port. `0` picks an ephemeral port.
    pub port: u16,
    pub frame: FrameConfig,
}

impl EndpointConfig {
    /// Every interface on `port`, default framing.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: ANY_HOST.to_string(),
            port: DEFAULT_PORT,
            frame: FrameConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_everywhere_on_well_known_port() {
        let config = EndpointConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.frame.read_timeout.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = EndpointConfig::new(9100).with_host("127.0.0.1");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9100);
    }
}
