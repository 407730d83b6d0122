use std::time::Duration;

const API_PATH: &str = "/control/api/v1";
const EVENT_SOCKET_PATH: &str = "/event/websocket";

/// Everything needed to reach one device. Built in code by the embedding
/// application; nothing is read from the environment.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub hostname: String,
    /// Wait between the discovery reply and the subscribe batch. The device
    /// drops subscriptions that arrive right after `listProperties`.
    pub subscribe_delay: Duration,
    /// Capacity of the inbound event queue of an event channel.
    pub event_queue: usize,
}

impl DeviceConfig {
    pub fn new(hostname: impl Into<String>) -> DeviceConfig {
        DeviceConfig {
            hostname: hostname.into(),
            subscribe_delay: Duration::from_millis(100),
            event_queue: 100,
        }
    }

    pub fn with_subscribe_delay(mut self, delay: Duration) -> DeviceConfig {
        self.subscribe_delay = delay;
        self
    }

    pub fn with_event_queue(mut self, size: usize) -> DeviceConfig {
        self.event_queue = size.max(1);
        self
    }

    pub fn base_address(&self) -> String {
        format!("http://{}{}", self.hostname, API_PATH)
    }

    pub fn event_address(&self) -> String {
        format!("ws://{}{}{}", self.hostname, API_PATH, EVENT_SOCKET_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_addresses_from_hostname() {
        let cfg = DeviceConfig::new("studio-camera-6k-pro.local");
        assert_eq!(cfg.base_address(), "http://studio-camera-6k-pro.local/control/api/v1");
        assert_eq!(cfg.event_address(),
            "ws://studio-camera-6k-pro.local/control/api/v1/event/websocket");
        assert_eq!(cfg.subscribe_delay, Duration::from_millis(100));
    }

    #[test]
    fn event_queue_never_zero() {
        let cfg = DeviceConfig::new("cam").with_event_queue(0);
        assert_eq!(cfg.event_queue, 1);
    }
}
