use std::fmt;
use async_trait::async_trait;
use serde_json::{json, Value};
use crate::bmerror::BMResult;
use crate::config::DeviceConfig;
use crate::device::{Device, DeviceControl, EndpointState};
use crate::syncclient::{Reply, SyncClient};

const WHITE_BALANCE: &str = "/video/whiteBalance";
const WHITE_BALANCE_TINT: &str = "/video/whiteBalanceTint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteBalancePreset {
    Sunlight,
    Tungsten,
    Fluorescent,
    Shade,
    Cloudy,
}

impl WhiteBalancePreset {
    pub const ALL: [WhiteBalancePreset; 5] = [
        WhiteBalancePreset::Sunlight,
        WhiteBalancePreset::Tungsten,
        WhiteBalancePreset::Fluorescent,
        WhiteBalancePreset::Shade,
        WhiteBalancePreset::Cloudy,
    ];

    pub fn from_index(index: i64) -> Option<WhiteBalancePreset> {
        usize::try_from(index).ok().and_then(|i| WhiteBalancePreset::ALL.get(i).copied())
    }

    /// (colour temperature in kelvin, tint)
    pub fn settings(self) -> (i64, i64) {
        match self {
            WhiteBalancePreset::Sunlight => (5600, 10),
            WhiteBalancePreset::Tungsten => (3200, 0),
            WhiteBalancePreset::Fluorescent => (4000, 15),
            WhiteBalancePreset::Shade => (4500, 15),
            WhiteBalancePreset::Cloudy => (6500, 10),
        }
    }
}

impl fmt::Display for WhiteBalancePreset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            WhiteBalancePreset::Sunlight => write!(f, "Sunlight"),
            WhiteBalancePreset::Tungsten => write!(f, "Tungsten"),
            WhiteBalancePreset::Fluorescent => write!(f, "Fluorescent"),
            WhiteBalancePreset::Shade => write!(f, "Shade"),
            WhiteBalancePreset::Cloudy => write!(f, "Cloudy"),
        }
    }
}

/// Image controls only cameras have.
#[async_trait]
pub trait CameraControl: DeviceControl {
    /// Writes colour temperature then tint. Both writes are always sent; the
    /// first failing reply wins, otherwise the tint reply is returned.
    async fn set_white_balance(&self, temperature: Value, tint: Value) -> BMResult<Reply> {
        let wb = self.client().put(WHITE_BALANCE, &json!({"whiteBalance": temperature})).await?;
        let tint = self.client().put(WHITE_BALANCE_TINT, &json!({"whiteBalanceTint": tint})).await?;
        Ok(if wb.is_success() { tint } else { wb })
    }

    /// 0 Sunlight, 1 Tungsten, 2 Fluorescent, 3 Shade, 4 Cloudy. Any other
    /// index reads the current values back and writes them unchanged.
    async fn set_white_balance_preset(&self, preset_index: i64) -> BMResult<Reply> {
        let (temperature, tint) = match WhiteBalancePreset::from_index(preset_index) {
            Some(preset) => {
                let (t, n) = preset.settings();
                (json!(t), json!(n))
            },
            None => {
                let wb = self.client().get(WHITE_BALANCE).await?;
                if !wb.is_success() {
                    return Ok(wb);
                }
                let tint = self.client().get(WHITE_BALANCE_TINT).await?;
                if !tint.is_success() {
                    return Ok(tint);
                }
                (wb.field("whiteBalance")?.clone(), tint.field("whiteBalanceTint")?.clone())
            }
        };
        self.set_white_balance(temperature, tint).await
    }
}

/// A device with the camera capability set on top of the generic one.
#[derive(Debug, Clone)]
pub struct Camera {
    device: Device,
}

impl Camera {
    pub fn new(hostname: impl Into<String>) -> Camera {
        Camera { device: Device::new(hostname) }
    }

    pub fn with_config(config: DeviceConfig) -> Camera {
        Camera { device: Device::with_config(config) }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl From<Device> for Camera {
    fn from(device: Device) -> Camera {
        Camera { device }
    }
}

impl DeviceControl for Camera {
    fn client(&self) -> &SyncClient {
        self.device.client()
    }

    fn endpoint_state_mut(&mut self) -> &mut EndpointState {
        self.device.endpoint_state_mut()
    }
}

impl CameraControl for Camera {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use reqwest::Method;
    use super::*;
    use crate::transport::testing::FakeTransport;

    const BASE: &str = "http://cam/control/api/v1";

    fn camera(fake: &Arc<FakeTransport>) -> Camera {
        let client = SyncClient::with_transport(BASE, fake.clone());
        Device::with_client(DeviceConfig::new("cam"), client).into()
    }

    fn puts(fake: &FakeTransport) -> Vec<(String, Value)> {
        fake.calls().into_iter()
            .filter(|c| c.0 == Method::PUT)
            .map(|(_, url, body)| (url, body.unwrap_or(Value::Null)))
            .collect()
    }

    #[tokio::test]
    async fn presets_write_table_values() {
        let table = [(0, 5600, 10), (1, 3200, 0), (2, 4000, 15), (3, 4500, 15), (4, 6500, 10)];
        for (index, kelvin, tint) in table {
            let fake = Arc::new(FakeTransport::new());
            camera(&fake).set_white_balance_preset(index).await.unwrap();
            assert_eq!(puts(&fake), vec![
                (format!("{}{}", BASE, WHITE_BALANCE), json!({"whiteBalance": kelvin})),
                (format!("{}{}", BASE, WHITE_BALANCE_TINT), json!({"whiteBalanceTint": tint})),
            ]);
            assert_eq!(fake.calls().len(), 2);
        }
    }

    #[tokio::test]
    async fn unknown_preset_rewrites_current_values() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply(WHITE_BALANCE, 200, r#"{"whiteBalance": 4200}"#);
        fake.reply(WHITE_BALANCE_TINT, 200, r#"{"whiteBalanceTint": -3}"#);
        camera(&fake).set_white_balance_preset(99).await.unwrap();
        assert_eq!(fake.calls().len(), 4);
        assert_eq!(puts(&fake), vec![
            (format!("{}{}", BASE, WHITE_BALANCE), json!({"whiteBalance": 4200})),
            (format!("{}{}", BASE, WHITE_BALANCE_TINT), json!({"whiteBalanceTint": -3})),
        ]);
    }

    #[test]
    fn preset_lookup() {
        assert_eq!(WhiteBalancePreset::from_index(2), Some(WhiteBalancePreset::Fluorescent));
        assert_eq!(WhiteBalancePreset::from_index(-1), None);
        assert_eq!(WhiteBalancePreset::from_index(5), None);
        assert_eq!(WhiteBalancePreset::Shade.to_string(), "Shade");
    }

    #[tokio::test]
    async fn camera_keeps_device_commands() {
        let fake = Arc::new(FakeTransport::new());
        camera(&fake).record(true).await.unwrap();
        assert_eq!(puts(&fake), vec![
            (format!("{}/transports/0/record", BASE), json!({"recording": true})),
        ]);
    }
}
