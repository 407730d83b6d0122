use std::collections::BTreeMap;
use async_trait::async_trait;
use log::{info, warn};
use serde_json::{json, Value};
use crate::bmerror::{BMError, BMResult};
use crate::config::DeviceConfig;
use crate::eventchannel::{ChangeCallback, EventChannel};
use crate::syncclient::{Reply, SyncClient};

const RECORD: &str = "/transports/0/record";
const ACTIVE_MEDIA: &str = "/media/active";
const WORKING_SET: &str = "/media/workingset";
const EVENT_LIST: &str = "/event/list";
const SUPPORTED_FILESYSTEMS: &str = "/media/devices/doformatSupportedFilesystems";
const FORMAT_FILESYSTEM: &str = "ExFAT";

/// Body of every endpoint fetched by [`DeviceControl::populate_from_event_list`],
/// keyed by endpoint path. Kept apart from the event channel's mirror.
pub type EndpointState = BTreeMap<String, Value>;

/// Commands every device on the control API understands.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    fn client(&self) -> &SyncClient;

    fn endpoint_state_mut(&mut self) -> &mut EndpointState;

    /// Starts (`true`) or stops (`false`) recording.
    async fn record(&self, active: bool) -> BMResult<Reply> {
        self.client().put(RECORD, &json!({"recording": active})).await
    }

    /// Flips the recording state, naming the clip when `clip_name` is given.
    async fn toggle_record(&self, clip_name: Option<&str>) -> BMResult<Reply> {
        let current = self.client().get(RECORD).await?;
        if !current.is_success() {
            return Ok(current);
        }
        let recording = current.field("recording")?.as_bool().ok_or_else(|| BMError::UnexpectedShape {
            endpoint: RECORD.to_string(),
            expected: "a boolean recording flag",
        })?;
        let mut state = current.body.clone();
        state["recording"] = Value::Bool(!recording);
        if let Some(name) = clip_name.filter(|n| !n.is_empty()) {
            state["clipName"] = Value::String(name.to_string());
        }
        self.client().put(RECORD, &state).await
    }

    /// Makes the device regenerate its play list from the working set index
    /// it is currently using.
    async fn rebuild_timeline(&self) -> BMResult<Reply> {
        let active = self.client().get(ACTIVE_MEDIA).await?;
        if !active.is_success() {
            return Ok(active);
        }
        let index = active.field("workingsetIndex")?.clone();
        self.client().put(ACTIVE_MEDIA, &json!({"workingsetIndex": index})).await
    }

    /// Formats the drive at `index` of the working set as ExFAT.
    ///
    /// The format key is single use, so it is fetched right before the
    /// format command.
    async fn format_drive(&self, index: usize, volume_name: &str) -> BMResult<Reply> {
        let ws = self.client().get(WORKING_SET).await?;
        if !ws.is_success() {
            return Ok(ws);
        }
        let drives = ws.field("workingset")?.as_array().ok_or_else(|| BMError::UnexpectedShape {
            endpoint: WORKING_SET.to_string(),
            expected: "a working set list",
        })?;
        let drive = drives.get(index).ok_or(BMError::NoSuchDrive { index, available: drives.len() })?;
        let device_name = drive.get("deviceName").and_then(Value::as_str).ok_or_else(|| BMError::MissingField {
            endpoint: WORKING_SET.to_string(),
            field: format!("workingset[{}].deviceName", index),
        })?;

        let endpoint = format!("/media/devices/{}/doformat", device_name);
        let auth = self.client().get(&endpoint).await?;
        if !auth.is_success() {
            return Ok(auth);
        }
        let key = auth.field("key")?.clone();
        info!("Formatting {} as {} ({})", device_name, volume_name, FORMAT_FILESYSTEM);
        self.client().put(&endpoint, &json!({
            "key": key,
            "volume": volume_name,
            "filesystem": FORMAT_FILESYSTEM,
        })).await
    }

    async fn supported_filesystems(&self) -> BMResult<Reply> {
        self.client().get(SUPPORTED_FILESYSTEMS).await
    }

    /// Fetches every endpoint named by `/event/list` and stores its body.
    /// Returns how many endpoints were stored; failed fetches are skipped.
    async fn populate_from_event_list(&mut self) -> BMResult<usize> {
        let list = self.client().get(EVENT_LIST).await?;
        if !list.is_success() {
            return Ok(0);
        }
        let names = event_list_names(&list)?;
        let mut fetched = Vec::with_capacity(names.len());
        for name in names {
            let reply = self.client().get(&name).await?;
            if reply.is_success() {
                fetched.push((name, reply.body));
            } else {
                warn!("Skipping {}: status {}", name, reply.status);
            }
        }
        let n = fetched.len();
        self.endpoint_state_mut().extend(fetched);
        Ok(n)
    }
}

fn event_list_names(list: &Reply) -> BMResult<Vec<String>> {
    let arr = match &list.body {
        Value::Array(a) => Some(a),
        Value::Object(_) => list.field("properties")?.as_array(),
        _ => None,
    };
    let arr = arr.ok_or_else(|| BMError::UnexpectedShape {
        endpoint: EVENT_LIST.to_string(),
        expected: "a list of endpoints",
    })?;
    Ok(arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
}

/// Handle to one device: its identity plus the request client bound to it.
#[derive(Debug, Clone)]
pub struct Device {
    config: DeviceConfig,
    client: SyncClient,
    endpoints: EndpointState,
}

impl Device {
    pub fn new(hostname: impl Into<String>) -> Device {
        Device::with_config(DeviceConfig::new(hostname))
    }

    pub fn with_config(config: DeviceConfig) -> Device {
        let client = SyncClient::new(config.base_address());
        Device::with_client(config, client)
    }

    /// Uses `client` for every request, e.g. one built on a custom transport.
    pub fn with_client(config: DeviceConfig, client: SyncClient) -> Device {
        Device {
            config,
            client,
            endpoints: EndpointState::new(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    pub fn base_address(&self) -> &str {
        self.client.base_address()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &EndpointState {
        &self.endpoints
    }

    pub async fn open_events(&self) -> BMResult<EventChannel> {
        EventChannel::open(&self.config).await
    }

    pub async fn open_events_with_callback(&self, on_change: ChangeCallback) -> BMResult<EventChannel> {
        EventChannel::open_with_callback(&self.config, on_change).await
    }
}

impl DeviceControl for Device {
    fn client(&self) -> &SyncClient {
        &self.client
    }

    fn endpoint_state_mut(&mut self) -> &mut EndpointState {
        &mut self.endpoints
    }
}
