//! Control client for networked broadcast cameras: request/response access to
//! the REST control API plus an event websocket that keeps a local mirror of
//! the device's properties.

mod bmerror;
mod camera;
mod config;
mod device;
mod eventchannel;
mod mirror;
mod protos;
mod syncclient;
mod transport;

pub use crate::bmerror::{BMError, BMResult};
pub use crate::camera::{Camera, CameraControl, WhiteBalancePreset};
pub use crate::config::DeviceConfig;
pub use crate::device::{Device, DeviceControl, EndpointState};
pub use crate::eventchannel::{ChangeCallback, ChannelState, EventChannel};
pub use crate::mirror::PropertyMirror;
pub use crate::protos::{Envelope, MessageType, Request, Update};
pub use crate::syncclient::{Reply, SyncClient};
pub use crate::transport::{HttpTransport, RawReply, Transport};
pub use reqwest::Method;
