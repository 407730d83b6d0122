//! Flips the recording state of a camera.
//!
//! cargo run --example toggle_record -- studio-camera-6k-pro.local [clip-name]

use std::env;
use std::process::ExitCode;
use bmcontrol::{Device, DeviceControl};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let mut args = env::args().skip(1);
    let Some(hostname) = args.next() else {
        eprintln!("usage: toggle_record <hostname> [clip-name]");
        return ExitCode::FAILURE;
    };
    let clip = args.next();

    let device = Device::new(hostname);
    match device.toggle_record(clip.as_deref()).await {
        Ok(reply) if reply.is_success() => {
            println!("{}: {}", reply.endpoint, reply.status);
            ExitCode::SUCCESS
        },
        Ok(reply) => {
            eprintln!("Error {}: {}", reply.status, reply.status_text);
            ExitCode::FAILURE
        },
        Err(e) => {
            eprintln!("Problem talking to {}: {}", device.hostname(), e);
            ExitCode::FAILURE
        }
    }
}
