//! Synthetic skeleton source for exercising the receiver without a camera.
//!
//! Streams a standing figure whose left forearm waves, one JSON datagram per
//! frame, to the receiver's UDP port.

use anyhow::{Context, Result};
use clap::Parser;
use std::f32::consts::PI;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spine_tracker::pose::Landmark;
use spine_tracker::protocol::{encode_frame, SkeletonFrame, WireJoint, WireVector, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "skeleton_sender", about = "Send synthetic skeleton frames over UDP")]
struct Cli {
    /// Receiver address
    #[arg(long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    target: String,

    /// Frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Stop after this many frames (0 = run forever)
    #[arg(long, default_value_t = 0)]
    frames: u64,

    /// Send a non-JSON datagram every N frames (0 = never)
    #[arg(long, default_value_t = 0)]
    garbage_every: u64,

    /// Visibility reported for every joint
    #[arg(long, default_value_t = 0.95)]
    visibility: f32,
}

/// 手振りの周期 (秒)
const WAVE_PERIOD: f32 = 2.0;
/// 手振りの振幅 (rad)
const WAVE_AMPLITUDE: f32 = 0.8;
const FOREARM_LENGTH: f32 = 0.25;

/// 立ち姿勢 (y は下向き正、単位 m)
fn rest_pose() -> [[f32; 3]; Landmark::COUNT] {
    [
        [0.0, -0.60, -0.05],   // nose
        [0.02, -0.63, -0.04],  // left eye inner
        [0.035, -0.63, -0.04], // left eye
        [0.05, -0.63, -0.04],  // left eye outer
        [-0.02, -0.63, -0.04], // right eye inner
        [-0.035, -0.63, -0.04],
        [-0.05, -0.63, -0.04],
        [0.08, -0.60, 0.0], // left ear
        [-0.08, -0.60, 0.0],
        [0.02, -0.55, -0.04], // mouth left
        [-0.02, -0.55, -0.04],
        [0.18, -0.45, 0.0], // left shoulder
        [-0.18, -0.45, 0.0],
        [0.22, -0.20, 0.0], // left elbow
        [-0.20, -0.20, 0.0],
        [0.22, -0.45, 0.0], // left wrist (上書きされる)
        [-0.22, 0.05, 0.0],
        [0.23, -0.50, 0.0], // left pinky
        [-0.23, 0.12, 0.0],
        [0.22, -0.52, 0.0], // left index
        [-0.22, 0.13, 0.0],
        [0.20, -0.48, 0.0], // left thumb
        [-0.20, 0.10, 0.0],
        [0.10, 0.0, 0.0], // left hip
        [-0.10, 0.0, 0.0],
        [0.11, 0.40, 0.0], // left knee
        [-0.11, 0.40, 0.0],
        [0.12, 0.80, 0.0], // left ankle
        [-0.12, 0.80, 0.0],
        [0.12, 0.85, 0.05], // left heel
        [-0.12, 0.85, 0.05],
        [0.12, 0.85, -0.10], // left foot index
        [-0.12, 0.85, -0.10],
    ]
}

fn synthetic_frame(frame: u64, t: f32, visibility: f32) -> SkeletonFrame {
    let mut pose = rest_pose();

    // 左前腕を肘中心に振る。手先は手首に追従させる
    let theta = WAVE_AMPLITUDE * (2.0 * PI * t / WAVE_PERIOD).sin();
    let elbow = pose[Landmark::LeftElbow.index()];
    let wrist = [
        elbow[0] + FOREARM_LENGTH * theta.sin(),
        elbow[1] - FOREARM_LENGTH * theta.cos(),
        elbow[2],
    ];
    let rest_wrist = pose[Landmark::LeftWrist.index()];
    for lm in [Landmark::LeftPinky, Landmark::LeftIndex, Landmark::LeftThumb] {
        let p = &mut pose[lm.index()];
        for axis in 0..3 {
            p[axis] += wrist[axis] - rest_wrist[axis];
        }
    }
    pose[Landmark::LeftWrist.index()] = wrist;

    let joints = pose
        .iter()
        .enumerate()
        .map(|(id, p)| WireJoint::new(id as i64, WireVector::new(p[0], p[1], p[2]), visibility))
        .collect();

    SkeletonFrame { frame, joints }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.fps > 0, "--fps must be positive");

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind sender socket")?;
    socket
        .connect(&cli.target)
        .with_context(|| format!("Failed to resolve {}", cli.target))?;

    info!("Sending to {} at {} fps", cli.target, cli.fps);

    let frame_duration = Duration::from_secs_f64(1.0 / cli.fps as f64);
    let start = Instant::now();
    let mut frame: u64 = 0;

    while cli.frames == 0 || frame < cli.frames {
        let tick = Instant::now();

        if cli.garbage_every > 0 && frame > 0 && frame % cli.garbage_every == 0 {
            if let Err(e) = socket.send(b"{not a skeleton") {
                warn!("send failed: {}", e);
            }
        }

        let data = encode_frame(&synthetic_frame(frame, start.elapsed().as_secs_f32(), cli.visibility))?;
        // 受信側が未起動だと ECONNREFUSED が返るが、送信は続ける
        if let Err(e) = socket.send(&data) {
            warn!("send failed: {}", e);
        }

        frame += 1;
        if frame % cli.fps as u64 == 0 {
            info!("frames sent: {}", frame);
        }

        if let Some(rest) = frame_duration.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    info!("Done: {} frames", frame);
    Ok(())
}
