use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bevy::app::{App, AppExit, ScheduleRunnerPlugin, Update};
use bevy::ecs::prelude::*;
use tracing::{error, info, warn};

use spine_tracker::config::{Config, DebugConfig};
use spine_tracker::pipeline::{SkeletonPipeline, TickOutcome};
use spine_tracker::recorder::AngleRecorder;
use spine_tracker::render::{ConsoleDashboard, NullRenderSink};

const CONFIG_PATH: &str = "config.toml";

// --- Bevy Resources ---

#[derive(Resource)]
struct PipelineRes(SkeletonPipeline);

#[derive(Resource)]
struct Dashboard(ConsoleDashboard);

#[derive(Resource)]
struct Controls {
    /// SIGINT/SIGTERM またはコンソール "q"
    shutdown: Arc<AtomicBool>,
    /// コンソール "s" で記録の開始/停止
    toggle_recording: Arc<AtomicBool>,
}

#[derive(Resource)]
struct RecordingState {
    output_dir: String,
    recorder: Option<AngleRecorder<BufWriter<File>>>,
}

#[derive(Resource)]
struct FpsCounter {
    tick_count: u32,
    applied_count: u32,
    timer: Instant,
}

#[cfg(feature = "desktop")]
struct DebugView {
    renderer: spine_tracker::render::MinifbRenderer,
}

fn main() -> Result<()> {
    let log_path = spine_tracker::logging::init("spine_tracker")?;
    let config = Config::load_or_default(CONFIG_PATH);

    info!("Spine Tracker {}", env!("GIT_VERSION"));
    info!("Log: {}", log_path.display());
    info!("Listen: {}:{}", config.network.bind_addr, config.network.port);
    info!("Target FPS: {}", config.app.target_fps);
    info!(
        "Skeleton: scale={}, bone_thickness={}, joint_size={}, missing_joints={:?}, virtual_bones={:?}",
        config.skeleton.global_scale,
        config.skeleton.bone_thickness,
        config.skeleton.joint_size,
        config.skeleton.missing_joints,
        config.skeleton.virtual_bones,
    );

    // バインド失敗はここで終了
    let pipeline = SkeletonPipeline::start(&config).with_context(|| {
        format!(
            "Failed to start listener on {}:{}",
            config.network.bind_addr, config.network.port
        )
    })?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let toggle_recording = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;
    spawn_console_thread(shutdown.clone(), toggle_recording.clone());

    info!("");
    info!("操作: [S + Enter] 記録開始/停止  [Q + Enter] or [Ctrl+C] 終了");
    info!("");

    let frame_duration = Duration::from_secs_f64(1.0 / config.app.target_fps as f64);

    let mut app = App::new();
    app.add_plugins(ScheduleRunnerPlugin::run_loop(frame_duration))
        .insert_resource(PipelineRes(pipeline))
        .insert_resource(Dashboard(ConsoleDashboard::new(Duration::from_millis(
            config.app.dashboard_interval_ms,
        ))))
        .insert_resource(Controls {
            shutdown,
            toggle_recording,
        })
        .insert_resource(RecordingState {
            output_dir: config.recording.output_dir.clone(),
            recorder: None,
        })
        .insert_resource(FpsCounter {
            tick_count: 0,
            applied_count: 0,
            timer: Instant::now(),
        });

    install_debug_view(&mut app, &config.debug);

    app.add_systems(
        Update,
        (recording_toggle_system, tick_system, fps_system, shutdown_system).chain(),
    );

    app.run();

    info!("Shutting down...");
    Ok(())
}

fn spawn_console_thread(shutdown: Arc<AtomicBool>, toggle_recording: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "s" => toggle_recording.store(true, Ordering::Release),
                "q" => shutdown.store(true, Ordering::Release),
                _ => {}
            }
        }
    });
}

#[cfg(feature = "desktop")]
fn install_debug_view(app: &mut App, config: &DebugConfig) {
    if !config.view {
        return;
    }
    match spine_tracker::render::MinifbRenderer::new("spine_tracker debug", config.width, config.height) {
        Ok(renderer) => {
            info!("Debug view: {}x{}", config.width, config.height);
            app.insert_non_send_resource(DebugView { renderer });
        }
        Err(e) => warn!("Debug view failed: {}", e),
    }
}

#[cfg(not(feature = "desktop"))]
fn install_debug_view(_app: &mut App, config: &DebugConfig) {
    if config.view {
        warn!("debug.view requires the `desktop` feature");
    }
}

// --- Systems ---

#[cfg(feature = "desktop")]
fn tick_system(
    mut pipeline: ResMut<PipelineRes>,
    mut dashboard: ResMut<Dashboard>,
    mut recording: ResMut<RecordingState>,
    mut fps: ResMut<FpsCounter>,
    controls: Res<Controls>,
    debug_view: Option<NonSendMut<DebugView>>,
) {
    let outcome = match debug_view {
        Some(mut view) => {
            if !view.renderer.is_open() {
                controls.shutdown.store(true, Ordering::Release);
            }
            let outcome = pipeline.0.tick(&mut view.renderer, &mut dashboard.0);
            if !matches!(outcome, TickOutcome::Applied { .. }) {
                // 新フレームが無くてもウィンドウイベントを処理する
                if let Err(e) = view.renderer.update() {
                    warn!(error = %e, "debug view update failed");
                }
            }
            outcome
        }
        None => pipeline.0.tick(&mut NullRenderSink, &mut dashboard.0),
    };
    handle_outcome(outcome, &pipeline.0, &mut recording, &mut fps);
}

#[cfg(not(feature = "desktop"))]
fn tick_system(
    mut pipeline: ResMut<PipelineRes>,
    mut dashboard: ResMut<Dashboard>,
    mut recording: ResMut<RecordingState>,
    mut fps: ResMut<FpsCounter>,
) {
    let outcome = pipeline.0.tick(&mut NullRenderSink, &mut dashboard.0);
    handle_outcome(outcome, &pipeline.0, &mut recording, &mut fps);
}

fn handle_outcome(
    outcome: TickOutcome,
    pipeline: &SkeletonPipeline,
    recording: &mut RecordingState,
    fps: &mut FpsCounter,
) {
    fps.tick_count += 1;
    let TickOutcome::Applied { frame } = outcome else {
        return;
    };
    fps.applied_count += 1;

    if let Some(recorder) = recording.recorder.as_mut() {
        if let Err(e) = recorder.record(frame, pipeline.state().angles()) {
            error!("CSV write failed, recording stopped: {:#}", e);
            recording.recorder = None;
        }
    }
}

fn recording_toggle_system(controls: Res<Controls>, mut recording: ResMut<RecordingState>) {
    if !controls.toggle_recording.swap(false, Ordering::AcqRel) {
        return;
    }
    match recording.recorder.take() {
        Some(recorder) => finish_recording(recorder),
        None => match AngleRecorder::create(&recording.output_dir) {
            Ok((recorder, path)) => {
                info!("--- Recording to {} ---", path.display());
                recording.recorder = Some(recorder);
            }
            Err(e) => error!("Failed to start recording: {:#}", e),
        },
    }
}

fn finish_recording(recorder: AngleRecorder<BufWriter<File>>) {
    let rows = recorder.rows();
    match recorder.finish() {
        Ok(_) => info!("--- Saved CSV ({} rows) ---", rows),
        Err(e) => error!("Failed to flush CSV: {:#}", e),
    }
}

fn fps_system(mut fps: ResMut<FpsCounter>, pipeline: Res<PipelineRes>) {
    let elapsed = fps.timer.elapsed().as_secs_f32();
    if elapsed < 1.0 {
        return;
    }
    let stats = pipeline.0.stats();
    let state = pipeline.0.state();
    info!(
        "FPS: {:.1} (frames: {}) | joints={} bones={} | applied={} dropped={} overwritten={} recv_errors={}",
        fps.tick_count as f32 / elapsed,
        fps.applied_count,
        state.model().active_count(),
        state.rig().active_count(),
        stats.applied,
        stats.decode_failures,
        stats.overwritten,
        pipeline.0.listener().receive_errors(),
    );
    fps.tick_count = 0;
    fps.applied_count = 0;
    fps.timer = Instant::now();
}

fn shutdown_system(
    controls: Res<Controls>,
    mut pipeline: ResMut<PipelineRes>,
    mut recording: ResMut<RecordingState>,
    mut exit: EventWriter<AppExit>,
) {
    if !controls.shutdown.load(Ordering::Acquire) || pipeline.0.is_stopped() {
        return;
    }
    pipeline.0.stop();
    if let Some(recorder) = recording.recorder.take() {
        finish_recording(recorder);
    }
    exit.send(AppExit::Success);
}
