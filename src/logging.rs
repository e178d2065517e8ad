use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログディレクトリ
pub const LOG_DIR: &str = "logs";

/// stderr とタイムスタンプ付きログファイルの両方に出力する
///
/// フィルタは `RUST_LOG` で上書きでき、未指定なら `info`。
pub fn init(name: &str) -> Result<PathBuf> {
    let (file, path) = open_log_file(Path::new(LOG_DIR), name)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}

fn open_log_file(dir: &Path, name: &str) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_{}.log", name, ts));
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok((file, path))
}
