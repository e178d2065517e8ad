use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::protocol::DEFAULT_PORT;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub skeleton: SkeletonConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// 待ち受けアドレス
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// 待ち受けポート
    #[serde(default = "default_port")]
    pub port: u16,
}

/// フレームに含まれなかった関節の扱い
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingJointPolicy {
    /// 前回の値を保持する
    #[default]
    Hold,
    /// 非表示にする
    Hide,
}

/// 肩・腰の4点が揃わないときの仮想ボーンの扱い
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VirtualBonePolicy {
    /// 直前の状態のまま残す
    #[default]
    Hold,
    /// 実ボーンと同様に非表示にする
    Hide,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SkeletonConfig {
    /// 表示空間への一様スケール
    #[serde(default = "default_global_scale")]
    pub global_scale: f32,
    /// ボーンの太さ (global_scale 倍される)
    #[serde(default = "default_bone_thickness")]
    pub bone_thickness: f32,
    /// 関節球のサイズ (global_scale 倍される)
    #[serde(default = "default_joint_size")]
    pub joint_size: f32,
    #[serde(default)]
    pub missing_joints: MissingJointPolicy,
    #[serde(default)]
    pub virtual_bones: VirtualBonePolicy,
}

impl SkeletonConfig {
    pub fn scaled_bone_thickness(&self) -> f32 {
        self.global_scale * self.bone_thickness
    }

    pub fn scaled_joint_size(&self) -> f32 {
        self.global_scale * self.joint_size
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// tick の実行レート
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// ダッシュボード出力の最小間隔（ミリ秒）
    #[serde(default = "default_dashboard_interval_ms")]
    pub dashboard_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    /// CSV の保存先ディレクトリ
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// デバッグビューを表示する (desktop feature 必須)
    #[serde(default)]
    pub view: bool,
    #[serde(default = "default_view_width")]
    pub width: usize,
    #[serde(default = "default_view_height")]
    pub height: usize,
}

fn default_bind_addr() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { DEFAULT_PORT }
fn default_global_scale() -> f32 { 15.0 }
fn default_bone_thickness() -> f32 { 0.01 }
fn default_joint_size() -> f32 { 0.05 }
fn default_target_fps() -> u32 { 60 }
fn default_dashboard_interval_ms() -> u64 { 1000 }
fn default_output_dir() -> String { ".".to_string() }
fn default_view_width() -> usize { 640 }
fn default_view_height() -> usize { 480 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            global_scale: default_global_scale(),
            bone_thickness: default_bone_thickness(),
            joint_size: default_joint_size(),
            missing_joints: MissingJointPolicy::default(),
            virtual_bones: VirtualBonePolicy::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            dashboard_interval_ms: default_dashboard_interval_ms(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            view: false,
            width: default_view_width(),
            height: default_view_height(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// 読み込めなければデフォルト設定を使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "config not found, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "falling back to default config");
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 受信側で許容している範囲をチェック
    pub fn validate(&self) -> Result<()> {
        let s = &self.skeleton;
        if !(1.0..=30.0).contains(&s.global_scale) {
            bail!("skeleton.global_scale must be in 1..=30 (got {})", s.global_scale);
        }
        if !(0.001..=0.1).contains(&s.bone_thickness) {
            bail!("skeleton.bone_thickness must be in 0.001..=0.1 (got {})", s.bone_thickness);
        }
        if !(0.01..=0.2).contains(&s.joint_size) {
            bail!("skeleton.joint_size must be in 0.01..=0.2 (got {})", s.joint_size);
        }
        if self.app.target_fps == 0 {
            bail!("app.target_fps must be positive");
        }
        Ok(())
    }
}
