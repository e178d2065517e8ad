use std::time::{Duration, Instant};

use crate::skeleton::{BoneTransform, JointTransform};

/// ボーン・関節の描画先
pub trait RenderSink {
    /// tick 毎に全ボーンスロットと全関節スロットを受け取る
    fn submit(&mut self, bones: &[BoneTransform], joints: &[JointTransform]);
}

/// 角度テキストの表示先
pub trait DashboardSink {
    fn show(&mut self, text: &str);
}

/// 何も描画しない
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderSink;

impl RenderSink for NullRenderSink {
    fn submit(&mut self, _bones: &[BoneTransform], _joints: &[JointTransform]) {}
}

/// ダッシュボードをログに出す。出力は interval 毎に間引く
#[derive(Debug)]
pub struct ConsoleDashboard {
    interval: Duration,
    last_shown: Option<Instant>,
}

impl ConsoleDashboard {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_shown: None,
        }
    }
}

impl DashboardSink for ConsoleDashboard {
    fn show(&mut self, text: &str) {
        let now = Instant::now();
        if let Some(last) = self.last_shown {
            if now.duration_since(last) < self.interval {
                return;
            }
        }
        self.last_shown = Some(now);
        tracing::info!(target: "dashboard", "{}", text.replace('\n', " | "));
    }
}
