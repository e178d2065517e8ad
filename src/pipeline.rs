//! Consumer side of the skeleton stream.
//!
//! `SkeletonState` owns the long-lived pose model and bone stores and is only
//! touched from the tick loop. `SkeletonPipeline` adds the UDP listener and the
//! start / tick / stop lifecycle around it.

use tracing::{debug, info};

use crate::config::{Config, SkeletonConfig};
use crate::error::{DecodeError, ListenerError};
use crate::net::UdpListener;
use crate::pose::Landmark;
use crate::protocol::decode_frame;
use crate::render::{DashboardSink, RenderSink};
use crate::skeleton::{
    BoneRig, BoneTransform, JointAngles, JointTransform, SkeletonModel, BONE_COUNT,
};

/// 1 tick の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 新しいペイロードなし
    Idle,
    /// フレームを取り込んだ
    Applied { frame: u64 },
    /// デコードに失敗して破棄した
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// 取り込んだフレーム数
    pub applied: u64,
    /// デコード失敗で破棄したペイロード数
    pub decode_failures: u64,
    /// 取り出す前に上書きされたペイロード数
    pub overwritten: u64,
}

/// 消費側が専有する骨格の状態
pub struct SkeletonState {
    config: SkeletonConfig,
    model: SkeletonModel,
    rig: BoneRig,
    angles: JointAngles,
    bone_transforms: [BoneTransform; BONE_COUNT],
    joint_transforms: [JointTransform; Landmark::COUNT],
    applied: u64,
    decode_failures: u64,
}

impl SkeletonState {
    pub fn new(config: &SkeletonConfig) -> Self {
        let model = SkeletonModel::new(config.global_scale, config.missing_joints);
        let rig = BoneRig::new(config.virtual_bones);
        let joint_size = config.scaled_joint_size();
        let joint_transforms = std::array::from_fn(|i| model.joints()[i].transform(joint_size));
        let bone_transforms = std::array::from_fn(|i| {
            rig.segments()[i].transform(crate::skeleton::BONES[i].side)
        });
        Self {
            config: config.clone(),
            model,
            rig,
            angles: JointAngles::default(),
            bone_transforms,
            joint_transforms,
            applied: 0,
            decode_failures: 0,
        }
    }

    /// ペイロードをデコードしてモデル・ボーン・角度を更新する
    ///
    /// デコードに失敗した場合はモデルに触れない。
    pub fn apply_payload(&mut self, payload: &str) -> Result<u64, DecodeError> {
        let frame = match decode_frame(payload) {
            Ok(frame) => frame,
            Err(e) => {
                self.decode_failures += 1;
                return Err(e);
            }
        };

        let summary = self.model.merge(&frame);
        if summary.ignored > 0 {
            debug!(frame = frame.frame, ignored = summary.ignored, "out-of-range joint ids ignored");
        }
        self.rig
            .reconstruct(&self.model, self.config.scaled_bone_thickness());
        self.angles = JointAngles::compute(&self.model);

        let joint_size = self.config.scaled_joint_size();
        for (slot, joint) in self.joint_transforms.iter_mut().zip(self.model.joints()) {
            *slot = joint.transform(joint_size);
        }
        self.rig.write_transforms(&mut self.bone_transforms);

        self.applied += 1;
        Ok(frame.frame)
    }

    /// 現在の状態を描画先に渡す
    pub fn publish(&self, render: &mut dyn RenderSink, dashboard: &mut dyn DashboardSink) {
        render.submit(&self.bone_transforms, &self.joint_transforms);
        dashboard.show(&self.angles.dashboard_text());
    }

    pub fn model(&self) -> &SkeletonModel {
        &self.model
    }

    pub fn rig(&self) -> &BoneRig {
        &self.rig
    }

    pub fn angles(&self) -> &JointAngles {
        &self.angles
    }

    pub fn bone_transforms(&self) -> &[BoneTransform] {
        &self.bone_transforms
    }

    pub fn joint_transforms(&self) -> &[JointTransform] {
        &self.joint_transforms
    }
}

/// 受信スレッド + 消費側状態のライフサイクル
pub struct SkeletonPipeline {
    listener: UdpListener,
    state: SkeletonState,
}

impl SkeletonPipeline {
    /// ソケットをバインドし、状態を確保して受信スレッドを起動する
    pub fn start(config: &Config) -> Result<Self, ListenerError> {
        let listener = UdpListener::start(&config.network)?;
        Ok(Self::with_listener(listener, &config.skeleton))
    }

    pub fn with_listener(listener: UdpListener, config: &SkeletonConfig) -> Self {
        Self {
            listener,
            state: SkeletonState::new(config),
        }
    }

    /// 外部スケジューラから1 tick に最大1回呼ぶ
    pub fn tick(
        &mut self,
        render: &mut dyn RenderSink,
        dashboard: &mut dyn DashboardSink,
    ) -> TickOutcome {
        let Some(payload) = self.listener.mailbox().take() else {
            return TickOutcome::Idle;
        };

        match self.state.apply_payload(&payload) {
            Ok(frame) => {
                self.state.publish(render, dashboard);
                TickOutcome::Applied { frame }
            }
            Err(e) => {
                debug!(error = %e, bytes = payload.len(), "dropping undecodable payload");
                TickOutcome::Dropped
            }
        }
    }

    /// 受信を止めてソケットを閉じる。何度呼んでもよい
    pub fn stop(&mut self) {
        if self.listener.is_closed() {
            return;
        }
        self.listener.stop();
        if !self.listener.is_closed() {
            return;
        }
        let stats = self.stats();
        info!(
            applied = stats.applied,
            decode_failures = stats.decode_failures,
            overwritten = stats.overwritten,
            "skeleton pipeline stopped"
        );
    }

    pub fn is_stopped(&self) -> bool {
        self.listener.is_closed()
    }

    pub fn listener(&self) -> &UdpListener {
        &self.listener
    }

    pub fn state(&self) -> &SkeletonState {
        &self.state
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            applied: self.state.applied,
            decode_failures: self.state.decode_failures,
            overwritten: self.listener.mailbox().overwritten(),
        }
    }
}

impl Drop for SkeletonPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
