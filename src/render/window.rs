use anyhow::Result;
use minifb::{Key, Window, WindowOptions};
use nalgebra::Vector3;

use crate::render::sink::RenderSink;
use crate::render::skeleton::{bone_color, BACKGROUND_COLOR, JOINT_COLOR};
use crate::skeleton::{BoneTransform, JointTransform};

/// 画面の縦半分に収める表示空間の範囲
const VIEW_HALF_EXTENT: f32 = 20.0;

/// 投影後の座標を画面サイズの何倍まで許すか。線分のステップ数を抑える
const PROJECT_MARGIN: f32 = 1.0;

/// 表示座標 → ピクセル座標 (Z は捨てる)
///
/// 画面外の点は画面の周囲 `PROJECT_MARGIN` 倍の範囲に丸める。
fn project_point(p: &Vector3<f32>, width: usize, height: usize, pixels_per_unit: f32) -> (i32, i32) {
    let (w, h) = (width as f32, height as f32);
    let px = w / 2.0 + p.x * pixels_per_unit;
    let py = h / 2.0 - p.y * pixels_per_unit;
    // NaN は clamp を素通りするので as キャストで 0 になる
    let px = px.clamp(-w * PROJECT_MARGIN, w * (1.0 + PROJECT_MARGIN));
    let py = py.clamp(-h * PROJECT_MARGIN, h * (1.0 + PROJECT_MARGIN));
    (px as i32, py as i32)
}

/// minifbを使用した正面投影のデバッグビュー
pub struct MinifbRenderer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    pixels_per_unit: f32,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        Ok(Self {
            window,
            buffer: vec![BACKGROUND_COLOR; width * height],
            width,
            height,
            pixels_per_unit: height as f32 / (2.0 * VIEW_HALF_EXTENT),
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    fn project(&self, p: &Vector3<f32>) -> (i32, i32) {
        project_point(p, self.width, self.height, self.pixels_per_unit)
    }

    fn clear(&mut self) {
        self.buffer.fill(BACKGROUND_COLOR);
    }

    /// ボーンを描画。端点は中点と向き・長さから復元する
    fn draw_bone(&mut self, bone: &BoneTransform) {
        let half = bone.orientation * bone.scale.y;
        let (x0, y0) = self.project(&(bone.midpoint - half));
        let (x1, y1) = self.project(&(bone.midpoint + half));
        self.draw_line(x0, y0, x1, y1, bone_color(bone.side));
    }

    fn draw_joint(&mut self, joint: &JointTransform) {
        let (x, y) = self.project(&joint.position);
        let radius = ((joint.scale * self.pixels_per_unit) / 2.0).max(2.0) as i32;
        self.draw_circle(x, y, radius, JOINT_COLOR);
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}

impl RenderSink for MinifbRenderer {
    fn submit(&mut self, bones: &[BoneTransform], joints: &[JointTransform]) {
        self.clear();
        for bone in bones.iter().filter(|b| b.active) {
            self.draw_bone(bone);
        }
        for joint in joints.iter().filter(|j| j.active) {
            self.draw_joint(joint);
        }
        if let Err(e) = self.update() {
            tracing::warn!(error = %e, "debug view update failed");
        }
    }
}
