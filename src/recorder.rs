use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::skeleton::JointAngles;

pub const CSV_HEADER: &str = "Timestamp,Frame,L_Elbow,R_Elbow,L_Knee,R_Knee";

/// CSVの1行。角度は小数1桁の文字列で書く
#[derive(Debug, Serialize)]
struct AngleRow {
    timestamp: String,
    frame: u64,
    l_elbow: String,
    r_elbow: String,
    l_knee: String,
    r_knee: String,
}

impl AngleRow {
    fn new(frame: u64, angles: &JointAngles) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%H:%M:%S%.3f").to_string(),
            frame,
            l_elbow: format!("{:.1}", angles.left_elbow),
            r_elbow: format!("{:.1}", angles.right_elbow),
            l_knee: format!("{:.1}", angles.left_knee),
            r_knee: format!("{:.1}", angles.right_knee),
        }
    }
}

/// 関節角度をCSVに記録する
pub struct AngleRecorder<W: Write> {
    wtr: csv::Writer<W>,
    rows: u64,
}

impl AngleRecorder<BufWriter<File>> {
    /// `dir/Rehab_Data_YYYYmmdd_HHMMSS.csv` を作成
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<(Self, PathBuf)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("Rehab_Data_{}.csv", ts));
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let recorder = Self::from_writer(BufWriter::new(file))?;
        Ok((recorder, path))
    }
}

impl<W: Write> AngleRecorder<W> {
    /// ヘッダ行はデータ行が無くても書く
    pub fn from_writer(writer: W) -> Result<Self> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(CSV_HEADER.split(','))?;
        Ok(Self { wtr, rows: 0 })
    }

    /// 1行書き込む。全角度が揃っていないフレームは書かない
    pub fn record(&mut self, frame: u64, angles: &JointAngles) -> Result<bool> {
        if !angles.complete {
            return Ok(false);
        }
        self.wtr.serialize(AngleRow::new(frame, angles))?;
        self.rows += 1;
        Ok(true)
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// フラッシュして writer を返す
    pub fn finish(mut self) -> Result<W> {
        self.wtr.flush()?;
        self.wtr
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV: {}", e.error()))
    }
}
