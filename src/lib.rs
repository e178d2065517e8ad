pub mod config;
pub mod error;
pub mod logging;
pub mod net;
pub mod pipeline;
pub mod pose;
pub mod protocol;
pub mod recorder;
pub mod render;
pub mod skeleton;
