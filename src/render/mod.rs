pub mod sink;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use sink::{ConsoleDashboard, DashboardSink, NullRenderSink, RenderSink};
pub use skeleton::bone_color;
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
