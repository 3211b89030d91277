//! 基础设施层
//!
//! 持有浏览器与页面资源，只向上暴露 [`RemoteSurface`] 能力

pub mod cdp_surface;
pub mod js_executor;
pub mod surface;

pub use cdp_surface::CdpSurface;
pub use js_executor::JsExecutor;
pub use surface::{
    Checkpoint, Intent, LoadState, RemoteSurface, ResultRow, SurfaceId, WaitCondition,
};
