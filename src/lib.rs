//! Zoomable image viewer core: pinch, pan and double-tap gestures over a 4x4
//! model transform, bounded and animated, drawn from level-of-detail bitmaps
//! rasterized in the background.

pub mod animation;
pub mod bounds;
pub mod errors;
pub mod gesture;
pub mod gpu;
pub mod logging;
pub mod math;
pub mod render_cache;
pub mod settings;
pub mod surface;
pub mod task_scheduler;
pub mod view;

#[cfg(test)]
mod tests;

pub use errors::{Result, ViewerError};
pub use gesture::{GesturePhase, PanDirection, PanEvent, PanningDelegate, PinchEvent, TapEvent};
pub use math::{Point, Rect, Size, Transform};
pub use settings::Settings;
pub use surface::{SurfaceHost, SurfaceListener};
pub use view::{FrameOutcome, ImageView};
