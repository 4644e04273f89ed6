use std::fmt;
use std::sync::Arc;

use crate::frame::Frame;

/// Ordering bucket for GL submissions within a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderStage {
    Background,
    Foreground,
}

/// Draw callback handed to the renderer. Invoked at most once per frame.
pub type RenderFn = Arc<dyn Fn(Frame) + Send + Sync>;

#[derive(Clone)]
pub struct GlRender {
    pub frame_id: u64,
    pub needs_render: bool,
    pub render: RenderFn,
    pub stage: RenderStage,
}

impl fmt::Debug for GlRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlRender")
            .field("frame_id", &self.frame_id)
            .field("needs_render", &self.needs_render)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// A named per-frame render submission.
#[derive(Debug, Clone)]
pub struct GlRenderHash {
    pub name: String,
    pub render: GlRender,
}

impl GlRenderHash {
    /// Run the draw callback for the frame this submission belongs to.
    pub fn draw(&self) {
        (self.render.render)(Frame::new(self.render.frame_id));
    }
}
