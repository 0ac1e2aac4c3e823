mod input;
mod loop_runner;
mod metrics;
mod physics;
mod rendering;
mod scene;
mod ui;

pub use input::InputAction;
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use metrics::LoopMetricsSnapshot;
pub use physics::{CollisionWorld, Rect, SolidGrid, StaticBody};
pub use rendering::{
    glyph_advance_px, line_height_px, screen_to_world_px, text_width_px, world_to_screen_px,
    Renderer, PLACEHOLDER_HALF_SIZE_PX,
};
pub use scene::{
    Camera2D, Entity, EntityId, InputSnapshot, RenderableDesc, RenderableKind, Scene,
    SceneCommand, SceneId, SceneMachineError, SceneSwitch, SceneWorld, SpawnParams, Transform,
    Vec2, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN,
};
pub use ui::{wrap_text, ScreenRect, UiElement, UiOverlay};
