mod renderer;
mod text;
mod transform;

pub use renderer::Renderer;
pub use text::{glyph_advance_px, line_height_px, text_width_px};
pub use transform::{screen_to_world_px, world_to_screen_px};

pub const PLACEHOLDER_HALF_SIZE_PX: i32 = 5;
