use crate::app::{Camera2D, Vec2};

/// World and screen share the y-down convention; the camera position lands
/// on the window center and zoom is screen pixels per map pixel.
pub fn world_to_screen_px(camera: &Camera2D, window_size: (u32, u32), world: Vec2) -> (i32, i32) {
    let zoom = camera.effective_zoom();
    let x = (world.x - camera.position.x) * zoom + window_size.0 as f32 * 0.5;
    let y = (world.y - camera.position.y) * zoom + window_size.1 as f32 * 0.5;
    (x.round() as i32, y.round() as i32)
}

pub fn screen_to_world_px(camera: &Camera2D, window_size: (u32, u32), screen: Vec2) -> Vec2 {
    let zoom = camera.effective_zoom();
    Vec2::new(
        (screen.x - window_size.0 as f32 * 0.5) / zoom + camera.position.x,
        (screen.y - window_size.1 as f32 * 0.5) / zoom + camera.position.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_position_maps_to_window_center() {
        let camera = Camera2D::new(Vec2::new(540.0, 690.0), 1.0);
        assert_eq!(
            world_to_screen_px(&camera, (800, 600), Vec2::new(540.0, 690.0)),
            (400, 300)
        );
    }

    #[test]
    fn zoom_scales_offsets_and_y_grows_downward() {
        let camera = Camera2D::new(Vec2::new(10.0, 10.0), 2.0);
        assert_eq!(
            world_to_screen_px(&camera, (800, 600), Vec2::new(20.0, 15.0)),
            (420, 310)
        );
    }

    #[test]
    fn screen_to_world_inverts_world_to_screen() {
        let camera = Camera2D::new(Vec2::new(-3.0, 7.0), 2.0);
        let world = screen_to_world_px(&camera, (800, 600), Vec2::new(420.0, 310.0));
        assert_eq!(world, Vec2::new(7.0, 12.0));
    }
}
