use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::{Camera2D, RenderableKind, SceneWorld, UiElement, Vec2};
use crate::asset_keys::image_path_for_key;
use crate::map::TileLayerStack;

use super::text::{
    draw_filled_rect, draw_rect_outline, draw_text_clipped, line_height_px, text_width_px,
    write_pixel_rgba_clipped,
};
use super::{world_to_screen_px, PLACEHOLDER_HALF_SIZE_PX};

const CLEAR_COLOR: [u8; 4] = [16, 18, 24, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const MISSING_TILE_COLOR: [u8; 4] = [68, 74, 62, 255];
const DEBUG_TEXT_SCALE: i32 = 2;
const DEBUG_PADDING_PX: i32 = 8;
const DEBUG_TEXT_COLOR: [u8; 4] = [244, 248, 252, 255];
const DEBUG_PANEL_COLOR: [u8; 4] = [10, 12, 16, 210];
const DEBUG_PANEL_BORDER_COLOR: [u8; 4] = [92, 106, 126, 255];

struct LoadedSprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpriteRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DestRect {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileRange {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

type SpriteCache = HashMap<String, Option<LoadedSprite>>;

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: (u32, u32),
    assets_dir: PathBuf,
    sprite_cache: SpriteCache,
    warned_missing_sprite_keys: HashSet<String>,
    entity_draw_order: Vec<usize>,
}

impl Renderer {
    pub fn new(window: Arc<Window>, assets_dir: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: (size.width, size.height),
            assets_dir,
            sprite_cache: HashMap::new(),
            warned_missing_sprite_keys: HashSet::new(),
            entity_draw_order: Vec::new(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = (width, height);
        Ok(())
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render_world(
        &mut self,
        world: &SceneWorld,
        debug_lines: Option<&[String]>,
    ) -> Result<(), Error> {
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return Ok(());
        }

        let assets_dir = self.assets_dir.as_path();
        let cache = &mut self.sprite_cache;
        let warned = &mut self.warned_missing_sprite_keys;
        let frame = self.pixels.frame_mut();
        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&CLEAR_COLOR);
        }

        if let Some(stack) = world.tile_layers() {
            draw_tile_layers(frame, width, height, world.camera(), stack, cache, warned, assets_dir);
        }

        collect_sorted_entity_draw_indices(world, &mut self.entity_draw_order);
        let zoom = world.camera().effective_zoom();
        for index in self.entity_draw_order.iter().copied() {
            let entity = &world.entities()[index];
            let (cx, cy) = world_to_screen_px(world.camera(), (width, height), entity.transform.position);
            draw_renderable_centered(
                frame,
                width,
                height,
                cx,
                cy,
                &entity.renderable.kind,
                entity.scale * zoom,
                None,
                cache,
                warned,
                assets_dir,
            );
        }

        for element in world.ui().elements() {
            draw_ui_element(frame, width, height, element, cache, warned, assets_dir);
        }

        if let Some(lines) = debug_lines {
            draw_debug_lines(frame, width, height, lines);
        }

        self.pixels.render()
    }
}

/// Lower depth first, then higher on screen first, then spawn order.
fn collect_sorted_entity_draw_indices(world: &SceneWorld, out: &mut Vec<usize>) {
    out.clear();
    out.extend(0..world.entities().len());
    let entities = world.entities();
    out.sort_by(|a, b| {
        let (a, b) = (&entities[*a], &entities[*b]);
        a.depth
            .cmp(&b.depth)
            .then(a.transform.position.y.total_cmp(&b.transform.position.y))
            .then(a.applied_spawn_order().cmp(&b.applied_spawn_order()))
    });
}

#[allow(clippy::too_many_arguments)]
fn draw_tile_layers(
    frame: &mut [u8],
    width: u32,
    height: u32,
    camera: &Camera2D,
    stack: &TileLayerStack,
    cache: &mut SpriteCache,
    warned: &mut HashSet<String>,
    assets_dir: &Path,
) {
    let Some(range) = visible_tile_range(camera, (width, height), stack) else {
        return;
    };
    let tile_w = stack.tile_width as f32;
    let tile_h = stack.tile_height as f32;

    for layer in stack.layers().iter().filter(|layer| layer.visible) {
        for ty in range.min_y..=range.max_y {
            for tx in range.min_x..=range.max_x {
                let gid = layer.gid_at(tx, ty);
                if gid == 0 {
                    continue;
                }
                let (left, top) = world_to_screen_px(
                    camera,
                    (width, height),
                    Vec2::new(tx as f32 * tile_w, ty as f32 * tile_h),
                );
                let (right, bottom) = world_to_screen_px(
                    camera,
                    (width, height),
                    Vec2::new((tx + 1) as f32 * tile_w, (ty + 1) as f32 * tile_h),
                );
                let dest = DestRect {
                    left,
                    top,
                    width: right - left,
                    height: bottom - top,
                };

                let resolved = resolve_tile(stack, gid, cache, warned, assets_dir);
                match resolved {
                    Some((sprite, region)) => {
                        blit_region(frame, width, height, dest, sprite, region)
                    }
                    None => draw_filled_rect(
                        frame,
                        width,
                        height,
                        dest.left,
                        dest.top,
                        dest.width,
                        dest.height,
                        MISSING_TILE_COLOR,
                    ),
                }
            }
        }
    }
}

fn resolve_tile<'a>(
    stack: &TileLayerStack,
    gid: u32,
    cache: &'a mut SpriteCache,
    warned: &mut HashSet<String>,
    assets_dir: &Path,
) -> Option<(&'a LoadedSprite, SpriteRegion)> {
    let (tileset, local) = stack.lookup(gid)?;
    let sprite = resolve_cached_sprite(cache, warned, assets_dir, &tileset.image_key)?;
    let columns = if tileset.columns == 0 {
        sprite.width / tileset.tile_width
    } else {
        tileset.columns
    };
    let region = grid_region(
        sprite.width,
        sprite.height,
        tileset.tile_width,
        tileset.tile_height,
        columns,
        local,
    )?;
    Some((sprite, region))
}

fn resolve_renderable<'a>(
    kind: &RenderableKind,
    cache: &'a mut SpriteCache,
    warned: &mut HashSet<String>,
    assets_dir: &Path,
) -> Option<(&'a LoadedSprite, SpriteRegion)> {
    let key = renderable_key(kind)?;
    let sprite = resolve_cached_sprite(cache, warned, assets_dir, key)?;
    let region = renderable_region(sprite, kind)?;
    Some((sprite, region))
}

fn visible_tile_range(
    camera: &Camera2D,
    window_size: (u32, u32),
    stack: &TileLayerStack,
) -> Option<TileRange> {
    if stack.width == 0 || stack.height == 0 {
        return None;
    }
    let zoom = camera.effective_zoom();
    let half_w = window_size.0 as f32 / zoom * 0.5;
    let half_h = window_size.1 as f32 / zoom * 0.5;
    let tile_w = stack.tile_width as f32;
    let tile_h = stack.tile_height as f32;

    let min_x = ((camera.position.x - half_w) / tile_w).floor() as i64;
    let max_x = ((camera.position.x + half_w) / tile_w).floor() as i64;
    let min_y = ((camera.position.y - half_h) / tile_h).floor() as i64;
    let max_y = ((camera.position.y + half_h) / tile_h).floor() as i64;
    if max_x < 0 || max_y < 0 || min_x >= stack.width as i64 || min_y >= stack.height as i64 {
        return None;
    }
    Some(TileRange {
        min_x: min_x.max(0) as u32,
        min_y: min_y.max(0) as u32,
        max_x: (max_x as u32).min(stack.width - 1),
        max_y: (max_y as u32).min(stack.height - 1),
    })
}

/// Cell `index` of an image cut into `cell_width` x `cell_height` cells,
/// `columns` per row.
fn grid_region(
    image_width: u32,
    image_height: u32,
    cell_width: u32,
    cell_height: u32,
    columns: u32,
    index: u32,
) -> Option<SpriteRegion> {
    if cell_width == 0 || cell_height == 0 || columns == 0 {
        return None;
    }
    let x = (index % columns) * cell_width;
    let y = (index / columns) * cell_height;
    if x + cell_width > image_width || y + cell_height > image_height {
        return None;
    }
    Some(SpriteRegion {
        x,
        y,
        width: cell_width,
        height: cell_height,
    })
}

fn full_region(sprite: &LoadedSprite) -> SpriteRegion {
    SpriteRegion {
        x: 0,
        y: 0,
        width: sprite.width,
        height: sprite.height,
    }
}

fn renderable_region(sprite: &LoadedSprite, kind: &RenderableKind) -> Option<SpriteRegion> {
    match kind {
        RenderableKind::Placeholder => None,
        RenderableKind::Image(_) => Some(full_region(sprite)),
        RenderableKind::SheetFrame {
            frame,
            frame_width,
            frame_height,
            ..
        } => {
            let columns = sprite.width / (*frame_width).max(1);
            grid_region(
                sprite.width,
                sprite.height,
                *frame_width,
                *frame_height,
                columns,
                *frame,
            )
        }
    }
}

fn renderable_key(kind: &RenderableKind) -> Option<&str> {
    match kind {
        RenderableKind::Placeholder => None,
        RenderableKind::Image(key) => Some(key),
        RenderableKind::SheetFrame { sheet, .. } => Some(sheet),
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_renderable_centered(
    frame: &mut [u8],
    width: u32,
    height: u32,
    center_x: i32,
    center_y: i32,
    kind: &RenderableKind,
    scale: f32,
    max_size_px: Option<i32>,
    cache: &mut SpriteCache,
    warned: &mut HashSet<String>,
    assets_dir: &Path,
) {
    let resolved = resolve_renderable(kind, cache, warned, assets_dir);
    let Some((sprite, region)) = resolved else {
        draw_filled_rect(
            frame,
            width,
            height,
            center_x - PLACEHOLDER_HALF_SIZE_PX,
            center_y - PLACEHOLDER_HALF_SIZE_PX,
            PLACEHOLDER_HALF_SIZE_PX * 2 + 1,
            PLACEHOLDER_HALF_SIZE_PX * 2 + 1,
            PLACEHOLDER_COLOR,
        );
        return;
    };

    let mut scale = normalized_sprite_scale(scale);
    if let Some(max_size) = max_size_px {
        let largest = region.width.max(region.height) as f32 * scale;
        if largest > max_size as f32 {
            scale *= max_size as f32 / largest;
        }
    }
    let dest_w = (region.width as f32 * scale).round().max(1.0) as i32;
    let dest_h = (region.height as f32 * scale).round().max(1.0) as i32;
    let dest = DestRect {
        left: center_x - dest_w / 2,
        top: center_y - dest_h / 2,
        width: dest_w,
        height: dest_h,
    };
    blit_region(frame, width, height, dest, sprite, region);
}

fn draw_ui_element(
    frame: &mut [u8],
    width: u32,
    height: u32,
    element: &UiElement,
    cache: &mut SpriteCache,
    warned: &mut HashSet<String>,
    assets_dir: &Path,
) {
    match element {
        UiElement::Panel { rect, fill, border } => {
            draw_filled_rect(frame, width, height, rect.x, rect.y, rect.width, rect.height, *fill);
            if let Some(border) = border {
                draw_rect_outline(
                    frame,
                    width,
                    height,
                    rect.x,
                    rect.y,
                    rect.width,
                    rect.height,
                    *border,
                );
            }
        }
        UiElement::Text {
            x,
            y,
            text,
            color,
            scale,
        } => draw_text_clipped(frame, width, height, *x, *y, text, *color, *scale),
        UiElement::Image {
            center_x,
            center_y,
            renderable,
            scale,
            max_size_px,
        } => draw_renderable_centered(
            frame,
            width,
            height,
            *center_x,
            *center_y,
            renderable,
            *scale,
            *max_size_px,
            cache,
            warned,
            assets_dir,
        ),
    }
}

fn draw_debug_lines(frame: &mut [u8], width: u32, height: u32, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let line_height = line_height_px(DEBUG_TEXT_SCALE);
    let text_width = lines
        .iter()
        .map(|line| text_width_px(line, DEBUG_TEXT_SCALE))
        .max()
        .unwrap_or(0);
    let panel_w = text_width + DEBUG_PADDING_PX * 2;
    let panel_h = line_height * lines.len() as i32 + DEBUG_PADDING_PX * 2;
    draw_filled_rect(frame, width, height, 0, 0, panel_w, panel_h, DEBUG_PANEL_COLOR);
    draw_rect_outline(frame, width, height, 0, 0, panel_w, panel_h, DEBUG_PANEL_BORDER_COLOR);
    for (index, line) in lines.iter().enumerate() {
        draw_text_clipped(
            frame,
            width,
            height,
            DEBUG_PADDING_PX,
            DEBUG_PADDING_PX + index as i32 * line_height,
            line,
            DEBUG_TEXT_COLOR,
            DEBUG_TEXT_SCALE,
        );
    }
}

fn resolve_cached_sprite<'a>(
    cache: &'a mut SpriteCache,
    warned_missing_sprite_keys: &mut HashSet<String>,
    assets_dir: &Path,
    key: &str,
) -> Option<&'a LoadedSprite> {
    if !cache.contains_key(key) {
        let sprite = match image_path_for_key(assets_dir, key) {
            Ok(path) => match load_sprite_rgba(&path) {
                Ok(sprite) => Some(sprite),
                Err(reason) => {
                    warn_sprite_load_once(warned_missing_sprite_keys, key, Some(&path), &reason);
                    None
                }
            },
            Err(error) => {
                let reason = format!("invalid_key:{error}");
                warn_sprite_load_once(warned_missing_sprite_keys, key, None, &reason);
                None
            }
        };
        cache.insert(key.to_string(), sprite);
    }
    cache.get(key).and_then(Option::as_ref)
}

fn load_sprite_rgba(path: &Path) -> Result<LoadedSprite, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedSprite {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

fn warn_sprite_load_once(
    warned_keys: &mut HashSet<String>,
    key: &str,
    resolved_path: Option<&Path>,
    reason: &str,
) {
    if !warned_keys.insert(key.to_string()) {
        return;
    }
    let path_display = resolved_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unresolved>".to_string());
    warn!(
        image_key = key,
        path = %path_display,
        reason = reason,
        "renderer_image_load_failed_using_placeholder"
    );
}

fn normalized_sprite_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// Nearest-neighbour copy of `region` stretched over `dest`, clipped to the frame.
fn blit_region(
    frame: &mut [u8],
    width: u32,
    height: u32,
    dest: DestRect,
    sprite: &LoadedSprite,
    region: SpriteRegion,
) {
    if dest.width <= 0 || dest.height <= 0 || region.width == 0 || region.height == 0 {
        return;
    }
    let expected_rgba_len = sprite.width as usize * sprite.height as usize * 4;
    if sprite.rgba.len() < expected_rgba_len
        || region.x + region.width > sprite.width
        || region.y + region.height > sprite.height
    {
        return;
    }

    let draw_left = dest.left.max(0);
    let draw_top = dest.top.max(0);
    let draw_right = (dest.left + dest.width).min(width as i32);
    let draw_bottom = (dest.top + dest.height).min(height as i32);
    let sprite_width = sprite.width as usize;

    for out_y in draw_top..draw_bottom {
        let dy = (out_y - dest.top) as u32;
        let src_y = region.y + (dy * region.height / dest.height as u32).min(region.height - 1);
        for out_x in draw_left..draw_right {
            let dx = (out_x - dest.left) as u32;
            let src_x = region.x + (dx * region.width / dest.width as u32).min(region.width - 1);
            let offset = (src_y as usize * sprite_width + src_x as usize) * 4;
            let color = [
                sprite.rgba[offset],
                sprite.rgba[offset + 1],
                sprite.rgba[offset + 2],
                sprite.rgba[offset + 3],
            ];
            if color[3] == 0 {
                continue;
            }
            write_pixel_rgba_clipped(frame, width, height, out_x, out_y, color);
        }
    }
}
