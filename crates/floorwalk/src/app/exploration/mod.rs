use std::path::PathBuf;
use std::rc::Rc;

use engine::{
    line_height_px, load_map, text_width_px, Camera2D, InputAction, InputSnapshot, ObjectLayer,
    Rect, Scene, SceneCommand, SceneWorld, ScreenRect, SolidGrid, SpawnParams, TiledMap,
    UiElement,
};
use tracing::{debug, error, info, warn};

use super::catalog::SceneConfig;
use super::dialogue_window::DialogueWindow;
use crate::dialogue::{DialogueSession, SessionEvent};
use crate::npc::{records_from_rows, DialogueDataProvider, NpcRegistry, PendingFetch};
use crate::transition::{TransitionCoordinator, TELEPORT_LAYER};

mod player;

use player::PlayerController;

pub(crate) const CAMERA_ZOOM: f32 = 2.0;
pub(crate) const CAMERA_LERP: f32 = 0.08;
const FALLBACK_VIEWPORT: (u32, u32) = (800, 600);
const NPC_LAYER: &str = "npcs";
const RENDER_LAYERS: [&str; 4] = ["floor", "walls", "decorwithcollision", "decors"];
const COLLISION_LAYERS: [&str; 2] = ["walls", "decorwithcollision"];
const FLOOR_LABEL_CENTER: (i32, i32) = (100, 50);
const FLOOR_LABEL_PADDING: (i32, i32) = (15, 10);
const FLOOR_LABEL_SCALE: i32 = 2;
const FLOOR_LABEL_FILL: [u8; 4] = [200, 30, 30, 255];
const FLOOR_LABEL_TEXT: [u8; 4] = [255, 255, 255, 255];

/// One floor of the building. Every catalog entry gets its own instance.
pub(crate) struct ExplorationScene {
    config: SceneConfig,
    maps_dir: PathBuf,
    provider: Option<Rc<dyn DialogueDataProvider>>,
    /// Dropped on unload, so a late answer has nobody to deliver to.
    pending_fetch: Option<PendingFetch>,
    map_ready: bool,
    npc_layer: Option<ObjectLayer>,
    registry: NpcRegistry,
    session: DialogueSession,
    window: DialogueWindow,
    transitions: TransitionCoordinator,
    player: Option<PlayerController>,
    viewport: (u32, u32),
}

impl ExplorationScene {
    pub(crate) fn new(
        config: SceneConfig,
        maps_dir: PathBuf,
        provider: Option<Rc<dyn DialogueDataProvider>>,
    ) -> Self {
        Self {
            config,
            maps_dir,
            provider,
            pending_fetch: None,
            map_ready: false,
            npc_layer: None,
            registry: NpcRegistry::default(),
            session: DialogueSession::default(),
            window: DialogueWindow::default(),
            transitions: TransitionCoordinator::default(),
            player: None,
            viewport: FALLBACK_VIEWPORT,
        }
    }

    #[cfg(test)]
    fn player(&self) -> Option<&PlayerController> {
        self.player.as_ref()
    }

    fn reset(&mut self, world: &mut SceneWorld) {
        self.pending_fetch = None;
        self.map_ready = false;
        self.npc_layer = None;
        self.registry.clear(world);
        self.session = DialogueSession::default();
        self.window = DialogueWindow::default();
        self.transitions = TransitionCoordinator::default();
        self.player = None;
    }

    fn load_world_map(&mut self, world: &mut SceneWorld) -> Option<TiledMap> {
        let (path, map) = match load_map(&self.maps_dir, &self.config.map_key) {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(
                    scene = %self.config.scene_id,
                    map_key = %self.config.map_key,
                    error = %err,
                    "map_load_failed"
                );
                return None;
            }
        };

        let binding = map.bind_tilesets(&self.config.tileset_keys);
        for missing in &binding.missing {
            warn!(
                scene = %self.config.scene_id,
                tileset = %missing,
                "tileset_missing"
            );
        }
        if binding.bound.is_empty() {
            error!(
                scene = %self.config.scene_id,
                map = %path.display(),
                requested = self.config.tileset_keys.len(),
                "tilesets_unresolved"
            );
            return None;
        }

        world.set_tile_layers(map.layer_stack(&RENDER_LAYERS, binding.bound));
        let grid_layers = COLLISION_LAYERS
            .iter()
            .filter_map(|name| map.tile_layer(name));
        let grid = SolidGrid::from_layers(
            map.width,
            map.height,
            map.tile_width,
            map.tile_height,
            grid_layers,
        );
        debug!(
            scene = %self.config.scene_id,
            solid_cells = grid.solid_count(),
            "collision_grid_built"
        );
        world.collision_mut().set_grid(grid);

        info!(
            scene = %self.config.scene_id,
            map = %path.display(),
            width = map.width,
            height = map.height,
            "map_loaded"
        );
        Some(map)
    }

    fn request_npcs(&mut self) {
        let Some(provider) = &self.provider else {
            debug!(scene = %self.config.scene_id, "npc_provider_absent");
            return;
        };
        debug!(
            scene = %self.config.scene_id,
            provider = provider.kind(),
            "npc_fetch_requested"
        );
        self.pending_fetch = Some(provider.fetch(&self.config.scene_id));
    }

    fn poll_npc_fetch(&mut self, world: &mut SceneWorld) {
        let Some(pending) = &self.pending_fetch else {
            return;
        };
        let Some(result) = pending.try_take() else {
            return;
        };
        self.pending_fetch = None;

        let rows = match result {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    scene = %self.config.scene_id,
                    error = %err,
                    "npc_data_unavailable"
                );
                return;
            }
        };
        let records = records_from_rows(&self.config.scene_id, rows);
        if records.is_empty() {
            warn!(scene = %self.config.scene_id, "npc_data_empty");
            return;
        }
        info!(
            scene = %self.config.scene_id,
            record_count = records.len(),
            "npc_data_loaded"
        );
        self.registry.spawn(self.npc_layer.as_ref(), records, world);
        world.apply_pending();
    }

    fn rebuild_ui(&self, world: &mut SceneWorld) {
        let ui = world.ui_mut();
        ui.clear();

        if !self.config.floor_label.is_empty() {
            let text_width = text_width_px(&self.config.floor_label, FLOOR_LABEL_SCALE);
            let text_height = line_height_px(FLOOR_LABEL_SCALE);
            let width = text_width + FLOOR_LABEL_PADDING.0 * 2;
            let height = text_height + FLOOR_LABEL_PADDING.1 * 2;
            let x = (FLOOR_LABEL_CENTER.0 - width / 2).max(0);
            let y = (FLOOR_LABEL_CENTER.1 - height / 2).max(0);
            ui.push(UiElement::Panel {
                rect: ScreenRect::new(x, y, width, height),
                fill: FLOOR_LABEL_FILL,
                border: None,
            });
            ui.push(UiElement::Text {
                x: x + FLOOR_LABEL_PADDING.0,
                y: y + FLOOR_LABEL_PADDING.1,
                text: self.config.floor_label.clone(),
                color: FLOOR_LABEL_TEXT,
                scale: FLOOR_LABEL_SCALE,
            });
        }

        self.window.draw(ui, self.viewport);
    }
}

fn effective_viewport(window_size: (u32, u32)) -> (u32, u32) {
    if window_size.0 == 0 || window_size.1 == 0 {
        FALLBACK_VIEWPORT
    } else {
        window_size
    }
}

impl Scene for ExplorationScene {
    fn load(&mut self, world: &mut SceneWorld, spawn: &SpawnParams) {
        self.reset(world);

        let Some(map) = self.load_world_map(world) else {
            self.rebuild_ui(world);
            return;
        };
        self.map_ready = true;

        let map_bounds = Rect::new(
            0.0,
            0.0,
            map.pixel_width() as f32,
            map.pixel_height() as f32,
        );
        world.collision_mut().set_bounds(Some(map_bounds));

        let spawn_point = spawn.target.unwrap_or(self.config.default_spawn);
        let player = PlayerController::spawn(world, spawn_point);

        *world.camera_mut() = Camera2D::new(spawn_point, CAMERA_ZOOM);
        world.camera_mut().set_bounds(Some(map_bounds));
        world.camera_mut().snap_to(spawn_point, self.viewport);

        self.transitions =
            TransitionCoordinator::from_object_layer(map.object_layer(TELEPORT_LAYER));
        self.npc_layer = map.object_layer(NPC_LAYER).cloned();
        self.player = Some(player);
        world.apply_pending();

        self.request_npcs();
        self.rebuild_ui(world);

        info!(
            scene = %self.config.scene_id,
            spawn_x = spawn_point.x,
            spawn_y = spawn_point.y,
            from_previous_scene = spawn.target.is_some(),
            teleports = self.transitions.len(),
            "scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        self.viewport = effective_viewport(input.window_size());
        self.poll_npc_fetch(world);

        let Some(player) = self.player.as_mut() else {
            self.rebuild_ui(world);
            return SceneCommand::None;
        };

        let cancelled = self.session.is_interacting() && input.is_down(InputAction::Cancel);
        if cancelled {
            self.session.cancel(&mut self.window);
        } else {
            self.window.handle_input(input);
            if let Some(activation) = self.window.take_activation() {
                self.session.select_choice_for(
                    &activation.node_key,
                    activation.index,
                    &mut self.window,
                );
            }
            if input.interact_pressed() {
                let event = self.session.press_action(
                    player.position(),
                    self.registry.entities(),
                    &mut self.window,
                );
                if event == SessionEvent::Ignored && !self.session.is_interacting() {
                    debug!(scene = %self.config.scene_id, "interact_nobody_in_range");
                }
            }
        }

        if self.session.is_interacting() {
            player.halt();
        } else {
            player.step(fixed_dt_seconds, input, world.collision());
        }
        player.sync(world);

        if let Some(switch) = self.transitions.check(&player.body()) {
            info!(
                scene = %self.config.scene_id,
                target_scene = %switch.scene,
                target_x = switch.spawn.target.map(|target| target.x),
                target_y = switch.spawn.target.map(|target| target.y),
                "scene_transition_requested"
            );
            return SceneCommand::SwitchTo(switch);
        }

        let position = player.position();
        world
            .camera_mut()
            .follow(position, CAMERA_LERP, self.viewport);
        self.rebuild_ui(world);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if self.pending_fetch.is_some() {
            debug!(scene = %self.config.scene_id, "npc_fetch_dropped_on_unload");
        }
        self.reset(world);
        info!(scene = %self.config.scene_id, "scene_unloaded");
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(format!("Floorwalk | {}", self.config.floor_label))
    }

    fn debug_lines(&self, _world: &SceneWorld) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.map_ready {
            lines.push(format!("MAP {} UNAVAILABLE", self.config.map_key));
            return lines;
        }
        if let Some(player) = &self.player {
            let position = player.position();
            lines.push(format!(
                "PLAYER {:.0},{:.0} {:?}",
                position.x,
                position.y,
                player.facing()
            ));
            let nearest = self
                .registry
                .entities()
                .iter()
                .map(|npc| (npc.name(), player.distance_to(npc)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((name, distance)) = nearest {
                lines.push(format!("NEAREST NPC {name} {distance:.0}"));
            }
        }
        lines.push(format!(
            "NPCS {}  FETCH {}",
            self.registry.len(),
            if self.pending_fetch.is_some() { "PENDING" } else { "IDLE" }
        ));
        lines.push(format!(
            "DIALOGUE {}",
            if self.session.is_interacting() {
                self.session.current_node_key()
            } else {
                "-"
            }
        ));
        lines
    }
}

#[cfg(test)]
mod tests;
