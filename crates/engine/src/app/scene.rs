use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use super::input::{ActionStates, InputAction};
use super::physics::{CollisionWorld, Rect};
use super::ui::UiOverlay;
use crate::map::TileLayerStack;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the destination scene should place the player. `None` means the
/// scene's own default spawn point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpawnParams {
    pub target: Option<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSwitch {
    pub scene: SceneId,
    pub spawn: SpawnParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    None,
    SwitchTo(SceneSwitch),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    interact_pressed: bool,
    choice_pressed: Option<usize>,
    cursor_position_px: Option<Vec2>,
    left_click_pressed: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        quit_requested: bool,
        actions: ActionStates,
        interact_pressed: bool,
        choice_pressed: Option<usize>,
        cursor_position_px: Option<Vec2>,
        left_click_pressed: bool,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            actions,
            interact_pressed,
            choice_pressed,
            cursor_position_px,
            left_click_pressed,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the interact key went down.
    pub fn interact_pressed(&self) -> bool {
        self.interact_pressed
    }

    /// Zero-based choice index from the digit row, on the tick it was pressed.
    pub fn choice_pressed(&self) -> Option<usize> {
        self.choice_pressed
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_interact_pressed(mut self, interact_pressed: bool) -> Self {
        self.interact_pressed = interact_pressed;
        if interact_pressed {
            self.actions.set(InputAction::Interact, true);
        }
        self
    }

    pub fn with_choice_pressed(mut self, choice_pressed: Option<usize>) -> Self {
        self.choice_pressed = choice_pressed;
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, left_click_pressed: bool) -> Self {
        self.left_click_pressed = left_click_pressed;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// World position in map pixels, y growing downward like Tiled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        Vec2::new(self.x - other.x, self.y - other.y).length()
    }

    pub fn normalized_or_zero(self) -> Vec2 {
        let length = self.length();
        if length <= f32::EPSILON || !length.is_finite() {
            return Vec2::ZERO;
        }
        Vec2::new(self.x / length, self.y / length)
    }

    pub fn scaled(self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn offset(self, delta: Vec2) -> Vec2 {
        Vec2::new(self.x + delta.x, self.y + delta.y)
    }
}

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.25;
pub const CAMERA_ZOOM_MAX: f32 = 8.0;

/// `position` is the world point drawn at the center of the window.
#[derive(Debug, Clone, Copy)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
    bounds: Option<Rect>,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: CAMERA_ZOOM_DEFAULT,
            bounds: None,
        }
    }
}

impl Camera2D {
    pub fn new(position: Vec2, zoom: f32) -> Self {
        Self {
            position,
            zoom,
            bounds: None,
        }
    }

    pub fn effective_zoom(&self) -> f32 {
        if !self.zoom.is_finite() {
            return CAMERA_ZOOM_DEFAULT;
        }
        self.zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
    }

    pub fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Moves toward `target` by `lerp` of the remaining distance, then keeps
    /// the visible area inside the bounds.
    pub fn follow(&mut self, target: Vec2, lerp: f32, viewport_px: (u32, u32)) {
        let lerp = lerp.clamp(0.0, 1.0);
        self.position.x += (target.x - self.position.x) * lerp;
        self.position.y += (target.y - self.position.y) * lerp;
        self.clamp_to_bounds(viewport_px);
    }

    pub fn snap_to(&mut self, target: Vec2, viewport_px: (u32, u32)) {
        self.position = target;
        self.clamp_to_bounds(viewport_px);
    }

    fn clamp_to_bounds(&mut self, viewport_px: (u32, u32)) {
        let Some(bounds) = self.bounds else {
            return;
        };
        let zoom = self.effective_zoom();
        let half_w = viewport_px.0 as f32 / zoom * 0.5;
        let half_h = viewport_px.1 as f32 / zoom * 0.5;
        self.position.x = clamp_axis(self.position.x, bounds.x, bounds.right(), half_w);
        self.position.y = clamp_axis(self.position.y, bounds.y, bounds.bottom(), half_h);
    }
}

fn clamp_axis(value: f32, min: f32, max: f32, half_extent: f32) -> f32 {
    if max - min <= half_extent * 2.0 {
        return (min + max) * 0.5;
    }
    value.clamp(min + half_extent, max - half_extent)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Transform {
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderableKind {
    Placeholder,
    /// A whole image at `assets/images/<key>.png`.
    Image(String),
    /// One frame of a spritesheet laid out in rows of `frame_width` x `frame_height`.
    SheetFrame {
        sheet: String,
        frame: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

#[derive(Debug, Clone)]
pub struct RenderableDesc {
    pub kind: RenderableKind,
    pub debug_name: &'static str,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub renderable: RenderableDesc,
    pub scale: f32,
    pub depth: i32,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    camera: Camera2D,
    tile_layers: Option<TileLayerStack>,
    collision: CollisionWorld,
    ui: UiOverlay,
}

impl SceneWorld {
    pub fn spawn(&mut self, transform: Transform, renderable: RenderableDesc) -> EntityId {
        self.spawn_scaled(transform, renderable, 1.0, 0)
    }

    pub fn spawn_scaled(
        &mut self,
        transform: Transform,
        renderable: RenderableDesc,
        scale: f32,
        depth: i32,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            renderable,
            scale,
            depth,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_spawns
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_despawns.clear();
        }

        for mut entity in self.pending_spawns.drain(..) {
            entity.applied_spawn_order = self.next_applied_spawn_order;
            self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
            self.entities.push(entity);
        }
    }

    /// Drops everything scene-owned. Entity ids keep counting up.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.camera = Camera2D::default();
        self.tile_layers = None;
        self.collision.clear();
        self.ui.clear();
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn set_tile_layers(&mut self, layers: TileLayerStack) {
        self.tile_layers = Some(layers);
    }

    pub fn tile_layers(&self) -> Option<&TileLayerStack> {
        self.tile_layers.as_ref()
    }

    pub fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    pub fn collision_mut(&mut self) -> &mut CollisionWorld {
        &mut self.collision
    }

    pub fn ui(&self) -> &UiOverlay {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiOverlay {
        &mut self.ui
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld, spawn: &SpawnParams);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
    fn debug_lines(&self, _world: &SceneWorld) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneMachineError {
    #[error("no scenes registered")]
    Empty,
    #[error("scene id '{0}' registered twice")]
    DuplicateScene(SceneId),
}

struct SceneRuntime {
    id: SceneId,
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

/// Owns every registered scene; exactly one is active. The first registered
/// scene starts active.
pub(crate) struct SceneMachine {
    runtimes: Vec<SceneRuntime>,
    active: usize,
}

impl SceneMachine {
    pub(crate) fn new(scenes: Vec<(SceneId, Box<dyn Scene>)>) -> Result<Self, SceneMachineError> {
        if scenes.is_empty() {
            return Err(SceneMachineError::Empty);
        }
        let mut runtimes: Vec<SceneRuntime> = Vec::with_capacity(scenes.len());
        for (id, scene) in scenes {
            if runtimes.iter().any(|runtime| runtime.id == id) {
                return Err(SceneMachineError::DuplicateScene(id));
            }
            runtimes.push(SceneRuntime {
                id,
                scene,
                world: SceneWorld::default(),
                is_loaded: false,
            });
        }
        Ok(Self {
            runtimes,
            active: 0,
        })
    }

    pub(crate) fn active_scene(&self) -> &SceneId {
        &self.runtimes[self.active].id
    }

    pub(crate) fn load_active(&mut self, spawn: &SpawnParams) {
        let runtime = &mut self.runtimes[self.active];
        if runtime.is_loaded {
            return;
        }
        runtime.scene.load(&mut runtime.world, spawn);
        runtime.is_loaded = true;
        info!(
            scene = %runtime.id,
            entity_count = runtime.world.entity_count(),
            "scene_loaded"
        );
    }

    pub(crate) fn update_active(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> SceneCommand {
        let runtime = &mut self.runtimes[self.active];
        runtime
            .scene
            .update(fixed_dt_seconds, input, &mut runtime.world)
    }

    pub(crate) fn apply_pending_active(&mut self) {
        self.runtimes[self.active].world.apply_pending();
    }

    pub(crate) fn active_world(&self) -> &SceneWorld {
        &self.runtimes[self.active].world
    }

    #[cfg(test)]
    pub(crate) fn active_world_mut(&mut self) -> &mut SceneWorld {
        &mut self.runtimes[self.active].world
    }

    pub(crate) fn debug_title_active(&self) -> Option<String> {
        let runtime = &self.runtimes[self.active];
        runtime.scene.debug_title(&runtime.world)
    }

    pub(crate) fn debug_lines_active(&self) -> Vec<String> {
        let runtime = &self.runtimes[self.active];
        runtime.scene.debug_lines(&runtime.world)
    }

    /// Unloads the active scene and (re)starts the target with the given
    /// spawn parameters. Switching to the active scene restarts it.
    pub(crate) fn switch_to(&mut self, switch: &SceneSwitch) -> bool {
        let Some(next) = self
            .runtimes
            .iter()
            .position(|runtime| runtime.id == switch.scene)
        else {
            warn!(
                target_scene = %switch.scene,
                active_scene = %self.active_scene(),
                "scene_switch_unknown_target"
            );
            return false;
        };

        self.unload_runtime(self.active);
        self.unload_runtime(next);
        let from = self.active_scene().clone();
        self.active = next;
        info!(
            from = %from,
            to = %switch.scene,
            spawn_x = switch.spawn.target.map(|target| target.x),
            spawn_y = switch.spawn.target.map(|target| target.y),
            "scene_switch"
        );
        self.load_active(&switch.spawn);
        true
    }

    pub(crate) fn shutdown_all(&mut self) {
        for index in 0..self.runtimes.len() {
            self.unload_runtime(index);
        }
    }

    fn unload_runtime(&mut self, index: usize) {
        let runtime = &mut self.runtimes[index];
        if !runtime.is_loaded {
            return;
        }
        runtime.scene.unload(&mut runtime.world);
        runtime.world.clear();
        runtime.is_loaded = false;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn placeholder(debug_name: &'static str) -> RenderableDesc {
        RenderableDesc {
            kind: RenderableKind::Placeholder,
            debug_name,
        }
    }

    #[derive(Default)]
    struct Journal {
        events: Vec<String>,
    }

    struct TestScene {
        name: &'static str,
        spawn_count: usize,
        step_x: f32,
        journal: Rc<RefCell<Journal>>,
    }

    impl TestScene {
        fn boxed(
            name: &'static str,
            spawn_count: usize,
            journal: &Rc<RefCell<Journal>>,
        ) -> Box<dyn Scene> {
            Box::new(Self {
                name,
                spawn_count,
                step_x: 1.0,
                journal: Rc::clone(journal),
            })
        }
    }

    impl Scene for TestScene {
        fn load(&mut self, world: &mut SceneWorld, spawn: &SpawnParams) {
            let position = spawn.target.unwrap_or_default();
            for _ in 0..self.spawn_count {
                world.spawn(Transform { position }, placeholder("test"));
            }
            world.apply_pending();
            self.journal
                .borrow_mut()
                .events
                .push(format!("load {} {:?}", self.name, spawn.target));
        }

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            _input: &InputSnapshot,
            world: &mut SceneWorld,
        ) -> SceneCommand {
            let ids: Vec<EntityId> = world.entities().iter().map(|e| e.id).collect();
            for id in ids {
                if let Some(entity) = world.find_entity_mut(id) {
                    entity.transform.position.x += self.step_x;
                }
            }
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {
            self.journal
                .borrow_mut()
                .events
                .push(format!("unload {}", self.name));
        }
    }

    fn switch(scene: &str, target: Option<Vec2>) -> SceneSwitch {
        SceneSwitch {
            scene: SceneId::new(scene),
            spawn: SpawnParams { target },
        }
    }

    fn machine_with_two_scenes(journal: &Rc<RefCell<Journal>>) -> SceneMachine {
        SceneMachine::new(vec![
            (SceneId::new("EntranceScene"), TestScene::boxed("entrance", 2, journal)),
            (SceneId::new("Floor1Scene"), TestScene::boxed("floor1", 1, journal)),
        ])
        .expect("machine")
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 0);
        assert_eq!(second.0, 1);
        assert_eq!(third.0, 2);
    }

    #[test]
    fn scene_world_spawn_and_despawn_updates_count() {
        let mut world = SceneWorld::default();
        let id = world.spawn(Transform::default(), placeholder("spawned"));
        world.apply_pending();
        assert_eq!(world.entity_count(), 1);

        world.despawn(id);
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn scene_world_duplicate_pending_despawns_are_safe_and_idempotent() {
        let mut world = SceneWorld::default();
        let doomed = world.spawn(Transform::default(), placeholder("doomed"));
        let survivor = world.spawn(
            Transform {
                position: Vec2::new(3.0, 1.0),
            },
            placeholder("survivor"),
        );
        world.apply_pending();

        assert!(world.despawn(doomed));
        assert!(world.despawn(doomed));
        world.apply_pending();

        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(doomed).is_none());
        assert!(world.find_entity(survivor).is_some());
        assert!(!world.despawn(doomed));
    }

    #[test]
    fn despawn_of_pending_spawn_never_appears() {
        let mut world = SceneWorld::default();
        let id = world.spawn(Transform::default(), placeholder("ghost"));
        assert!(world.despawn(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn clear_keeps_allocating_fresh_ids() {
        let mut world = SceneWorld::default();
        let first = world.spawn(Transform::default(), placeholder("a"));
        world.apply_pending();
        world.clear();
        let second = world.spawn(Transform::default(), placeholder("b"));
        assert_ne!(first, second);
        assert!(world.tile_layers().is_none());
        assert!(world.ui().is_empty());
    }

    #[test]
    fn machine_rejects_empty_and_duplicate_registrations() {
        assert!(matches!(
            SceneMachine::new(Vec::new()),
            Err(SceneMachineError::Empty)
        ));
        let journal = Rc::new(RefCell::new(Journal::default()));
        let duplicate = SceneMachine::new(vec![
            (SceneId::new("A"), TestScene::boxed("a", 0, &journal)),
            (SceneId::new("A"), TestScene::boxed("b", 0, &journal)),
        ]);
        assert!(matches!(
            duplicate,
            Err(SceneMachineError::DuplicateScene(id)) if id.as_str() == "A"
        ));
    }

    #[test]
    fn switch_unloads_active_and_loads_target_with_spawn_params() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut machine = machine_with_two_scenes(&journal);
        machine.load_active(&SpawnParams::default());

        assert!(machine.switch_to(&switch("Floor1Scene", Some(Vec2::new(120.0, 80.0)))));
        assert_eq!(machine.active_scene().as_str(), "Floor1Scene");
        assert_eq!(machine.active_world().entity_count(), 1);
        assert_eq!(
            machine.active_world().entities()[0].transform.position,
            Vec2::new(120.0, 80.0)
        );
        assert_eq!(
            journal.borrow().events,
            vec![
                "load entrance None".to_string(),
                "unload entrance".to_string(),
                "load floor1 Some(Vec2 { x: 120.0, y: 80.0 })".to_string(),
            ]
        );
    }

    #[test]
    fn returning_to_a_scene_restarts_it_from_scratch() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut machine = machine_with_two_scenes(&journal);
        machine.load_active(&SpawnParams::default());
        let _ = machine.update_active(1.0 / 60.0, &InputSnapshot::empty());
        let old_ids: Vec<EntityId> = machine.active_world().entities().iter().map(|e| e.id).collect();

        assert!(machine.switch_to(&switch("Floor1Scene", None)));
        assert!(machine.switch_to(&switch("EntranceScene", None)));

        let world = machine.active_world();
        assert_eq!(world.entity_count(), 2);
        assert!(world.entities().iter().all(|e| e.transform.position.x == 0.0));
        assert!(world.entities().iter().all(|e| !old_ids.contains(&e.id)));
    }

    #[test]
    fn switching_to_active_scene_restarts_it() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut machine = machine_with_two_scenes(&journal);
        machine.load_active(&SpawnParams::default());
        machine.active_world_mut().camera_mut().position = Vec2::new(9.0, 9.0);

        assert!(machine.switch_to(&switch("EntranceScene", Some(Vec2::new(5.0, 6.0)))));
        assert_eq!(machine.active_world().entity_count(), 2);
        assert_eq!(machine.active_world().camera().position, Vec2::ZERO);
        assert_eq!(journal.borrow().events.len(), 3);
    }

    #[test]
    fn unknown_switch_target_keeps_current_scene() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut machine = machine_with_two_scenes(&journal);
        machine.load_active(&SpawnParams::default());

        assert!(!machine.switch_to(&switch("Floor9Scene", None)));
        assert_eq!(machine.active_scene().as_str(), "EntranceScene");
        assert_eq!(machine.active_world().entity_count(), 2);
        assert_eq!(journal.borrow().events.len(), 1);
    }

    #[test]
    fn shutdown_unloads_only_loaded_scenes() {
        let journal = Rc::new(RefCell::new(Journal::default()));
        let mut machine = machine_with_two_scenes(&journal);
        machine.load_active(&SpawnParams::default());
        machine.shutdown_all();
        machine.shutdown_all();
        assert_eq!(
            journal.borrow().events,
            vec!["load entrance None".to_string(), "unload entrance".to_string()]
        );
    }

    #[test]
    fn camera_follow_clamps_to_bounds() {
        let mut camera = Camera2D {
            zoom: 2.0,
            ..Camera2D::default()
        };
        camera.set_bounds(Some(Rect::new(0.0, 0.0, 1000.0, 1000.0)));
        // 800x600 at zoom 2 shows 400x300 world pixels.
        camera.snap_to(Vec2::new(10.0, 990.0), (800, 600));
        assert_eq!(camera.position, Vec2::new(200.0, 850.0));

        camera.follow(Vec2::new(600.0, 500.0), 0.5, (800, 600));
        assert_eq!(camera.position, Vec2::new(400.0, 675.0));
    }

    #[test]
    fn camera_centers_on_maps_smaller_than_view() {
        let mut camera = Camera2D::default();
        camera.set_bounds(Some(Rect::new(0.0, 0.0, 200.0, 100.0)));
        camera.snap_to(Vec2::new(0.0, 0.0), (800, 600));
        assert_eq!(camera.position, Vec2::new(100.0, 50.0));
    }

    #[test]
    fn vec2_normalization_handles_zero() {
        assert_eq!(Vec2::ZERO.normalized_or_zero(), Vec2::ZERO);
        let diagonal = Vec2::new(1.0, 1.0).normalized_or_zero();
        assert!((diagonal.length() - 1.0).abs() < 0.0001);
        assert_eq!(Vec2::new(3.0, 0.0).distance(Vec2::new(0.0, 4.0)), 5.0);
    }
}
