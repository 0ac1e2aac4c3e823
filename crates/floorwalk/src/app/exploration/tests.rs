use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

use engine::{SceneId, SceneSwitch, Vec2};
use serde_json::{json, Value};

use super::*;
use crate::app::dialogue_window::DialogueLayout;
use crate::dialogue::{PresentationSurface, START_NODE_KEY};
use crate::npc::{FetchResolver, NpcRow, ProviderError};

const DT: f32 = 1.0 / 60.0;
const MAP_TILES: u32 = 20;
const TILE_PX: u32 = 16;
const SPAWN: Vec2 = Vec2::new(100.0, 130.0);

#[derive(Default)]
struct FakeProvider {
    rows: Vec<NpcRow>,
    fail: bool,
    deferred: bool,
    waiting: RefCell<Vec<FetchResolver>>,
    fetches: Cell<usize>,
}

impl FakeProvider {
    fn with_rows(rows: Vec<NpcRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn result(&self) -> Result<Vec<NpcRow>, ProviderError> {
        if self.fail {
            Err(ProviderError::Offline)
        } else {
            Ok(self.rows.clone())
        }
    }

    /// Resolves every fetch still waiting; false for handles nobody holds.
    fn resolve_waiting(&self) -> Vec<bool> {
        let waiting: Vec<FetchResolver> = self.waiting.borrow_mut().drain(..).collect();
        waiting
            .into_iter()
            .map(|resolver| resolver.resolve(self.result()))
            .collect()
    }
}

impl DialogueDataProvider for FakeProvider {
    fn fetch(&self, _scene_id: &str) -> PendingFetch {
        self.fetches.set(self.fetches.get() + 1);
        if !self.deferred {
            return PendingFetch::ready(self.result());
        }
        let (resolver, pending) = PendingFetch::channel();
        self.waiting.borrow_mut().push(resolver);
        pending
    }

    fn kind(&self) -> &'static str {
        "fake"
    }
}

fn row(value: Value) -> NpcRow {
    serde_json::from_value(value).expect("row")
}

fn building_rows() -> Vec<NpcRow> {
    vec![
        row(json!({
            "map_id": 1,
            "name": "Guard",
            "sprite_frame": "kuyaguard.png",
            "dialogue": {
                "start": {"text": "Halt.", "choices": [
                    {"text": "Proceed", "next": "pass"},
                    {"text": "Leave", "next": "end"}
                ]},
                "pass": {"text": "Very well."},
                "end": {"text": "Farewell."}
            }
        })),
        row(json!({
            "map_id": "2",
            "name": "Clerk",
            "sprite_frame": 4,
            "dialogue": {"start": {"text": "Welcome.", "next": "end"}, "end": {}}
        })),
    ]
}

fn write_map(maps_dir: &Path) {
    let cells = (MAP_TILES * MAP_TILES) as usize;
    let floor = vec![1; cells];
    let mut walls = vec![0; cells];
    for cell in walls.iter_mut().take(MAP_TILES as usize) {
        *cell = 2;
    }
    let map = json!({
        "width": MAP_TILES,
        "height": MAP_TILES,
        "tilewidth": TILE_PX,
        "tileheight": TILE_PX,
        "tilesets": [{
            "firstgid": 1,
            "name": "main_tileset",
            "tilewidth": TILE_PX,
            "tileheight": TILE_PX,
            "columns": 8,
            "tilecount": 64
        }],
        "layers": [
            {"type": "tilelayer", "name": "floor", "width": MAP_TILES, "height": MAP_TILES, "data": floor},
            {"type": "tilelayer", "name": "walls", "width": MAP_TILES, "height": MAP_TILES, "data": walls},
            {"type": "objectgroup", "name": "npcs", "objects": [
                {"id": 1, "x": 96, "y": 96, "width": 16, "height": 16},
                {"id": 2, "x": 200, "y": 200, "width": 16, "height": 16},
                {"id": 3, "x": 40, "y": 260, "width": 16, "height": 16}
            ]},
            {"type": "objectgroup", "name": "teleports", "objects": [
                {"id": 10, "x": 280, "y": 150, "width": 32, "height": 32, "properties": [
                    {"name": "target_scene", "type": "string", "value": "Floor1Scene"},
                    {"name": "target_x", "type": "string", "value": "120"},
                    {"name": "target_y", "type": "string", "value": "80"}
                ]}
            ]}
        ]
    });
    fs::create_dir_all(maps_dir).expect("maps dir");
    fs::write(maps_dir.join("entrance.json"), map.to_string()).expect("write map");
}

fn config(tileset_keys: &[&str]) -> SceneConfig {
    SceneConfig {
        scene_id: "EntranceScene".to_string(),
        map_key: "map_entrance".to_string(),
        tileset_keys: tileset_keys.iter().map(ToString::to_string).collect(),
        floor_label: "Ground Floor - Entrance".to_string(),
        default_spawn: SPAWN,
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    scene: ExplorationScene,
    world: SceneWorld,
}

fn fixture(provider: Option<Rc<dyn DialogueDataProvider>>) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let maps_dir = dir.path().join("maps");
    write_map(&maps_dir);
    Fixture {
        scene: ExplorationScene::new(config(&["main_tileset", "furnitures"]), maps_dir, provider),
        world: SceneWorld::default(),
        _dir: dir,
    }
}

fn loaded(provider: Option<Rc<dyn DialogueDataProvider>>) -> Fixture {
    let mut fixture = fixture(provider);
    fixture
        .scene
        .load(&mut fixture.world, &SpawnParams::default());
    fixture
}

fn held(actions: &[InputAction]) -> InputSnapshot {
    let mut snapshot = InputSnapshot::empty().with_window_size((800, 600));
    for action in actions {
        snapshot = snapshot.with_action_down(*action, true);
    }
    snapshot
}

fn interact() -> InputSnapshot {
    held(&[]).with_interact_pressed(true)
}

fn tick(fixture: &mut Fixture, input: &InputSnapshot) -> SceneCommand {
    let command = fixture.scene.update(DT, input, &mut fixture.world);
    fixture.world.apply_pending();
    command
}

fn player_position(fixture: &Fixture) -> Vec2 {
    fixture.scene.player().expect("player").position()
}

fn ui_texts(fixture: &Fixture) -> Vec<String> {
    fixture.world.ui().texts().map(ToString::to_string).collect()
}

#[test]
fn load_builds_map_and_places_player_at_default_spawn() {
    let fixture = loaded(None);

    assert!(fixture.scene.map_ready);
    let layers = fixture.world.tile_layers().expect("tile layers");
    let names: Vec<&str> = layers.layers().iter().map(|layer| layer.name.as_str()).collect();
    assert_eq!(names, vec!["floor", "walls"]);
    assert_eq!(fixture.world.collision().grid().solid_count(), MAP_TILES as usize);
    assert_eq!(player_position(&fixture), SPAWN);
    assert_eq!(fixture.world.camera().zoom, CAMERA_ZOOM);
    assert_eq!(fixture.world.entity_count(), 1);
    let player_id = fixture.scene.player().expect("player").entity_id();
    assert!(fixture.world.find_entity(player_id).is_some());
    assert!(ui_texts(&fixture).contains(&"Ground Floor - Entrance".to_string()));
}

#[test]
fn spawn_params_from_previous_scene_override_default_spawn() {
    let mut fixture = fixture(None);

    fixture.scene.load(
        &mut fixture.world,
        &SpawnParams {
            target: Some(Vec2::new(64.0, 64.0)),
        },
    );

    assert_eq!(player_position(&fixture), Vec2::new(64.0, 64.0));
}

#[test]
fn npcs_appear_only_after_the_fetch_resolves() {
    let provider = Rc::new(FakeProvider {
        deferred: true,
        ..FakeProvider::with_rows(building_rows())
    });
    let mut fixture = loaded(Some(provider.clone()));

    assert_eq!(provider.fetches.get(), 1);
    tick(&mut fixture, &interact());
    assert!(fixture.scene.registry.is_empty());
    assert!(!fixture.scene.session.is_interacting());

    assert_eq!(provider.resolve_waiting(), vec![true]);
    tick(&mut fixture, &held(&[]));

    let names: Vec<&str> = fixture
        .scene
        .registry
        .entities()
        .iter()
        .map(|npc| npc.name())
        .collect();
    assert_eq!(names, vec!["Guard", "Clerk"]);
    assert_eq!(fixture.world.entity_count(), 3);
    assert_eq!(fixture.world.collision().bodies().len(), 2);
}

#[test]
fn interacting_opens_the_window_and_freezes_the_player() {
    let provider: Rc<dyn DialogueDataProvider> =
        Rc::new(FakeProvider::with_rows(building_rows()));
    let mut fixture = loaded(Some(provider));

    tick(&mut fixture, &interact());

    assert!(fixture.scene.session.is_interacting());
    assert_eq!(fixture.scene.session.current_node_key(), START_NODE_KEY);
    let texts = ui_texts(&fixture);
    assert!(texts.contains(&"Guard".to_string()));
    assert!(texts.contains(&"Halt.".to_string()));
    assert!(texts.contains(&"1. Proceed".to_string()));

    for _ in 0..30 {
        tick(&mut fixture, &held(&[InputAction::MoveRight, InputAction::MoveDown]));
    }
    assert_eq!(player_position(&fixture), SPAWN);
    assert!(!fixture.scene.player().expect("player").is_walking());
}

#[test]
fn choice_keys_and_action_key_walk_the_guard_tree() {
    let provider: Rc<dyn DialogueDataProvider> =
        Rc::new(FakeProvider::with_rows(building_rows()));
    let mut fixture = loaded(Some(provider));
    tick(&mut fixture, &interact());

    tick(&mut fixture, &interact());
    assert_eq!(fixture.scene.session.current_node_key(), START_NODE_KEY);

    tick(&mut fixture, &held(&[]).with_choice_pressed(Some(0)));
    assert_eq!(fixture.scene.session.current_node_key(), "pass");
    assert!(ui_texts(&fixture).contains(&"Very well.".to_string()));

    tick(&mut fixture, &interact());
    assert!(!fixture.scene.session.is_interacting());
    assert!(!fixture.scene.window.is_visible());
    assert_eq!(ui_texts(&fixture), vec!["Ground Floor - Entrance".to_string()]);
}

#[test]
fn clicking_a_choice_row_selects_it() {
    let provider: Rc<dyn DialogueDataProvider> =
        Rc::new(FakeProvider::with_rows(building_rows()));
    let mut fixture = loaded(Some(provider));
    tick(&mut fixture, &interact());

    let view = fixture.scene.window.view().expect("view").clone();
    let layout = DialogueLayout::compute(&view, (800, 600));
    let row = layout.choice_rows[1].rect;
    let click = held(&[])
        .with_left_click_pressed(true)
        .with_cursor_position_px(Some(Vec2::new(
            (row.x + 4) as f32,
            (row.y + 4) as f32,
        )));

    tick(&mut fixture, &click);

    assert_eq!(fixture.scene.session.current_node_key(), "end");
    assert!(ui_texts(&fixture).contains(&"Farewell.".to_string()));
}

#[test]
fn cancel_closes_dialogue_and_movement_resumes() {
    let provider: Rc<dyn DialogueDataProvider> =
        Rc::new(FakeProvider::with_rows(building_rows()));
    let mut fixture = loaded(Some(provider));
    tick(&mut fixture, &interact());
    assert!(fixture.scene.session.is_interacting());

    tick(&mut fixture, &held(&[InputAction::Cancel]));
    assert!(!fixture.scene.session.is_interacting());

    for _ in 0..30 {
        tick(&mut fixture, &held(&[InputAction::MoveRight]));
    }
    let position = player_position(&fixture);
    assert!((position.x - (SPAWN.x + 50.0)).abs() < 0.5, "{position:?}");
    assert_eq!(position.y, SPAWN.y);
}

#[test]
fn nobody_in_range_leaves_the_session_idle() {
    let provider: Rc<dyn DialogueDataProvider> =
        Rc::new(FakeProvider::with_rows(building_rows()));
    let mut fixture = fixture(Some(provider));
    fixture.scene.load(
        &mut fixture.world,
        &SpawnParams {
            target: Some(Vec2::new(250.0, 60.0)),
        },
    );

    tick(&mut fixture, &interact());

    assert!(!fixture.scene.session.is_interacting());
    assert_eq!(fixture.scene.registry.len(), 2);
}

#[test]
fn provider_failure_keeps_the_scene_explorable() {
    let provider: Rc<dyn DialogueDataProvider> = Rc::new(FakeProvider {
        fail: true,
        ..FakeProvider::with_rows(building_rows())
    });
    let mut fixture = loaded(Some(provider));

    tick(&mut fixture, &interact());
    tick(&mut fixture, &held(&[InputAction::MoveLeft]));

    assert!(fixture.scene.registry.is_empty());
    assert!(!fixture.scene.session.is_interacting());
    assert!(player_position(&fixture).x < SPAWN.x);
}

#[test]
fn teleport_overlap_requests_switch_with_target_coordinates() {
    let mut fixture = fixture(None);
    fixture.scene.load(
        &mut fixture.world,
        &SpawnParams {
            target: Some(Vec2::new(296.0, 160.0)),
        },
    );

    let command = tick(&mut fixture, &held(&[]));

    assert_eq!(
        command,
        SceneCommand::SwitchTo(SceneSwitch {
            scene: SceneId::new("Floor1Scene"),
            spawn: SpawnParams {
                target: Some(Vec2::new(120.0, 80.0)),
            },
        })
    );
}

#[test]
fn late_fetch_after_unload_is_ignored() {
    let provider = Rc::new(FakeProvider {
        deferred: true,
        ..FakeProvider::with_rows(building_rows())
    });
    let mut fixture = loaded(Some(provider.clone()));

    fixture.scene.unload(&mut fixture.world);
    fixture.world.clear();
    assert_eq!(provider.resolve_waiting(), vec![false]);

    fixture
        .scene
        .load(&mut fixture.world, &SpawnParams::default());
    tick(&mut fixture, &held(&[]));
    assert!(fixture.scene.registry.is_empty());

    assert_eq!(provider.resolve_waiting(), vec![true]);
    tick(&mut fixture, &held(&[]));
    assert_eq!(fixture.scene.registry.len(), 2);
}

#[test]
fn reloading_never_doubles_npcs() {
    let provider: Rc<dyn DialogueDataProvider> =
        Rc::new(FakeProvider::with_rows(building_rows()));
    let mut fixture = loaded(Some(provider));
    tick(&mut fixture, &held(&[]));
    assert_eq!(fixture.scene.registry.len(), 2);

    fixture.scene.unload(&mut fixture.world);
    fixture.world.clear();
    fixture
        .scene
        .load(&mut fixture.world, &SpawnParams::default());
    tick(&mut fixture, &held(&[]));

    assert_eq!(fixture.scene.registry.len(), 2);
    assert_eq!(fixture.world.entity_count(), 3);
    assert_eq!(fixture.world.collision().bodies().len(), 2);
}

#[test]
fn missing_map_leaves_an_inert_scene() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut scene = ExplorationScene::new(
        config(&["main_tileset"]),
        dir.path().join("maps"),
        None,
    );
    let mut world = SceneWorld::default();

    scene.load(&mut world, &SpawnParams::default());
    let command = scene.update(DT, &held(&[InputAction::MoveLeft]), &mut world);

    assert_eq!(command, SceneCommand::None);
    assert!(scene.player().is_none());
    assert_eq!(world.entity_count(), 0);
    assert!(scene.debug_lines(&world)[0].contains("UNAVAILABLE"));
    assert!(world
        .ui()
        .texts()
        .any(|text| text == "Ground Floor - Entrance"));
}

#[test]
fn zero_bound_tilesets_render_no_map() {
    let dir = tempfile::tempdir().expect("tempdir");
    let maps_dir = dir.path().join("maps");
    write_map(&maps_dir);
    let provider = Rc::new(FakeProvider::with_rows(building_rows()));
    let mut scene = ExplorationScene::new(
        config(&["furnitures", "2nd_main_tileset"]),
        maps_dir,
        Some(provider.clone()),
    );
    let mut world = SceneWorld::default();

    scene.load(&mut world, &SpawnParams::default());

    assert!(!scene.map_ready);
    assert!(world.tile_layers().is_none());
    assert_eq!(provider.fetches.get(), 0);
}
