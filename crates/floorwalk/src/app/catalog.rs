use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use engine::{validate_asset_key, AssetKeyError, Vec2};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub(crate) const CATALOG_FILE: &str = "scenes.json";
pub(crate) const DEFAULT_SPAWN: Vec2 = Vec2::new(540.0, 690.0);
const BUILDING_TILESETS: [&str; 3] = ["main_tileset", "2nd_main_tileset", "furnitures"];

#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    #[error("failed to read scene catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene catalog {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("scene catalog {path} lists no scenes")]
    Empty { path: PathBuf },
    #[error("scene id '{scene_id}' appears more than once in the catalog")]
    DuplicateScene { scene_id: String },
    #[error("scene '{scene_id}' has an invalid asset key '{key}': {source}")]
    InvalidAssetKey {
        scene_id: String,
        key: String,
        #[source]
        source: AssetKeyError,
    },
}

/// `[x, y]` or `{ "x": .., "y": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
enum SpawnPoint {
    Pair([f32; 2]),
    Named { x: f32, y: f32 },
}

impl SpawnPoint {
    fn to_vec2(self) -> Vec2 {
        match self {
            SpawnPoint::Pair([x, y]) => Vec2::new(x, y),
            SpawnPoint::Named { x, y } => Vec2::new(x, y),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneConfigFile {
    scene_id: String,
    map_key: String,
    tileset_keys: Vec<String>,
    #[serde(default)]
    floor_label: String,
    #[serde(default)]
    default_spawn: Option<SpawnPoint>,
}

/// One exploration scene: which map to load and which tilesets to bind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SceneConfig {
    pub(crate) scene_id: String,
    pub(crate) map_key: String,
    pub(crate) tileset_keys: Vec<String>,
    pub(crate) floor_label: String,
    pub(crate) default_spawn: Vec2,
}

impl SceneConfig {
    fn building_floor(scene_id: &str, map_key: &str, floor_label: &str) -> Self {
        Self {
            scene_id: scene_id.to_string(),
            map_key: map_key.to_string(),
            tileset_keys: BUILDING_TILESETS.iter().map(ToString::to_string).collect(),
            floor_label: floor_label.to_string(),
            default_spawn: DEFAULT_SPAWN,
        }
    }
}

/// Entrance plus four floors, entrance first.
pub(crate) fn builtin_catalog() -> Vec<SceneConfig> {
    vec![
        SceneConfig::building_floor("EntranceScene", "map_entrance", "Ground Floor - Entrance"),
        SceneConfig::building_floor("Floor1Scene", "map_floor_1", "1st Floor"),
        SceneConfig::building_floor("Floor2Scene", "map_floor_2", "2nd Floor"),
        SceneConfig::building_floor("Floor3Scene", "map_floor_3", "3rd Floor"),
        SceneConfig::building_floor("Floor4Scene", "map_floor_4", "4th Floor"),
    ]
}

/// Reads `assets/scenes.json`, or the built-in catalog when the file is absent.
pub(crate) fn load_catalog(assets_dir: &Path) -> Result<Vec<SceneConfig>, CatalogError> {
    let path = assets_dir.join(CATALOG_FILE);
    if !path.is_file() {
        let catalog = builtin_catalog();
        info!(scene_count = catalog.len(), "scene_catalog_builtin");
        return Ok(catalog);
    }

    let raw = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
        path: path.clone(),
        source,
    })?;
    let catalog = parse_catalog(&raw, &path)?;
    info!(
        path = %path.display(),
        scene_count = catalog.len(),
        "scene_catalog_loaded"
    );
    Ok(catalog)
}

fn parse_catalog(raw: &str, path: &Path) -> Result<Vec<SceneConfig>, CatalogError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let entries: Vec<SceneConfigFile> = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|error| {
            let error_path = error.path().to_string();
            let source = error.into_inner();
            let message = if error_path.is_empty() || error_path == "." {
                source.to_string()
            } else {
                format!("at {error_path}: {source}")
            };
            CatalogError::Parse {
                path: path.to_path_buf(),
                message,
            }
        })?;

    if entries.is_empty() {
        return Err(CatalogError::Empty {
            path: path.to_path_buf(),
        });
    }

    let mut seen = HashSet::new();
    let mut catalog = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.scene_id.clone()) {
            return Err(CatalogError::DuplicateScene {
                scene_id: entry.scene_id,
            });
        }
        for key in std::iter::once(&entry.map_key).chain(entry.tileset_keys.iter()) {
            validate_asset_key(key).map_err(|source| CatalogError::InvalidAssetKey {
                scene_id: entry.scene_id.clone(),
                key: key.clone(),
                source,
            })?;
        }
        catalog.push(SceneConfig {
            scene_id: entry.scene_id,
            map_key: entry.map_key,
            tileset_keys: entry.tileset_keys,
            floor_label: entry.floor_label,
            default_spawn: entry
                .default_spawn
                .map_or(DEFAULT_SPAWN, SpawnPoint::to_vec2),
        });
    }
    Ok(catalog)
}
