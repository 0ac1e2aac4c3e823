mod json;
mod model;
mod tmx;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use json::parse_tiled_json;
pub use model::{
    BoundTileset, MapLayer, MapObject, MapProperty, ObjectLayer, PropertyValue, TileLayer,
    TileLayerStack, TiledMap, TilesetBinding, TilesetRef, GID_MASK,
};
pub use tmx::parse_tmx;

const MAP_EXTENSIONS: [&str; 3] = ["json", "tmj", "tmx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorCode {
    MalformedJson,
    MalformedXml,
    InvalidRoot,
    MissingAttribute,
    InvalidValue,
    UnsupportedEncoding,
    TileCountMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapParseError {
    pub code: MapErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for MapParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)?;
        if let Some(location) = self.location {
            write!(f, " (line {}, column {})", location.line, location.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for MapParseError {}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("no map file for key '{map_key}' under {maps_dir} (tried .json, .tmj, .tmx)")]
    NotFound { map_key: String, maps_dir: PathBuf },
    #[error("failed to read map file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse map file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: MapParseError,
    },
}

/// `map_floor_2` lives at `<maps_dir>/floor_2.json` (or `.tmj` / `.tmx`).
pub fn resolve_map_path(maps_dir: &Path, map_key: &str) -> Option<PathBuf> {
    let stem = map_key.strip_prefix("map_").unwrap_or(map_key);
    MAP_EXTENSIONS
        .iter()
        .map(|extension| maps_dir.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

pub fn load_map(maps_dir: &Path, map_key: &str) -> Result<(PathBuf, TiledMap), MapLoadError> {
    let path = resolve_map_path(maps_dir, map_key).ok_or_else(|| MapLoadError::NotFound {
        map_key: map_key.to_string(),
        maps_dir: maps_dir.to_path_buf(),
    })?;
    let map = load_map_file(&path)?;
    Ok((path, map))
}

pub fn load_map_file(path: &Path) -> Result<TiledMap, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_tmx = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("tmx"));
    let parsed = if is_tmx {
        parse_tmx(&raw)
    } else {
        parse_tiled_json(&raw)
    };
    parsed.map_err(|source| MapLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(code: MapErrorCode, message: String) -> MapParseError {
    MapParseError {
        code,
        message,
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY_JSON: &str = r#"{
        "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
        "layers": [{"type": "tilelayer", "name": "floor", "width": 1, "height": 1, "data": [1]}],
        "tilesets": [{"firstgid": 1, "name": "main_tileset", "tilewidth": 16, "tileheight": 16, "tilecount": 4, "columns": 2}]
    }"#;

    #[test]
    fn map_key_prefix_is_stripped_and_json_preferred() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("floor_2.tmx"), "<map/>").expect("tmx");
        fs::write(dir.path().join("floor_2.json"), TINY_JSON).expect("json");

        let path = resolve_map_path(dir.path(), "map_floor_2").expect("path");
        assert_eq!(path, dir.path().join("floor_2.json"));
        assert!(resolve_map_path(dir.path(), "map_floor_9").is_none());
    }

    #[test]
    fn load_map_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = load_map(dir.path(), "map_entrance").expect_err("missing");
        assert!(matches!(missing, MapLoadError::NotFound { .. }));

        fs::write(dir.path().join("entrance.json"), "{ not json").expect("write");
        let malformed = load_map(dir.path(), "map_entrance").expect_err("malformed");
        match malformed {
            MapLoadError::Parse { source, .. } => {
                assert_eq!(source.code, MapErrorCode::MalformedJson)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_map_reads_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("entrance.json"), TINY_JSON).expect("write");
        let (_, map) = load_map(dir.path(), "map_entrance").expect("map");
        assert_eq!(map.tile_layer("floor").map(|l| l.gid_at(0, 0)), Some(1));
    }
}
