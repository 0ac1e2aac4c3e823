use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::model::{
    MapLayer, MapObject, MapProperty, ObjectLayer, PropertyValue, TileLayer, TiledMap, TilesetRef,
};
use super::{parse_error, MapErrorCode, MapParseError, SourceLocation};

#[derive(Debug, Deserialize)]
struct JsonMap {
    width: u32,
    height: u32,
    #[serde(rename = "tilewidth")]
    tile_width: u32,
    #[serde(rename = "tileheight")]
    tile_height: u32,
    #[serde(default)]
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonTileset>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonLayer {
    TileLayer {
        name: String,
        #[serde(default)]
        width: u32,
        #[serde(default)]
        height: u32,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        encoding: Option<String>,
        #[serde(default = "default_visible")]
        visible: bool,
    },
    ObjectGroup {
        name: String,
        #[serde(default)]
        objects: Vec<JsonObject>,
    },
    Group {
        #[serde(default)]
        layers: Vec<JsonLayer>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct JsonObject {
    id: u32,
    #[serde(default)]
    name: String,
    x: f32,
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Debug, Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct JsonTileset {
    #[serde(rename = "firstgid")]
    first_gid: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, rename = "tilewidth")]
    tile_width: u32,
    #[serde(default, rename = "tileheight")]
    tile_height: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default, rename = "tilecount")]
    tile_count: u32,
}

fn default_visible() -> bool {
    true
}

pub fn parse_tiled_json(raw: &str) -> Result<TiledMap, MapParseError> {
    let parsed: JsonMap = serde_json::from_str(raw).map_err(|error| MapParseError {
        code: MapErrorCode::MalformedJson,
        message: error.to_string(),
        location: Some(SourceLocation {
            line: error.line(),
            column: error.column(),
        }),
    })?;

    let mut layers = Vec::new();
    flatten_layers(parsed.layers, &mut layers)?;

    let tilesets = parsed
        .tilesets
        .into_iter()
        .map(|tileset| convert_tileset(tileset, parsed.tile_width, parsed.tile_height))
        .collect();

    Ok(TiledMap {
        width: parsed.width,
        height: parsed.height,
        tile_width: parsed.tile_width,
        tile_height: parsed.tile_height,
        layers,
        tilesets,
    })
}

fn flatten_layers(layers: Vec<JsonLayer>, out: &mut Vec<MapLayer>) -> Result<(), MapParseError> {
    for layer in layers {
        match layer {
            JsonLayer::TileLayer {
                name,
                width,
                height,
                data,
                encoding,
                visible,
            } => {
                if let Some(encoding) = encoding.filter(|encoding| encoding != "csv") {
                    return Err(parse_error(
                        MapErrorCode::UnsupportedEncoding,
                        format!("layer '{name}' uses unsupported encoding '{encoding}'"),
                    ));
                }
                let gids = gids_from_value(&name, data)?;
                let expected = width as usize * height as usize;
                if gids.len() != expected {
                    return Err(parse_error(
                        MapErrorCode::TileCountMismatch,
                        format!(
                            "layer '{name}' has {} tiles, expected {expected}",
                            gids.len()
                        ),
                    ));
                }
                let mut tiles = TileLayer::new(name, width, height, gids);
                tiles.visible = visible;
                out.push(MapLayer::Tiles(tiles));
            }
            JsonLayer::ObjectGroup { name, objects } => {
                out.push(MapLayer::Objects(ObjectLayer {
                    name,
                    objects: objects.into_iter().map(convert_object).collect(),
                }));
            }
            JsonLayer::Group { layers } => flatten_layers(layers, out)?,
            JsonLayer::Other => {}
        }
    }
    Ok(())
}

fn gids_from_value(layer_name: &str, data: Option<Value>) -> Result<Vec<u32>, MapParseError> {
    let Some(Value::Array(values)) = data else {
        return Err(parse_error(
            MapErrorCode::InvalidValue,
            format!("layer '{layer_name}' must carry an array of tile gids"),
        ));
    };
    values
        .iter()
        .map(|value| {
            value.as_u64().map(|gid| gid as u32).ok_or_else(|| {
                parse_error(
                    MapErrorCode::InvalidValue,
                    format!("layer '{layer_name}' has a non-integer gid: {value}"),
                )
            })
        })
        .collect()
}

fn convert_object(object: JsonObject) -> MapObject {
    MapObject {
        id: object.id,
        name: object.name,
        x: object.x,
        y: object.y,
        width: object.width,
        height: object.height,
        properties: object
            .properties
            .into_iter()
            .map(|property| MapProperty {
                value: property_value(property.kind.as_deref(), property.value),
                name: property.name,
            })
            .collect(),
    }
}

pub(super) fn property_value(kind: Option<&str>, value: Value) -> PropertyValue {
    match (kind, value) {
        (_, Value::Bool(flag)) => PropertyValue::Bool(flag),
        (Some("int"), Value::Number(number)) if number.is_i64() => {
            PropertyValue::Int(number.as_i64().unwrap_or_default())
        }
        (_, Value::Number(number)) => match number.as_i64() {
            Some(int) if kind != Some("float") => PropertyValue::Int(int),
            _ => PropertyValue::Float(number.as_f64().unwrap_or_default()),
        },
        (_, Value::String(text)) => PropertyValue::String(text),
        (_, other) => PropertyValue::String(other.to_string()),
    }
}

fn convert_tileset(tileset: JsonTileset, map_tile_width: u32, map_tile_height: u32) -> TilesetRef {
    // External tilesets only carry `source`; the file stem stands in for the name.
    let name = tileset.name.unwrap_or_else(|| {
        tileset
            .source
            .as_deref()
            .and_then(|source| Path::new(source).file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string()
    });
    TilesetRef {
        name,
        first_gid: tileset.first_gid,
        tile_width: if tileset.tile_width == 0 {
            map_tile_width
        } else {
            tileset.tile_width
        },
        tile_height: if tileset.tile_height == 0 {
            map_tile_height
        } else {
            tileset.tile_height
        },
        columns: tileset.columns,
        tile_count: tileset.tile_count,
    }
}
