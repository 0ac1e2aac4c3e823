use std::path::Path;

use roxmltree::{Document, Node};

use super::model::{
    MapLayer, MapObject, MapProperty, ObjectLayer, PropertyValue, TileLayer, TiledMap, TilesetRef,
};
use super::{MapErrorCode, MapParseError, SourceLocation};

pub fn parse_tmx(raw: &str) -> Result<TiledMap, MapParseError> {
    let doc = Document::parse(raw).map_err(|error| MapParseError {
        code: MapErrorCode::MalformedXml,
        message: format!("malformed XML: {error}"),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(error_at_node(
            MapErrorCode::InvalidRoot,
            "root element must be <map>".to_string(),
            &doc,
            root,
        ));
    }

    let tile_width = required_u32(&doc, root, "tilewidth")?;
    let tile_height = required_u32(&doc, root, "tileheight")?;
    let mut tilesets = Vec::new();
    for node in root.children().filter(|node| node.has_tag_name("tileset")) {
        tilesets.push(parse_tileset(&doc, node, tile_width, tile_height)?);
    }

    let mut layers = Vec::new();
    collect_layers(&doc, root, &mut layers)?;

    Ok(TiledMap {
        width: required_u32(&doc, root, "width")?,
        height: required_u32(&doc, root, "height")?,
        tile_width,
        tile_height,
        layers,
        tilesets,
    })
}

fn collect_layers(
    doc: &Document<'_>,
    parent: Node<'_, '_>,
    out: &mut Vec<MapLayer>,
) -> Result<(), MapParseError> {
    for node in parent.children().filter(|node| node.is_element()) {
        match node.tag_name().name() {
            "layer" => out.push(MapLayer::Tiles(parse_tile_layer(doc, node)?)),
            "objectgroup" => out.push(MapLayer::Objects(parse_object_layer(doc, node)?)),
            "group" => collect_layers(doc, node, out)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_tile_layer(doc: &Document<'_>, node: Node<'_, '_>) -> Result<TileLayer, MapParseError> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let width = required_u32(doc, node, "width")?;
    let height = required_u32(doc, node, "height")?;
    let Some(data) = node.children().find(|child| child.has_tag_name("data")) else {
        return Err(error_at_node(
            MapErrorCode::MissingAttribute,
            format!("layer '{name}' has no <data>"),
            doc,
            node,
        ));
    };

    let gids = match data.attribute("encoding") {
        Some("csv") => parse_csv_gids(doc, data, &name)?,
        None => data
            .children()
            .filter(|child| child.has_tag_name("tile"))
            .map(|tile| tile.attribute("gid").and_then(|gid| gid.parse().ok()).unwrap_or(0))
            .collect(),
        Some(other) => {
            return Err(error_at_node(
                MapErrorCode::UnsupportedEncoding,
                format!("layer '{name}' uses unsupported encoding '{other}'"),
                doc,
                data,
            ))
        }
    };

    let expected = width as usize * height as usize;
    if gids.len() != expected {
        return Err(error_at_node(
            MapErrorCode::TileCountMismatch,
            format!("layer '{name}' has {} tiles, expected {expected}", gids.len()),
            doc,
            data,
        ));
    }

    let mut layer = TileLayer::new(name, width, height, gids);
    layer.visible = node.attribute("visible") != Some("0");
    Ok(layer)
}

fn parse_csv_gids(
    doc: &Document<'_>,
    data: Node<'_, '_>,
    layer_name: &str,
) -> Result<Vec<u32>, MapParseError> {
    data.text()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            cell.parse::<u32>().map_err(|_| {
                error_at_node(
                    MapErrorCode::InvalidValue,
                    format!("layer '{layer_name}' has a non-integer gid '{cell}'"),
                    doc,
                    data,
                )
            })
        })
        .collect()
}

fn parse_object_layer(
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<ObjectLayer, MapParseError> {
    let mut objects = Vec::new();
    for object in node.children().filter(|child| child.has_tag_name("object")) {
        objects.push(MapObject {
            id: required_u32(doc, object, "id")?,
            name: object.attribute("name").unwrap_or_default().to_string(),
            x: optional_f32(doc, object, "x")?,
            y: optional_f32(doc, object, "y")?,
            width: optional_f32(doc, object, "width")?,
            height: optional_f32(doc, object, "height")?,
            properties: parse_properties(object),
        });
    }
    Ok(ObjectLayer {
        name: node.attribute("name").unwrap_or_default().to_string(),
        objects,
    })
}

fn parse_properties(node: Node<'_, '_>) -> Vec<MapProperty> {
    let Some(properties) = node.children().find(|child| child.has_tag_name("properties")) else {
        return Vec::new();
    };
    properties
        .children()
        .filter(|child| child.has_tag_name("property"))
        .filter_map(|property| {
            let name = property.attribute("name")?.to_string();
            let raw = property
                .attribute("value")
                .or_else(|| property.text())
                .unwrap_or_default();
            let value = match property.attribute("type") {
                Some("int") => raw
                    .parse()
                    .map(PropertyValue::Int)
                    .unwrap_or_else(|_| PropertyValue::String(raw.to_string())),
                Some("float") => raw
                    .parse()
                    .map(PropertyValue::Float)
                    .unwrap_or_else(|_| PropertyValue::String(raw.to_string())),
                Some("bool") => PropertyValue::Bool(raw == "true"),
                _ => PropertyValue::String(raw.to_string()),
            };
            Some(MapProperty { name, value })
        })
        .collect()
}

fn parse_tileset(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    map_tile_width: u32,
    map_tile_height: u32,
) -> Result<TilesetRef, MapParseError> {
    let name = match node.attribute("name") {
        Some(name) => name.to_string(),
        None => node
            .attribute("source")
            .and_then(|source| Path::new(source).file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    Ok(TilesetRef {
        name,
        first_gid: required_u32(doc, node, "firstgid")?,
        tile_width: optional_u32(doc, node, "tilewidth")?.unwrap_or(map_tile_width),
        tile_height: optional_u32(doc, node, "tileheight")?.unwrap_or(map_tile_height),
        columns: optional_u32(doc, node, "columns")?.unwrap_or(0),
        tile_count: optional_u32(doc, node, "tilecount")?.unwrap_or(0),
    })
}

fn required_u32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &str,
) -> Result<u32, MapParseError> {
    optional_u32(doc, node, attribute)?.ok_or_else(|| {
        error_at_node(
            MapErrorCode::MissingAttribute,
            format!(
                "<{}> is missing required attribute '{attribute}'",
                node.tag_name().name()
            ),
            doc,
            node,
        )
    })
}

fn optional_u32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &str,
) -> Result<Option<u32>, MapParseError> {
    let Some(value) = node.attribute(attribute) else {
        return Ok(None);
    };
    value.trim().parse::<u32>().map(Some).map_err(|_| {
        error_at_node(
            MapErrorCode::InvalidValue,
            format!("attribute '{attribute}' value '{value}' is not an unsigned integer"),
            doc,
            node,
        )
    })
}

fn optional_f32(
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &str,
) -> Result<f32, MapParseError> {
    let Some(value) = node.attribute(attribute) else {
        return Ok(0.0);
    };
    match value.trim().parse::<f32>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(error_at_node(
            MapErrorCode::InvalidValue,
            format!("attribute '{attribute}' value '{value}' is not a finite number"),
            doc,
            node,
        )),
    }
}

fn error_at_node(
    code: MapErrorCode,
    message: String,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> MapParseError {
    let pos = doc.text_pos_at(node.range().start);
    MapParseError {
        code,
        message,
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" width="2" height="2" tilewidth="16" tileheight="16">
 <tileset firstgid="1" name="Main_Tileset" tilewidth="16" tileheight="16" tilecount="64" columns="8">
  <image source="main_tileset.png" width="128" height="128"/>
 </tileset>
 <layer id="1" name="floor" width="2" height="2">
  <data encoding="csv">
1,1,
1,1
</data>
 </layer>
 <group name="upper">
  <layer id="2" name="walls" width="2" height="2">
   <data encoding="csv">0,5,0,0</data>
  </layer>
 </group>
 <objectgroup id="3" name="npcs">
  <object id="7" name="guard" x="24" y="40" width="16" height="16"/>
 </objectgroup>
 <objectgroup id="4" name="teleports">
  <object id="9" x="0" y="0" width="32" height="8">
   <properties>
    <property name="target_scene" value="Floor2Scene"/>
    <property name="target_x" type="int" value="120"/>
    <property name="target_y" value="80"/>
   </properties>
  </object>
 </objectgroup>
</map>"#;

    #[test]
    fn parses_csv_layers_objects_and_properties() {
        let map = parse_tmx(MAP).expect("map");
        assert_eq!(map.tilesets[0].name, "Main_Tileset");
        assert_eq!(map.tile_layer("floor").map(|l| l.gid_at(1, 1)), Some(1));
        assert_eq!(map.tile_layer("walls").map(|l| l.gid_at(1, 0)), Some(5));

        let npcs = map.object_layer("npcs").expect("npcs");
        assert_eq!(npcs.objects[0].id, 7);
        assert_eq!(npcs.objects[0].center(), (32.0, 48.0));

        let trigger = &map.object_layer("teleports").expect("teleports").objects[0];
        assert_eq!(trigger.property("target_x"), Some(&PropertyValue::Int(120)));
        assert_eq!(
            trigger.property("target_y"),
            Some(&PropertyValue::String("80".into()))
        );
    }

    #[test]
    fn wrong_root_reports_location() {
        let err = parse_tmx("<tileset/>").expect_err("root");
        assert_eq!(err.code, MapErrorCode::InvalidRoot);
        assert!(err.location.is_some());
    }

    #[test]
    fn missing_dimensions_are_reported() {
        let err = parse_tmx(r#"<map tilewidth="16" tileheight="16"/>"#).expect_err("width");
        assert_eq!(err.code, MapErrorCode::MissingAttribute);
    }
}
