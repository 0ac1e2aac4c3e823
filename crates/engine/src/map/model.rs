use std::collections::HashMap;

/// Tiled stores flip and rotation flags in the top bits of every gid.
pub const GID_MASK: u32 = 0x0FFF_FFFF;

#[derive(Debug, Clone, PartialEq)]
pub struct TiledMap {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<MapLayer>,
    pub tilesets: Vec<TilesetRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapLayer {
    Tiles(TileLayer),
    Objects(ObjectLayer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
    gids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLayer {
    pub name: String,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub properties: Vec<MapProperty>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapProperty {
    pub name: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRef {
    pub name: String,
    pub first_gid: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Zero when the map file does not say; the renderer infers it from the image.
    pub columns: u32,
    pub tile_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundTileset {
    pub image_key: String,
    pub first_gid: u32,
    pub tile_count: u32,
    pub columns: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilesetBinding {
    pub bound: Vec<BoundTileset>,
    pub missing: Vec<String>,
}

/// Tile layers selected for drawing, bottom to top, plus the tilesets that
/// resolve their gids.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayerStack {
    pub tile_width: u32,
    pub tile_height: u32,
    pub width: u32,
    pub height: u32,
    layers: Vec<TileLayer>,
    tilesets: Vec<BoundTileset>,
}

impl TileLayer {
    pub fn new(name: impl Into<String>, width: u32, height: u32, gids: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            visible: true,
            gids: gids.into_iter().map(|gid| gid & GID_MASK).collect(),
        }
    }

    pub fn gid_at(&self, x: u32, y: u32) -> u32 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.gids
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let width = self.width.max(1);
        self.gids
            .iter()
            .enumerate()
            .filter(|(_, gid)| **gid != 0)
            .map(move |(index, gid)| (index as u32 % width, index as u32 / width, *gid))
    }
}

impl MapObject {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .map(|property| &property.value)
    }

    pub fn properties_map(&self) -> HashMap<String, PropertyValue> {
        self.properties
            .iter()
            .map(|property| (property.name.clone(), property.value.clone()))
            .collect()
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

impl PropertyValue {
    /// Numbers stored as strings are accepted, matching how map authors tend
    /// to type coordinates into the string property field.
    pub fn as_f32(&self) -> Option<f32> {
        let value = match self {
            PropertyValue::Int(value) => *value as f32,
            PropertyValue::Float(value) => *value as f32,
            PropertyValue::String(value) => value.trim().parse::<f32>().ok()?,
            PropertyValue::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_text(&self) -> String {
        match self {
            PropertyValue::String(value) => value.clone(),
            PropertyValue::Int(value) => value.to_string(),
            PropertyValue::Float(value) => value.to_string(),
            PropertyValue::Bool(value) => value.to_string(),
        }
    }
}

impl TiledMap {
    pub fn pixel_width(&self) -> u32 {
        self.width.saturating_mul(self.tile_width)
    }

    pub fn pixel_height(&self) -> u32 {
        self.height.saturating_mul(self.tile_height)
    }

    pub fn tile_layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.iter().find_map(|layer| match layer {
            MapLayer::Tiles(tiles) if tiles.name == name => Some(tiles),
            _ => None,
        })
    }

    pub fn object_layer(&self, name: &str) -> Option<&ObjectLayer> {
        self.layers.iter().find_map(|layer| match layer {
            MapLayer::Objects(objects) if objects.name == name => Some(objects),
            _ => None,
        })
    }

    /// Matches each requested key against the map's tilesets ignoring case.
    pub fn bind_tilesets<S: AsRef<str>>(&self, keys: &[S]) -> TilesetBinding {
        let mut binding = TilesetBinding::default();
        for key in keys {
            let key = key.as_ref();
            let found = self
                .tilesets
                .iter()
                .find(|tileset| tileset.name.eq_ignore_ascii_case(key));
            match found {
                Some(tileset) => binding.bound.push(BoundTileset {
                    image_key: key.to_string(),
                    first_gid: tileset.first_gid,
                    tile_count: tileset.tile_count,
                    columns: tileset.columns,
                    tile_width: tileset.tile_width.max(1),
                    tile_height: tileset.tile_height.max(1),
                }),
                None => binding.missing.push(key.to_string()),
            }
        }
        binding
    }

    /// Layers that do not exist in the map are left out of the stack.
    pub fn layer_stack(&self, layer_names: &[&str], tilesets: Vec<BoundTileset>) -> TileLayerStack {
        let layers = layer_names
            .iter()
            .filter_map(|name| self.tile_layer(name).cloned())
            .collect();
        TileLayerStack {
            tile_width: self.tile_width.max(1),
            tile_height: self.tile_height.max(1),
            width: self.width,
            height: self.height,
            layers,
            tilesets,
        }
    }
}

impl TileLayerStack {
    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn tilesets(&self) -> &[BoundTileset] {
        &self.tilesets
    }

    /// Resolves a gid to the owning tileset and the tile index inside it.
    pub fn lookup(&self, gid: u32) -> Option<(&BoundTileset, u32)> {
        let gid = gid & GID_MASK;
        if gid == 0 {
            return None;
        }
        self.tilesets
            .iter()
            .filter(|tileset| tileset.first_gid <= gid)
            .max_by_key(|tileset| tileset.first_gid)
            .and_then(|tileset| {
                let local = gid - tileset.first_gid;
                if tileset.tile_count != 0 && local >= tileset.tile_count {
                    return None;
                }
                Some((tileset, local))
            })
    }
}
