use engine::RenderableKind;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::dialogue::DialogueTree;

/// `sprite_frame` value that selects the standalone guard image instead of a
/// spritesheet frame.
pub(crate) const STATIC_IMAGE_SENTINEL: &str = "kuyaguard.png";
pub(crate) const STATIC_IMAGE_KEY: &str = "kuyaguard_img";
pub(crate) const STATIC_IMAGE_SCALE: f32 = 0.2;
pub(crate) const ACTOR_SHEET_KEY: &str = "player";
pub(crate) const ACTOR_FRAME_SIZE_PX: u32 = 16;
pub(crate) const ACTOR_SCALE: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FrameSelector {
    Missing,
    Index(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PortraitDescriptor {
    pub(crate) asset_key: String,
    pub(crate) frame_selector: FrameSelector,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedPortrait {
    pub(crate) renderable: RenderableKind,
    pub(crate) scale: f32,
}

impl PortraitDescriptor {
    pub(crate) fn from_sprite_frame(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(text)) => Self {
                asset_key: text.clone(),
                frame_selector: FrameSelector::Text(text.clone()),
            },
            Some(Value::Number(number)) => Self {
                asset_key: ACTOR_SHEET_KEY.to_string(),
                frame_selector: number
                    .as_i64()
                    .or_else(|| number.as_f64().map(|float| float.trunc() as i64))
                    .map_or(FrameSelector::Missing, FrameSelector::Index),
            },
            _ => Self {
                asset_key: ACTOR_SHEET_KEY.to_string(),
                frame_selector: FrameSelector::Missing,
            },
        }
    }

    pub(crate) fn resolve(&self) -> ResolvedPortrait {
        if self.asset_key == STATIC_IMAGE_SENTINEL {
            return ResolvedPortrait {
                renderable: RenderableKind::Image(STATIC_IMAGE_KEY.to_string()),
                scale: STATIC_IMAGE_SCALE,
            };
        }

        let frame = match &self.frame_selector {
            FrameSelector::Index(index) => u32::try_from(*index).unwrap_or(0),
            FrameSelector::Text(text) => parse_leading_frame(text),
            FrameSelector::Missing => 0,
        };
        ResolvedPortrait {
            renderable: RenderableKind::SheetFrame {
                sheet: ACTOR_SHEET_KEY.to_string(),
                frame,
                frame_width: ACTOR_FRAME_SIZE_PX,
                frame_height: ACTOR_FRAME_SIZE_PX,
            },
            scale: ACTOR_SCALE,
        }
    }
}

/// Reads the leading decimal digits of `text` (after whitespace and an
/// optional `+`). Anything else, including negatives, is frame 0.
fn parse_leading_frame(text: &str) -> u32 {
    let trimmed = text.trim_start();
    let digits_start = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = digits_start
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse::<u32>().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NpcRecord {
    /// Map object id, kept as text so numeric and string ids join alike.
    pub(crate) external_id: String,
    pub(crate) display_name: String,
    pub(crate) dialogue_tree: DialogueTree,
    pub(crate) portrait: PortraitDescriptor,
}

/// One row as stored remotely: `{map_id, name, dialogue, sprite_frame}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NpcRow {
    pub(crate) map_id: Value,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) dialogue: Value,
    #[serde(default)]
    pub(crate) sprite_frame: Option<Value>,
}

impl NpcRow {
    fn external_id(&self) -> Option<String> {
        match &self.map_id {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => integral_id(number),
            _ => None,
        }
    }
}

/// `12` and `12.0` both name object 12; fractional ids name nothing.
fn integral_id(number: &serde_json::Number) -> Option<String> {
    if let Some(id) = number.as_u64() {
        return Some(id.to_string());
    }
    if let Some(id) = number.as_i64() {
        return Some(id.to_string());
    }
    let float = number.as_f64()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some((float as i64).to_string())
    } else {
        None
    }
}

/// Validates rows into records; rows with an unusable id or dialogue are
/// dropped with a warning and the rest are kept in order.
pub(crate) fn records_from_rows(scene_id: &str, rows: Vec<NpcRow>) -> Vec<NpcRecord> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(external_id) = row.external_id() else {
            warn!(scene = scene_id, map_id = %row.map_id, "npc_row_invalid_map_id");
            continue;
        };
        let display_name = row.name.clone().unwrap_or_else(|| "NPC".to_string());
        let dialogue_tree = match DialogueTree::from_value(&row.dialogue) {
            Ok(tree) => tree,
            Err(error) => {
                warn!(
                    scene = scene_id,
                    map_id = %external_id,
                    name = %display_name,
                    error = %error,
                    "npc_dialogue_invalid"
                );
                continue;
            }
        };
        for (from, to) in dialogue_tree.dangling_targets() {
            warn!(
                scene = scene_id,
                map_id = %external_id,
                name = %display_name,
                from = %from,
                to = %to,
                "npc_dialogue_dangling_target"
            );
        }
        records.push(NpcRecord {
            external_id,
            display_name,
            dialogue_tree,
            portrait: PortraitDescriptor::from_sprite_frame(row.sprite_frame.as_ref()),
        });
    }
    records
}
