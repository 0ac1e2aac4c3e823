use std::collections::HashMap;

use engine::{ObjectLayer, PropertyValue, Rect, SceneId, SceneSwitch, SpawnParams, Vec2};
use tracing::{debug, info, warn};

pub(crate) const TELEPORT_LAYER: &str = "teleports";
const TARGET_SCENE_PROPERTY: &str = "target_scene";
const TARGET_X_PROPERTY: &str = "target_x";
const TARGET_Y_PROPERTY: &str = "target_y";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TransitionTrigger {
    pub(crate) region: Rect,
    /// `None` makes the trigger inert.
    pub(crate) target_scene: Option<String>,
    /// Set only when both coordinates parse as numbers.
    pub(crate) target: Option<Vec2>,
    pub(crate) properties: HashMap<String, PropertyValue>,
}

impl TransitionTrigger {
    pub(crate) fn switch_request(&self) -> Option<SceneSwitch> {
        let scene = self.target_scene.as_deref()?;
        Some(SceneSwitch {
            scene: SceneId::new(scene),
            spawn: SpawnParams {
                target: self.target,
            },
        })
    }
}

/// Read-only set of trigger regions for one scene load.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TransitionCoordinator {
    triggers: Vec<TransitionTrigger>,
}

impl TransitionCoordinator {
    pub(crate) fn from_object_layer(layer: Option<&ObjectLayer>) -> Self {
        let Some(layer) = layer else {
            debug!("teleport_layer_missing");
            return Self::default();
        };

        let triggers: Vec<TransitionTrigger> = layer
            .objects
            .iter()
            .map(|object| {
                let properties = object.properties_map();
                let target_scene = properties
                    .get(TARGET_SCENE_PROPERTY)
                    .map(PropertyValue::as_text)
                    .map(|scene| scene.trim().to_string())
                    .filter(|scene| !scene.is_empty());
                let target_x = properties.get(TARGET_X_PROPERTY).and_then(PropertyValue::as_f32);
                let target_y = properties.get(TARGET_Y_PROPERTY).and_then(PropertyValue::as_f32);
                let target = match (target_x, target_y) {
                    (Some(x), Some(y)) => Some(Vec2::new(x, y)),
                    _ => None,
                };

                if target_scene.is_none() {
                    warn!(object_id = object.id, "teleport_missing_target_scene");
                } else if target.is_none() {
                    warn!(
                        object_id = object.id,
                        target_scene = target_scene.as_deref().unwrap_or_default(),
                        "teleport_target_coordinates_invalid"
                    );
                }

                TransitionTrigger {
                    region: Rect::new(object.x, object.y, object.width, object.height),
                    target_scene,
                    target,
                    properties,
                }
            })
            .collect();

        info!(trigger_count = triggers.len(), "teleports_loaded");
        Self { triggers }
    }

    #[cfg(test)]
    pub(crate) fn triggers(&self) -> &[TransitionTrigger] {
        &self.triggers
    }

    pub(crate) fn len(&self) -> usize {
        self.triggers.len()
    }

    /// First overlapping trigger that names a destination wins.
    pub(crate) fn check(&self, player_body: &Rect) -> Option<SceneSwitch> {
        self.triggers
            .iter()
            .filter(|trigger| trigger.region.overlaps(player_body))
            .find_map(TransitionTrigger::switch_request)
    }
}
