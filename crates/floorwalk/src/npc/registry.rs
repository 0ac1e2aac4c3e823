use std::collections::HashMap;
use std::rc::Rc;

use engine::{EntityId, ObjectLayer, Rect, RenderableDesc, SceneWorld, Transform, Vec2};
use tracing::{info, warn};

use super::record::{NpcRecord, ResolvedPortrait};

pub(crate) const NPC_DEPTH: i32 = 9;
const NPC_BODY_WIDTH: f32 = 20.0;
const NPC_BODY_HEIGHT: f32 = 10.0;
/// Body sits around the feet, below the sprite center.
const NPC_BODY_OFFSET_Y: f32 = 6.0;

#[derive(Debug)]
pub(crate) struct NpcEntity {
    pub(crate) entity_id: EntityId,
    pub(crate) map_id: u32,
    pub(crate) position: Vec2,
    pub(crate) record: Rc<NpcRecord>,
    pub(crate) portrait: ResolvedPortrait,
}

impl NpcEntity {
    pub(crate) fn name(&self) -> &str {
        &self.record.display_name
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct SpawnReport {
    pub(crate) spawned: Vec<u32>,
    pub(crate) unmatched: Vec<u32>,
}

/// Interactable NPCs of one scene instance, in object-layer order.
#[derive(Debug, Default)]
pub(crate) struct NpcRegistry {
    entities: Vec<Rc<NpcEntity>>,
}

impl NpcRegistry {
    pub(crate) fn entities(&self) -> &[Rc<NpcEntity>] {
        &self.entities
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Joins object placements against records by id. Whatever was spawned
    /// before is despawned first, so calling this again never stacks entities.
    pub(crate) fn spawn(
        &mut self,
        layer: Option<&ObjectLayer>,
        records: Vec<NpcRecord>,
        world: &mut SceneWorld,
    ) -> SpawnReport {
        self.clear(world);
        let mut report = SpawnReport::default();

        let Some(layer) = layer else {
            warn!(record_count = records.len(), "npc_layer_missing");
            return report;
        };

        let mut by_id: HashMap<String, Rc<NpcRecord>> = HashMap::with_capacity(records.len());
        for record in records {
            by_id.insert(record.external_id.clone(), Rc::new(record));
        }

        for object in &layer.objects {
            let Some(record) = by_id.get(&object.id.to_string()) else {
                warn!(map_id = object.id, layer = %layer.name, "npc_spawn_unmatched");
                report.unmatched.push(object.id);
                continue;
            };

            let (center_x, center_y) = object.center();
            let position = Vec2::new(center_x, center_y);
            let portrait = record.portrait.resolve();
            let entity_id = world.spawn_scaled(
                Transform { position },
                RenderableDesc {
                    kind: portrait.renderable.clone(),
                    debug_name: "npc",
                },
                portrait.scale,
                NPC_DEPTH,
            );
            let body = Rect::new(
                position.x - NPC_BODY_WIDTH * 0.5,
                position.y + NPC_BODY_OFFSET_Y,
                NPC_BODY_WIDTH,
                NPC_BODY_HEIGHT,
            );
            world.collision_mut().add_body(entity_id, body);

            info!(
                map_id = object.id,
                name = %record.display_name,
                entity_id = entity_id.0,
                "npc_spawned"
            );
            report.spawned.push(object.id);
            self.entities.push(Rc::new(NpcEntity {
                entity_id,
                map_id: object.id,
                position,
                record: Rc::clone(record),
                portrait,
            }));
        }

        info!(
            spawned = report.spawned.len(),
            unmatched = report.unmatched.len(),
            "npcs_spawned"
        );
        report
    }

    /// Despawns every NPC and releases its collision body.
    pub(crate) fn clear(&mut self, world: &mut SceneWorld) {
        for entity in self.entities.drain(..) {
            world.despawn(entity.entity_id);
            world.collision_mut().remove_bodies_of(entity.entity_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::DialogueTree;
    use crate::npc::record::PortraitDescriptor;
    use engine::MapObject;

    fn object(id: u32, x: f32, y: f32) -> MapObject {
        MapObject {
            id,
            name: String::new(),
            x,
            y,
            width: 32.0,
            height: 32.0,
            properties: Vec::new(),
        }
    }

    fn record(id: &str, name: &str) -> NpcRecord {
        NpcRecord {
            external_id: id.to_string(),
            display_name: name.to_string(),
            dialogue_tree: DialogueTree::default(),
            portrait: PortraitDescriptor::from_sprite_frame(None),
        }
    }

    fn npc_layer(ids: &[u32]) -> ObjectLayer {
        ObjectLayer {
            name: "npcs".to_string(),
            objects: ids
                .iter()
                .map(|id| object(*id, *id as f32 * 100.0, 50.0))
                .collect(),
        }
    }

    #[test]
    fn join_spawns_matches_and_reports_unmatched_ids() {
        let mut world = SceneWorld::default();
        let mut registry = NpcRegistry::default();

        let report = registry.spawn(
            Some(&npc_layer(&[1, 2, 3])),
            vec![record("1", "Ana"), record("3", "Ben")],
            &mut world,
        );
        world.apply_pending();

        assert_eq!(report.spawned, vec![1, 3]);
        assert_eq!(report.unmatched, vec![2]);
        assert_eq!(registry.len(), 2);
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.collision().bodies().len(), 2);
        let names: Vec<&str> = registry.entities().iter().map(|npc| npc.name()).collect();
        assert_eq!(names, vec!["Ana", "Ben"]);
    }

    #[test]
    fn respawning_discards_previous_entities_and_bodies() {
        let mut world = SceneWorld::default();
        let mut registry = NpcRegistry::default();
        let layer = npc_layer(&[1, 2]);

        registry.spawn(
            Some(&layer),
            vec![record("1", "Ana"), record("2", "Ben")],
            &mut world,
        );
        world.apply_pending();
        let first_ids: Vec<EntityId> = registry.entities().iter().map(|npc| npc.entity_id).collect();

        registry.spawn(
            Some(&layer),
            vec![record("1", "Ana"), record("2", "Ben")],
            &mut world,
        );
        world.apply_pending();

        assert_eq!(registry.len(), 2);
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.collision().bodies().len(), 2);
        for id in first_ids {
            assert!(world.find_entity(id).is_none());
        }
    }

    #[test]
    fn npc_sits_at_object_center_with_feet_body() {
        let mut world = SceneWorld::default();
        let mut registry = NpcRegistry::default();

        registry.spawn(Some(&npc_layer(&[2])), vec![record("2", "Ana")], &mut world);
        world.apply_pending();

        let npc = &registry.entities()[0];
        assert_eq!(npc.position, Vec2::new(216.0, 66.0));
        let bodies = world.collision().bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].owner, npc.entity_id);
        assert_eq!(bodies[0].rect, Rect::new(206.0, 72.0, 20.0, 10.0));
        let entity = world.find_entity(npc.entity_id).expect("entity");
        assert_eq!(entity.depth, NPC_DEPTH);
        assert_eq!(entity.scale, 2.0);
    }

    #[test]
    fn duplicate_record_ids_keep_the_last_row() {
        let mut world = SceneWorld::default();
        let mut registry = NpcRegistry::default();

        registry.spawn(
            Some(&npc_layer(&[1])),
            vec![record("1", "Old"), record("1", "New")],
            &mut world,
        );

        assert_eq!(registry.entities()[0].name(), "New");
    }

    #[test]
    fn missing_layer_leaves_registry_empty() {
        let mut world = SceneWorld::default();
        let mut registry = NpcRegistry::default();

        let report = registry.spawn(None, vec![record("1", "Ana")], &mut world);

        assert!(registry.is_empty());
        assert_eq!(report, SpawnReport::default());
    }
}
