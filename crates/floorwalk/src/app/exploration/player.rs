use engine::{
    CollisionWorld, EntityId, InputAction, InputSnapshot, Rect, RenderableDesc, RenderableKind,
    SceneWorld, Transform, Vec2,
};

use crate::npc::{NpcEntity, NPC_DEPTH};

pub(crate) const PLAYER_SPEED: f32 = 100.0;
pub(crate) const PLAYER_SCALE: f32 = 2.0;
pub(crate) const PLAYER_DEPTH: i32 = NPC_DEPTH + 1;
const PLAYER_SHEET: &str = "player";
const PLAYER_FRAME_SIZE_PX: u32 = 16;
const WALK_FRAMES_PER_DIRECTION: u32 = 3;
const WALK_FPS: f32 = 10.0;
const BODY_WIDTH: f32 = 24.0;
const BODY_HEIGHT: f32 = 12.0;
const BODY_OFFSET_Y: f32 = 4.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Facing {
    #[default]
    Down,
    Up,
    Left,
    Right,
}

impl Facing {
    fn first_frame(self) -> u32 {
        match self {
            Facing::Down => 0,
            Facing::Up => 3,
            Facing::Left => 6,
            Facing::Right => 9,
        }
    }

    /// Horizontal wins so diagonal walking shows the side view.
    fn from_velocity(velocity: Vec2) -> Option<Self> {
        if velocity.x < 0.0 {
            Some(Facing::Left)
        } else if velocity.x > 0.0 {
            Some(Facing::Right)
        } else if velocity.y < 0.0 {
            Some(Facing::Up)
        } else if velocity.y > 0.0 {
            Some(Facing::Down)
        } else {
            None
        }
    }
}

/// Left beats right and up beats down when both are held.
pub(crate) fn velocity_from_input(input: &InputSnapshot, speed: f32) -> Vec2 {
    let x = if input.is_down(InputAction::MoveLeft) {
        -1.0
    } else if input.is_down(InputAction::MoveRight) {
        1.0
    } else {
        0.0
    };
    let y = if input.is_down(InputAction::MoveUp) {
        -1.0
    } else if input.is_down(InputAction::MoveDown) {
        1.0
    } else {
        0.0
    };
    Vec2::new(x, y).normalized_or_zero().scaled(speed)
}

/// Feet-level collision box for a player standing at `position`.
pub(crate) fn player_body_at(position: Vec2) -> Rect {
    Rect::new(
        position.x - BODY_WIDTH * 0.5,
        position.y + BODY_OFFSET_Y,
        BODY_WIDTH,
        BODY_HEIGHT,
    )
}

#[derive(Debug, Clone)]
pub(crate) struct PlayerController {
    entity_id: EntityId,
    position: Vec2,
    velocity: Vec2,
    facing: Facing,
    walk_time: f32,
}

impl PlayerController {
    pub(crate) fn spawn(world: &mut SceneWorld, position: Vec2) -> Self {
        let entity_id = world.spawn_scaled(
            Transform { position },
            RenderableDesc {
                kind: player_frame(Facing::Down.first_frame()),
                debug_name: "player",
            },
            PLAYER_SCALE,
            PLAYER_DEPTH,
        );
        Self {
            entity_id,
            position,
            velocity: Vec2::ZERO,
            facing: Facing::Down,
            walk_time: 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub(crate) fn position(&self) -> Vec2 {
        self.position
    }

    #[cfg(test)]
    pub(crate) fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub(crate) fn facing(&self) -> Facing {
        self.facing
    }

    pub(crate) fn body(&self) -> Rect {
        player_body_at(self.position)
    }

    pub(crate) fn is_walking(&self) -> bool {
        self.velocity != Vec2::ZERO
    }

    /// Moves by input, blocked by tiles and static bodies, axis by axis.
    pub(crate) fn step(&mut self, dt: f32, input: &InputSnapshot, collision: &CollisionWorld) {
        self.velocity = velocity_from_input(input, PLAYER_SPEED);
        if let Some(facing) = Facing::from_velocity(self.velocity) {
            if facing != self.facing {
                self.walk_time = 0.0;
            }
            self.facing = facing;
        }

        if self.is_walking() {
            let applied = collision.move_body(self.body(), self.velocity.scaled(dt));
            self.position = self.position.offset(applied);
            self.walk_time += dt;
        } else {
            self.walk_time = 0.0;
        }
    }

    /// Zero velocity and idle pose; applied every tick a dialogue is open.
    pub(crate) fn halt(&mut self) {
        self.velocity = Vec2::ZERO;
        self.walk_time = 0.0;
    }

    pub(crate) fn current_frame(&self) -> u32 {
        let first = self.facing.first_frame();
        if !self.is_walking() {
            return first;
        }
        let step = (self.walk_time * WALK_FPS) as u32 % WALK_FRAMES_PER_DIRECTION;
        first + step
    }

    pub(crate) fn sync(&self, world: &mut SceneWorld) {
        if let Some(entity) = world.find_entity_mut(self.entity_id) {
            entity.transform.position = self.position;
            entity.renderable.kind = player_frame(self.current_frame());
        }
    }

    pub(crate) fn distance_to(&self, npc: &NpcEntity) -> f32 {
        self.position.distance(npc.position)
    }
}

fn player_frame(frame: u32) -> RenderableKind {
    RenderableKind::SheetFrame {
        sheet: PLAYER_SHEET.to_string(),
        frame,
        frame_width: PLAYER_FRAME_SIZE_PX,
        frame_height: PLAYER_FRAME_SIZE_PX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(actions: &[InputAction]) -> InputSnapshot {
        let mut snapshot = InputSnapshot::empty();
        for action in actions {
            snapshot = snapshot.with_action_down(*action, true);
        }
        snapshot
    }

    #[test]
    fn diagonal_speed_is_normalized() {
        let velocity = velocity_from_input(
            &held(&[InputAction::MoveRight, InputAction::MoveDown]),
            PLAYER_SPEED,
        );
        assert!((velocity.length() - PLAYER_SPEED).abs() < 1e-3);
        assert!(velocity.x > 0.0 && velocity.y > 0.0);
    }

    #[test]
    fn opposing_keys_resolve_to_left_and_up() {
        let velocity = velocity_from_input(
            &held(&[
                InputAction::MoveLeft,
                InputAction::MoveRight,
                InputAction::MoveUp,
                InputAction::MoveDown,
            ]),
            1.0,
        );
        assert!(velocity.x < 0.0);
        assert!(velocity.y < 0.0);
    }

    #[test]
    fn walking_cycles_three_frames_per_direction_then_idles_on_facing() {
        let mut world = SceneWorld::default();
        let mut player = PlayerController::spawn(&mut world, Vec2::new(50.0, 50.0));
        let collision = CollisionWorld::default();
        let left = held(&[InputAction::MoveLeft]);

        player.step(0.05, &left, &collision);
        assert_eq!(player.facing(), Facing::Left);
        assert_eq!(player.current_frame(), 6);
        player.step(0.1, &left, &collision);
        assert_eq!(player.current_frame(), 7);
        player.step(0.1, &left, &collision);
        assert_eq!(player.current_frame(), 8);
        player.step(0.1, &left, &collision);
        assert_eq!(player.current_frame(), 6);
        assert!((player.position().x - 15.0).abs() < 1e-3);

        player.step(0.1, &InputSnapshot::empty(), &collision);
        assert_eq!(player.current_frame(), 6);
        assert!(!player.is_walking());
    }

    #[test]
    fn halt_stops_motion_and_animation() {
        let mut world = SceneWorld::default();
        let mut player = PlayerController::spawn(&mut world, Vec2::ZERO);
        player.step(0.25, &held(&[InputAction::MoveUp]), &CollisionWorld::default());
        assert!(player.is_walking());

        player.halt();

        assert_eq!(player.velocity(), Vec2::ZERO);
        assert_eq!(player.current_frame(), 3);
    }

    #[test]
    fn static_bodies_block_movement() {
        let mut world = SceneWorld::default();
        let mut player = PlayerController::spawn(&mut world, Vec2::new(0.0, 0.0));
        let mut collision = CollisionWorld::default();
        collision.add_body(EntityId(99), Rect::new(20.0, 0.0, 20.0, 40.0));

        for _ in 0..10 {
            player.step(0.1, &held(&[InputAction::MoveRight]), &collision);
        }

        assert!(player.body().right() <= 20.0 + 1e-3);
        assert!(player.position().x > 0.0);
    }

    #[test]
    fn body_sits_below_the_sprite_center() {
        assert_eq!(
            player_body_at(Vec2::new(100.0, 50.0)),
            Rect::new(88.0, 54.0, 24.0, 12.0)
        );
    }
}
