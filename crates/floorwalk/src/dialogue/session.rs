use std::rc::{Rc, Weak};

use engine::Vec2;
use tracing::{debug, info, warn};

use super::presentation::{DialogueView, PresentationSurface};
use super::tree::{NodeKind, END_NODE_KEY, START_NODE_KEY};
use crate::npc::NpcEntity;

/// Center-to-center distance; an NPC exactly this far away is out of range.
pub(crate) const DEFAULT_INTERACTION_RADIUS: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndReason {
    DeadEnd,
    TerminalMarker,
    Cancelled,
    MissingNode,
    NpcGone,
}

impl EndReason {
    fn as_str(self) -> &'static str {
        match self {
            EndReason::DeadEnd => "dead_end",
            EndReason::TerminalMarker => "terminal_marker",
            EndReason::Cancelled => "cancelled",
            EndReason::MissingNode => "missing_node",
            EndReason::NpcGone => "npc_gone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEvent {
    Started,
    Advanced,
    Ended(EndReason),
    Ignored,
}

#[derive(Debug, Default)]
enum SessionState {
    #[default]
    Idle,
    Showing {
        npc: Weak<NpcEntity>,
        node_key: String,
    },
}

/// At most one conversation per scene. `Idle` behaves as if sitting on the
/// `start` node with nobody engaged.
#[derive(Debug)]
pub(crate) struct DialogueSession {
    state: SessionState,
    interaction_radius: f32,
}

impl Default for DialogueSession {
    fn default() -> Self {
        Self::new(DEFAULT_INTERACTION_RADIUS)
    }
}

impl DialogueSession {
    pub(crate) fn new(interaction_radius: f32) -> Self {
        Self {
            state: SessionState::Idle,
            interaction_radius,
        }
    }

    pub(crate) fn is_interacting(&self) -> bool {
        matches!(self.state, SessionState::Showing { .. })
    }

    pub(crate) fn current_node_key(&self) -> &str {
        match &self.state {
            SessionState::Idle => START_NODE_KEY,
            SessionState::Showing { node_key, .. } => node_key,
        }
    }

    #[cfg(test)]
    pub(crate) fn active_npc(&self) -> Option<Rc<NpcEntity>> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Showing { npc, .. } => npc.upgrade(),
        }
    }

    /// First NPC in registry order strictly inside the radius.
    pub(crate) fn find_npc_in_range<'a>(
        &self,
        player: Vec2,
        npcs: &'a [Rc<NpcEntity>],
    ) -> Option<&'a Rc<NpcEntity>> {
        npcs.iter()
            .find(|npc| player.distance(npc.position) < self.interaction_radius)
    }

    /// Action key: advances while the surface shows a conversation, starts
    /// one otherwise.
    pub(crate) fn press_action(
        &mut self,
        player: Vec2,
        npcs: &[Rc<NpcEntity>],
        surface: &mut dyn PresentationSurface,
    ) -> SessionEvent {
        if surface.is_visible() {
            if self.is_interacting() {
                return self.advance(surface);
            }
            debug!("dialogue_surface_stale");
            surface.hide();
        } else if self.is_interacting() {
            debug!(node = %self.current_node_key(), "dialogue_surface_hidden");
            self.state = SessionState::Idle;
        }
        match self.find_npc_in_range(player, npcs) {
            Some(npc) => self.start(Rc::clone(npc), surface),
            None => SessionEvent::Ignored,
        }
    }

    pub(crate) fn start(
        &mut self,
        npc: Rc<NpcEntity>,
        surface: &mut dyn PresentationSurface,
    ) -> SessionEvent {
        info!(
            npc = %npc.name(),
            map_id = npc.map_id,
            "dialogue_started"
        );
        match self.show(&npc, START_NODE_KEY, surface) {
            SessionEvent::Advanced => SessionEvent::Started,
            other => other,
        }
    }

    pub(crate) fn advance(&mut self, surface: &mut dyn PresentationSurface) -> SessionEvent {
        let (npc, node_key) = match &self.state {
            SessionState::Idle => return SessionEvent::Ignored,
            SessionState::Showing { npc, node_key } => (npc.upgrade(), node_key.clone()),
        };
        let Some(npc) = npc else {
            return self.end(EndReason::NpcGone, surface);
        };
        let Some(node) = npc.record.dialogue_tree.node(&node_key) else {
            warn!(npc = %npc.name(), node = %node_key, "dialogue_node_missing");
            return self.end(EndReason::MissingNode, surface);
        };
        if node_key == END_NODE_KEY {
            return self.end(EndReason::TerminalMarker, surface);
        }
        match &node.kind {
            NodeKind::Dialogue { next } => {
                let next = next.clone();
                self.show(&npc, &next, surface)
            }
            NodeKind::Terminal => self.end(EndReason::DeadEnd, surface),
            NodeKind::Choice { .. } => SessionEvent::Ignored,
        }
    }

    pub(crate) fn select_choice(
        &mut self,
        index: usize,
        surface: &mut dyn PresentationSurface,
    ) -> SessionEvent {
        let (npc, node_key) = match &self.state {
            SessionState::Idle => return SessionEvent::Ignored,
            SessionState::Showing { npc, node_key } => (npc.upgrade(), node_key.clone()),
        };
        let Some(npc) = npc else {
            return self.end(EndReason::NpcGone, surface);
        };
        let next = match npc.record.dialogue_tree.node(&node_key).map(|node| &node.kind) {
            Some(NodeKind::Choice { choices }) => match choices.get(index) {
                Some(choice) => choice.next.clone(),
                None => {
                    debug!(node = %node_key, index, "dialogue_choice_out_of_range");
                    return SessionEvent::Ignored;
                }
            },
            _ => return SessionEvent::Ignored,
        };
        surface.clear_choices();
        self.show(&npc, &next, surface)
    }

    /// Drops activations rendered for a node the session has already left.
    pub(crate) fn select_choice_for(
        &mut self,
        node_key: &str,
        index: usize,
        surface: &mut dyn PresentationSurface,
    ) -> SessionEvent {
        if !self.is_interacting() || self.current_node_key() != node_key {
            debug!(
                rendered_for = node_key,
                current = self.current_node_key(),
                "dialogue_choice_stale"
            );
            return SessionEvent::Ignored;
        }
        self.select_choice(index, surface)
    }

    pub(crate) fn cancel(&mut self, surface: &mut dyn PresentationSurface) -> SessionEvent {
        self.end(EndReason::Cancelled, surface)
    }

    /// No-op from `Idle`.
    pub(crate) fn end(
        &mut self,
        reason: EndReason,
        surface: &mut dyn PresentationSurface,
    ) -> SessionEvent {
        if !self.is_interacting() {
            return SessionEvent::Ignored;
        }
        let node_key = self.current_node_key().to_string();
        self.state = SessionState::Idle;
        surface.hide();
        info!(reason = reason.as_str(), last_node = %node_key, "dialogue_ended");
        SessionEvent::Ended(reason)
    }

    fn show(
        &mut self,
        npc: &Rc<NpcEntity>,
        node_key: &str,
        surface: &mut dyn PresentationSurface,
    ) -> SessionEvent {
        self.state = SessionState::Showing {
            npc: Rc::downgrade(npc),
            node_key: node_key.to_string(),
        };
        let Some(node) = npc.record.dialogue_tree.node(node_key) else {
            warn!(npc = %npc.name(), node = node_key, "dialogue_node_missing");
            return self.end(EndReason::MissingNode, surface);
        };
        surface.render(DialogueView {
            node_key: node_key.to_string(),
            speaker: npc.record.display_name.clone(),
            text: node.text.clone(),
            choices: node.choice_labels(),
            portrait: npc.portrait.clone(),
        });
        SessionEvent::Advanced
    }
}
