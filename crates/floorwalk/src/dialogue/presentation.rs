use crate::npc::ResolvedPortrait;

/// Everything a surface needs to draw one dialogue node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DialogueView {
    /// Node this view was rendered for; choice activations carry it back.
    pub(crate) node_key: String,
    pub(crate) speaker: String,
    pub(crate) text: String,
    /// Empty means "press to continue".
    pub(crate) choices: Vec<String>,
    pub(crate) portrait: ResolvedPortrait,
}

/// Draws what the session tells it to. Holds no dialogue logic.
pub(crate) trait PresentationSurface {
    fn render(&mut self, view: DialogueView);
    fn clear_choices(&mut self);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
}
