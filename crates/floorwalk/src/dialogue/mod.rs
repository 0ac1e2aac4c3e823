mod presentation;
mod session;
mod tree;

pub(crate) use presentation::{DialogueView, PresentationSurface};
pub(crate) use session::{DialogueSession, SessionEvent};
pub(crate) use tree::DialogueTree;

#[cfg(test)]
pub(crate) use tree::START_NODE_KEY;
