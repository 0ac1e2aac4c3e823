mod bootstrap;
mod catalog;
mod dialogue_window;
mod exploration;
mod loop_runner;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
