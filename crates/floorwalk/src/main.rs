use std::process::ExitCode;

mod app;
mod dialogue;
mod npc;
mod transition;

fn main() -> ExitCode {
    app::run(app::build_app())
}
