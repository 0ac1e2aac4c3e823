use std::path::{Path, PathBuf};
use std::rc::Rc;

use engine::{resolve_app_paths, LoopConfig, Scene, SceneId, StartupError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::catalog::{load_catalog, CatalogError};
use super::exploration::ExplorationScene;
use crate::npc::{build_provider, choose_provider, DialogueDataProvider};

const MAPS_DIR: &str = "maps";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scenes: Vec<(SceneId, Box<dyn Scene>)>,
    pub(crate) assets_dir: PathBuf,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Floorwalk Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        assets = %paths.assets_dir.display(),
        "app_paths_resolved"
    );

    let catalog = load_catalog(&paths.assets_dir)?;
    let provider = npc_provider(&paths.assets_dir);
    let maps_dir = paths.assets_dir.join(MAPS_DIR);

    let scenes = catalog
        .into_iter()
        .map(|config| {
            let id = SceneId::new(config.scene_id.clone());
            let scene: Box<dyn Scene> = Box::new(ExplorationScene::new(
                config,
                maps_dir.clone(),
                provider.clone(),
            ));
            (id, scene)
        })
        .collect();

    Ok(AppWiring {
        config: LoopConfig::default(),
        scenes,
        assets_dir: paths.assets_dir,
    })
}

/// A provider that fails to build leaves the building without NPCs.
fn npc_provider(assets_dir: &Path) -> Option<Rc<dyn DialogueDataProvider>> {
    let choice = choose_provider(|name| std::env::var(name).ok(), assets_dir);
    match build_provider(choice) {
        Ok(Some(provider)) => Some(Rc::from(provider)),
        Ok(None) => {
            warn!("npc_provider_none");
            None
        }
        Err(err) => {
            warn!(error = %err, "npc_provider_unavailable");
            None
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
