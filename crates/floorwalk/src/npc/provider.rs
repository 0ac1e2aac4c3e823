use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use thiserror::Error;
use tracing::{debug, info};

use super::record::NpcRow;

pub(crate) const SUPABASE_URL_ENV_VAR: &str = "FLOORWALK_SUPABASE_URL";
pub(crate) const SUPABASE_KEY_ENV_VAR: &str = "FLOORWALK_SUPABASE_KEY";
pub(crate) const NPC_FILE_ENV_VAR: &str = "FLOORWALK_NPC_FILE";
const DEFAULT_NPC_FILE: &str = "npcs.json";

#[derive(Debug, Error)]
pub(crate) enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("data store answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("data store is offline or unreachable")]
    Offline,
    #[error("invalid data store url '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("failed to decode NPC rows: {0}")]
    Decode(String),
    #[error("failed to read NPC file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetch worker went away before answering")]
    Disconnected,
    #[error("failed to start fetch runtime: {0}")]
    Runtime(String),
}

pub(crate) type FetchResult = Result<Vec<NpcRow>, ProviderError>;

/// Non-blocking handle to an in-flight fetch, polled once per tick.
#[derive(Debug)]
pub(crate) struct PendingFetch {
    receiver: mpsc::Receiver<FetchResult>,
}

/// Sending half handed to whoever completes the fetch.
#[derive(Debug)]
pub(crate) struct FetchResolver {
    sender: mpsc::Sender<FetchResult>,
}

impl PendingFetch {
    pub(crate) fn channel() -> (FetchResolver, PendingFetch) {
        let (sender, receiver) = mpsc::channel();
        (FetchResolver { sender }, PendingFetch { receiver })
    }

    pub(crate) fn ready(result: FetchResult) -> Self {
        let (resolver, pending) = Self::channel();
        resolver.resolve(result);
        pending
    }

    /// `None` while the fetch is still running.
    pub(crate) fn try_take(&self) -> Option<FetchResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(ProviderError::Disconnected)),
        }
    }
}

impl FetchResolver {
    /// Returns false when the handle was already dropped, e.g. the scene unloaded.
    pub(crate) fn resolve(self, result: FetchResult) -> bool {
        self.sender.send(result).is_ok()
    }
}

/// Source of NPC rows for a scene.
pub(crate) trait DialogueDataProvider {
    fn fetch(&self, scene_id: &str) -> PendingFetch;

    fn kind(&self) -> &'static str;
}

/// Offline source: `{ "<scene_id>": [rows...] }` in a local JSON file.
#[derive(Debug, Clone)]
pub(crate) struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_scene_rows(&self, scene_id: &str) -> FetchResult {
        let raw = fs::read_to_string(&self.path).map_err(|source| ProviderError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut by_scene = parse_scene_rows(&raw)?;
        Ok(by_scene.remove(scene_id).unwrap_or_default())
    }
}

impl DialogueDataProvider for FileProvider {
    fn fetch(&self, scene_id: &str) -> PendingFetch {
        debug!(scene = scene_id, path = %self.path.display(), "npc_file_fetch");
        PendingFetch::ready(self.read_scene_rows(scene_id))
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

fn parse_scene_rows(raw: &str) -> Result<HashMap<String, Vec<NpcRow>>, ProviderError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        if path.is_empty() || path == "." {
            ProviderError::Decode(source.to_string())
        } else {
            ProviderError::Decode(format!("at {path}: {source}"))
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProviderChoice {
    Remote { url: String, api_key: String },
    File(PathBuf),
    None,
}

/// Remote credentials win, then an explicit NPC file, then `assets/npcs.json`
/// when it exists.
pub(crate) fn choose_provider(
    lookup: impl Fn(&str) -> Option<String>,
    assets_dir: &Path,
) -> ProviderChoice {
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let (Some(url), Some(api_key)) = (
        non_empty(SUPABASE_URL_ENV_VAR),
        non_empty(SUPABASE_KEY_ENV_VAR),
    ) {
        return ProviderChoice::Remote { url, api_key };
    }
    if let Some(path) = non_empty(NPC_FILE_ENV_VAR) {
        return ProviderChoice::File(PathBuf::from(path));
    }
    let default_file = assets_dir.join(DEFAULT_NPC_FILE);
    if default_file.is_file() {
        return ProviderChoice::File(default_file);
    }
    ProviderChoice::None
}

pub(crate) fn build_provider(
    choice: ProviderChoice,
) -> Result<Option<Box<dyn DialogueDataProvider>>, ProviderError> {
    let provider: Box<dyn DialogueDataProvider> = match choice {
        ProviderChoice::Remote { url, api_key } => {
            info!(url = %url, "npc_provider_remote");
            Box::new(super::remote::RemoteProvider::new(url, api_key)?)
        }
        ProviderChoice::File(path) => {
            info!(path = %path.display(), "npc_provider_file");
            Box::new(FileProvider::new(path))
        }
        ProviderChoice::None => return Ok(None),
    };
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| {
            owned
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        }
    }

    #[test]
    fn pending_fetch_is_empty_until_resolved() {
        let (resolver, pending) = PendingFetch::channel();
        assert!(pending.try_take().is_none());

        assert!(resolver.resolve(Ok(Vec::new())));
        let result = pending.try_take().expect("resolved");
        assert!(result.expect("rows").is_empty());
    }

    #[test]
    fn dropped_resolver_reports_disconnect() {
        let (resolver, pending) = PendingFetch::channel();
        drop(resolver);
        assert!(matches!(
            pending.try_take(),
            Some(Err(ProviderError::Disconnected))
        ));
    }

    #[test]
    fn resolving_after_handle_dropped_is_a_no_op() {
        let (resolver, pending) = PendingFetch::channel();
        drop(pending);
        assert!(!resolver.resolve(Err(ProviderError::Timeout)));
    }

    #[test]
    fn file_provider_returns_rows_for_the_scene_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("npcs.json");
        fs::write(
            &path,
            r#"{
                "EntranceScene": [
                    {"map_id": 4, "name": "Guard", "dialogue": {"start": {"text": "Halt."}}, "sprite_frame": "kuyaguard.png"}
                ],
                "Floor1Scene": []
            }"#,
        )
        .expect("write npc file");
        let provider = FileProvider::new(path);

        let rows = provider
            .fetch("EntranceScene")
            .try_take()
            .expect("ready")
            .expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("Guard"));

        let none = provider
            .fetch("Floor4Scene")
            .try_take()
            .expect("ready")
            .expect("rows");
        assert!(none.is_empty());
    }

    #[test]
    fn file_provider_reports_decode_path_and_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("npcs.json");
        fs::write(&path, r#"{"EntranceScene": [{"name": "No id"}]}"#).expect("write");

        let error = FileProvider::new(path)
            .fetch("EntranceScene")
            .try_take()
            .expect("ready")
            .expect_err("missing map_id");
        match error {
            ProviderError::Decode(message) => assert!(message.contains("EntranceScene[0]")),
            other => panic!("unexpected error {other:?}"),
        }

        let missing = FileProvider::new(dir.path().join("absent.json"))
            .fetch("EntranceScene")
            .try_take()
            .expect("ready");
        assert!(matches!(missing, Err(ProviderError::Io { .. })));
    }

    #[test]
    fn provider_choice_prefers_remote_then_file_then_default() {
        let dir = tempfile::tempdir().expect("tempdir");

        let remote = choose_provider(
            lookup_from(&[
                (SUPABASE_URL_ENV_VAR, "https://example.supabase.co"),
                (SUPABASE_KEY_ENV_VAR, "anon"),
                (NPC_FILE_ENV_VAR, "/tmp/npcs.json"),
            ]),
            dir.path(),
        );
        assert_eq!(
            remote,
            ProviderChoice::Remote {
                url: "https://example.supabase.co".to_string(),
                api_key: "anon".to_string()
            }
        );

        let file = choose_provider(
            lookup_from(&[
                (SUPABASE_URL_ENV_VAR, "https://example.supabase.co"),
                (NPC_FILE_ENV_VAR, "/tmp/npcs.json"),
            ]),
            dir.path(),
        );
        assert_eq!(file, ProviderChoice::File(PathBuf::from("/tmp/npcs.json")));

        assert_eq!(choose_provider(lookup_from(&[]), dir.path()), ProviderChoice::None);

        fs::write(dir.path().join("npcs.json"), "{}").expect("write default");
        assert_eq!(
            choose_provider(lookup_from(&[(SUPABASE_KEY_ENV_VAR, " ")]), dir.path()),
            ProviderChoice::File(dir.path().join("npcs.json"))
        );
    }
}
