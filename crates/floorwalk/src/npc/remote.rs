use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::provider::{DialogueDataProvider, FetchResult, PendingFetch, ProviderError};
use super::record::NpcRow;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const NPC_COLUMNS: &str = "map_id,name,dialogue,sprite_frame";

/// PostgREST-backed provider. Requests run on a small background runtime and
/// hand their result back through a [`PendingFetch`].
pub(crate) struct RemoteProvider {
    runtime: Runtime,
    client: Client,
    base_url: String,
    api_key: String,
}

impl RemoteProvider {
    pub(crate) fn new(base_url: String, api_key: String) -> Result<Self, ProviderError> {
        // Reject a malformed url up front.
        npcs_query_url(&base_url, "probe")?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("npc-fetch")
            .enable_all()
            .build()
            .map_err(|error| ProviderError::Runtime(error.to_string()))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ProviderError::Runtime(error.to_string()))?;

        Ok(Self {
            runtime,
            client,
            base_url,
            api_key,
        })
    }
}

impl DialogueDataProvider for RemoteProvider {
    fn fetch(&self, scene_id: &str) -> PendingFetch {
        let url = match npcs_query_url(&self.base_url, scene_id) {
            Ok(url) => url,
            Err(error) => return PendingFetch::ready(Err(error)),
        };
        let (resolver, pending) = PendingFetch::channel();
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let scene = scene_id.to_string();

        self.runtime.spawn(async move {
            let result = fetch_rows(&client, url, &api_key).await;
            if let Err(error) = &result {
                warn!(scene = %scene, error = %error, "npc_fetch_failed");
            }
            if !resolver.resolve(result) {
                debug!(scene = %scene, "npc_fetch_result_unclaimed");
            }
        });

        pending
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

pub(crate) fn npcs_query_url(base_url: &str, scene_id: &str) -> Result<Url, ProviderError> {
    let endpoint = format!("{}/rest/v1/npcs", base_url.trim_end_matches('/'));
    let scene_filter = format!("eq.{scene_id}");
    Url::parse_with_params(
        &endpoint,
        &[("select", NPC_COLUMNS), ("scene_key", scene_filter.as_str())],
    )
    .map_err(|error| ProviderError::InvalidUrl {
        url: base_url.to_string(),
        message: error.to_string(),
    })
}

async fn fetch_rows(client: &Client, url: Url, api_key: &str) -> FetchResult {
    let response = client
        .get(url)
        .header("apikey", api_key)
        .bearer_auth(api_key)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(status_error(status, message));
    }
    Ok(response.json::<Vec<NpcRow>>().await?)
}

fn status_error(status: StatusCode, message: String) -> ProviderError {
    ProviderError::Status {
        status: status.as_u16(),
        message,
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout
        } else if error.is_connect() {
            ProviderError::Offline
        } else if error.is_decode() {
            ProviderError::Decode(error.to_string())
        } else {
            ProviderError::Network(error.to_string())
        }
    }
}
