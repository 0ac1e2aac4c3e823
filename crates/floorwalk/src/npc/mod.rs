mod provider;
mod record;
mod registry;
mod remote;

pub(crate) use provider::{
    build_provider, choose_provider, DialogueDataProvider, PendingFetch,
};
pub(crate) use record::{records_from_rows, ResolvedPortrait};
pub(crate) use registry::{NpcEntity, NpcRegistry, NPC_DEPTH};

#[cfg(test)]
pub(crate) use provider::{FetchResolver, ProviderError};
#[cfg(test)]
pub(crate) use record::{NpcRecord, NpcRow, PortraitDescriptor};
