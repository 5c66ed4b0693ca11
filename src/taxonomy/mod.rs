//! Local taxonomy: closed category/tag sets and the upstream mapping table.

mod registry;
mod tags;

pub use registry::{
    TaxonomyRegistry, UpstreamSentinels, UpstreamTagRef, ANIMATION_TAG_ID, COVER_VERSION_TAG_ID,
    VIDEO_GAME_TAG_ID, WESTERN_TAG_ID,
};
pub use tags::{AudioTag, LinkType, MediaType, VideoTag};
