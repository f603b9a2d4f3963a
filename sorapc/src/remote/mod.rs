//! Remote collaborators: the job API and the watermark removal service.
//!
//! Both are reached through traits; the `Http*` types are the real clients.

mod api;
mod http;
mod unwatermark;

pub use api::{
    CreateVideoRequest, DraftItem, DraftsPage, Orientation, PendingStatus, PublishedUrlKey,
    RemoteApi, published_share_url, publish_failed,
};
pub use http::HttpRemoteApi;
pub use unwatermark::{
    DEFAULT_WATERMARK_ENDPOINT, HttpWatermarkResolver, WatermarkResolver,
    looks_like_direct_media_url,
};
