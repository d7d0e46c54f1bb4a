//! Tile rendering infrastructure

mod cache;
mod cancel;
mod request;
mod service;
mod worker;

pub use cache::{TileCache, TilePayload};
pub use cancel::CancelToken;
pub use request::{
    RenderFault, RenderJob, RenderResponse, RequestId, TileKey, tile_region, tiles_covering,
};
pub use service::{RenderService, RequestOutcome};
