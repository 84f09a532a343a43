pub mod generative;
pub mod history;
pub mod photos;

pub use generative::{
    GenerateRequest, GenerativeService, ImagePayload, ModelGatewayClient, ResponseFormat,
};
pub use history::{HistoryEntry, HistorySink, HttpHistorySink, NoopHistorySink};
pub use photos::{HttpPhotoFetcher, PhotoBytes, PhotoFetcher};
