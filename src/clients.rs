pub mod embedding;

pub use embedding::{EmbeddingClient, EmbeddingError, EmbeddingProviderConfig};
