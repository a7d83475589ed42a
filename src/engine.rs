//! Recommendation engine: candidate selection, preference modeling,
//! scoring strategies and the fallback orchestration tying them together.

pub mod cache;
pub mod candidates;
pub mod embedding;
pub mod orchestrator;
pub mod profile;
pub mod scoring;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::{EngineConfig, RecommendationEngine, RecommendationRequest};
pub use strategy::{Recommendations, ScoredCandidate, StrategyKind};
