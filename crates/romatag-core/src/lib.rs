pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod policy;
pub mod tags;
pub mod transliterate;
pub mod unicode;
