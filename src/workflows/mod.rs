pub mod classifier;
pub mod corpus;
pub mod identity;
pub mod matcher;
pub mod normalizer;
pub mod pipeline;
pub mod renamer;
