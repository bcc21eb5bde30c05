// Models module for data structures
pub mod env_flags;
pub mod layer_cache;
pub mod manifest;
pub mod recipe;
pub mod step;
