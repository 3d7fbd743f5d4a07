pub mod agents;
pub mod audit;
pub mod classify;
pub mod codec;
pub mod config;
pub mod engine;
pub mod files;
pub mod paths;
pub mod projects;
pub mod recovery;
pub mod sessions;
pub mod util;
pub mod warn;
