pub mod loader;
pub mod schema;

pub use loader::{load_config, CliOverrides};
pub use schema::Config;
