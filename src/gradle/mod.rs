pub mod settings;

pub use settings::discover_repositories;
