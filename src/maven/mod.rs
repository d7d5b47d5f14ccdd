pub mod repository;
pub mod version;

pub use repository::MavenRepository;
pub use version::{VersionComparator, VersionToken};
