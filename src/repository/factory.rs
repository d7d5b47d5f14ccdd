use crate::config::UpdateConfig;
use crate::error::Result;
use crate::maven::MavenRepository;
use crate::repository::{RepositoryClient, RepositoryGroup};
use std::sync::Arc;

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Builds one Maven client per configured repository, keeping priority order.
    pub fn create_group(config: &UpdateConfig) -> Result<RepositoryGroup> {
        let repositories = config
            .repositories
            .iter()
            .map(|spec| {
                let client = MavenRepository::new(spec, config.request_timeout)?;
                Ok(Arc::new(client) as Arc<dyn RepositoryClient>)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RepositoryGroup::new(repositories, config.request_timeout))
    }
}
