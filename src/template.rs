use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::platform::ResourceLoader;

pub const TEMPLATE_PATH: &str = "summary-template.html";

/// Single-slot cache for the popup template.
///
/// The first successful load is kept for the life of the cache; there is no
/// expiry. Failed or empty loads are not cached, so a later call retries.
pub struct TemplateCache {
    resources: Arc<dyn ResourceLoader>,
    cell: OnceCell<String>,
}

impl TemplateCache {
    pub fn new(resources: Arc<dyn ResourceLoader>) -> Self {
        Self {
            resources,
            cell: OnceCell::new(),
        }
    }

    /// Returns the template, or an empty string if it could not be loaded.
    pub async fn get_template(&self) -> String {
        if let Some(template) = self.cell.get() {
            debug!("returning cached template");
            return template.clone();
        }

        let url = self.resources.url(TEMPLATE_PATH);
        debug!(%url, "fetching template");
        match self.resources.load(TEMPLATE_PATH).await {
            Ok(template) if template.is_empty() => {
                error!(%url, "template is empty");
                String::new()
            }
            Ok(template) => {
                // A concurrent caller may have filled the slot first. Both hold the same resource.
                let _ = self.cell.set(template.clone());
                template
            }
            Err(e) => {
                error!(%url, error = %e, "Error fetching template");
                String::new()
            }
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryResources;

    #[tokio::test]
    async fn second_call_does_not_reload() {
        let resources =
            Arc::new(MemoryResources::new().with_file(TEMPLATE_PATH, "<div>{{summary}}</div>"));
        let cache = TemplateCache::new(resources.clone());

        assert_eq!(cache.get_template().await, "<div>{{summary}}</div>");
        assert_eq!(cache.get_template().await, "<div>{{summary}}</div>");
        assert_eq!(resources.loads(), 1);
        assert!(cache.is_cached());
    }

    #[tokio::test]
    async fn failure_returns_empty_and_is_not_cached() {
        let resources = Arc::new(MemoryResources::new());
        let cache = TemplateCache::new(resources.clone());

        assert_eq!(cache.get_template().await, "");
        assert_eq!(cache.get_template().await, "");
        assert_eq!(resources.loads(), 2);
        assert!(!cache.is_cached());
    }

    #[tokio::test]
    async fn empty_body_is_not_cached() {
        let resources = Arc::new(MemoryResources::new().with_file(TEMPLATE_PATH, ""));
        let cache = TemplateCache::new(resources.clone());

        assert_eq!(cache.get_template().await, "");
        assert!(!cache.is_cached());
    }
}
