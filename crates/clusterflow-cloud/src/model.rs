//! Resource graph
//!
//! The order of [`Model::resources`] is the dependency order: resource `i`
//! may assume every resource before it already exists. Nothing is inferred
//! and no cycle detection is done.

use crate::error::Result;
use crate::resource::Resource;
use clusterflow_core::Tags;

/// Ordered sequence of resources for one cluster
pub trait Model: Send + Sync {
    fn resources(&self) -> &[Box<dyn Resource>];
}

/// Resource graph built by hand or by a [`ResourceRegistry`](crate::ResourceRegistry)
#[derive(Default)]
pub struct ResourceGraph {
    resources: Vec<Box<dyn Resource>>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: Box<dyn Resource>) {
        self.resources.push(resource);
    }

    pub fn with(mut self, resource: impl Resource + 'static) -> Self {
        self.push(Box::new(resource));
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Tag every resource that supports tagging
    pub fn tag(&mut self, tags: &Tags) -> Result<()> {
        for resource in &mut self.resources {
            resource.tag(tags)?;
        }
        Ok(())
    }

    /// Labels of the resources, in graph order
    pub fn describe(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.describe()).collect()
    }
}

impl Model for ResourceGraph {
    fn resources(&self) -> &[Box<dyn Resource>] {
        &self.resources
    }
}

impl std::fmt::Debug for ResourceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGraph")
            .field("resources", &self.describe())
            .finish()
    }
}
