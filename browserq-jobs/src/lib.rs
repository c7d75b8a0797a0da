//! Built-in job implementations for browserq workers.
//!
//! This crate provides implementations of the
//! [`JobExecutor`](browserq_job_queue::JobExecutor) trait and the startup step
//! that registers them.
//!
//! # Job Kinds
//!
//! - `noop` - Does nothing, optionally echoing `output`
//! - `page.fetch` - Load `url` and return the document body
//! - `page.title` - Load `url` and return its `<title>`
//!
//! # Usage
//!
//! ```rust
//! use browserq_job_queue::JobRegistry;
//! use browserq_jobs::register_builtin_jobs;
//!
//! let mut registry = JobRegistry::new();
//! register_builtin_jobs(&mut registry);
//! assert!(registry.contains("page.title"));
//! ```

mod error;
mod noop;
mod page;

pub use error::DefinitionError;
pub use noop::NoopJob;
pub use page::{extract_title, FetchJob, TitleJob};

use std::collections::HashSet;

use browserq_job_queue::JobRegistry;
use serde::Deserialize;

/// Job kind constants for type-safe job references.
pub mod job_kinds {
    pub const NOOP: &str = "noop";
    pub const PAGE_FETCH: &str = "page.fetch";
    pub const PAGE_TITLE: &str = "page.title";
}

/// Register every built-in job under its kind name.
pub fn register_builtin_jobs(registry: &mut JobRegistry) {
    registry
        .register_typed::<NoopJob>(job_kinds::NOOP)
        .register_typed::<FetchJob>(job_kinds::PAGE_FETCH)
        .register_typed::<TitleJob>(job_kinds::PAGE_TITLE);
}

/// One entry of a job definitions file: expose built-in `kind` as `name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub kind: String,
}

/// Contents of a job definitions file.
///
/// ```toml
/// [[jobs]]
/// name = "homepage-title"
/// kind = "page.title"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDefinitions {
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

impl JobDefinitions {
    pub fn into_registry(self) -> Result<JobRegistry, DefinitionError> {
        registry_from_definitions(&self.jobs)
    }
}

/// Build a registry holding exactly the defined jobs.
pub fn registry_from_definitions(
    definitions: &[JobDefinition],
) -> Result<JobRegistry, DefinitionError> {
    let mut builtins = JobRegistry::new();
    register_builtin_jobs(&mut builtins);

    let mut registry = JobRegistry::new();
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(def.name.as_str()) {
            return Err(DefinitionError::Duplicate(def.name.clone()));
        }
        if !registry.import(def.name.clone(), &builtins, &def.kind) {
            return Err(DefinitionError::UnknownKind {
                name: def.name.clone(),
                kind: def.kind.clone(),
            });
        }
    }
    Ok(registry)
}
