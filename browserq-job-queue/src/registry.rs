//! Mapping from job names to the factories that build them.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::executor::{JobError, JobExecutor, JobFactory};
use crate::types::JobInput;

/// Registry of executable jobs, built once at startup and handed to workers.
#[derive(Clone, Default)]
pub struct JobRegistry {
    factories: HashMap<String, Arc<dyn JobFactory>>,
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.names())
            .finish()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: JobFactory + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register a job whose input deserializes straight into the executor.
    pub fn register_typed<T>(&mut self, name: impl Into<String>) -> &mut Self
    where
        T: JobExecutor + DeserializeOwned + 'static,
    {
        self.register(name, DeserializeFactory::<T>(PhantomData))
    }

    /// Register the same factory another name already resolves to.
    ///
    /// Returns `false` when `target` is not registered.
    pub fn alias(&mut self, name: impl Into<String>, target: &str) -> bool {
        let source = self.clone();
        self.import(name, &source, target)
    }

    /// Register under `name` the factory `source` holds for `kind`.
    ///
    /// Returns `false` when `source` has no such entry.
    pub fn import(&mut self, name: impl Into<String>, source: &JobRegistry, kind: &str) -> bool {
        match source.factories.get(kind).cloned() {
            Some(factory) => {
                self.factories.insert(name.into(), factory);
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn JobFactory> {
        self.factories.get(name).map(|f| f.as_ref())
    }

    /// Look up `name` and build an executor from `input`.
    pub fn build(&self, name: &str, input: &JobInput) -> Result<Box<dyn JobExecutor>, JobError> {
        self.lookup(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_owned()))?
            .build(input)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

struct DeserializeFactory<T>(PhantomData<fn() -> T>);

impl<T> JobFactory for DeserializeFactory<T>
where
    T: JobExecutor + DeserializeOwned + 'static,
{
    fn build(&self, input: &JobInput) -> Result<Box<dyn JobExecutor>, JobError> {
        let job: T = serde_json::from_value(Value::Object(input.clone()))
            .map_err(|e| JobError::InvalidInput(e.to_string()))?;
        Ok(Box::new(job))
    }
}
