//! Dependency-ordered render registry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::request::Request;
use crate::response::Response;

use super::{PipelineError, Render, StopToken};

struct Entry {
    name: String,
    render: Arc<dyn Render>,
    dependencies: Vec<String>,
}

/// Named renders executed in dependency order.
///
/// Without dependencies renders run in registration order. The resolved
/// order is cached until the next [`add`](Self::add) or
/// [`remove`](Self::remove).
#[derive(Default)]
pub struct RenderPipeline {
    entries: Vec<Entry>,
    order: OnceCell<Vec<usize>>,
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field(
                "renders",
                &self
                    .entries
                    .iter()
                    .map(|entry| entry.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RenderPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `render`.
    ///
    /// `name` defaults to [`Render::name`]. Dependencies declared by the
    /// render itself take precedence over `dependencies`. Registering an
    /// existing name replaces that render without changing its position.
    pub fn add<R>(&mut self, render: R, name: Option<&str>, dependencies: &[&str]) -> &mut Self
    where
        R: Render + 'static,
    {
        let name = name.unwrap_or_else(|| render.name()).to_owned();
        let declared = render
            .dependencies()
            .unwrap_or_else(|| dependencies.iter().map(|dep| (*dep).to_owned()).collect());
        let mut dependencies = Vec::with_capacity(declared.len());
        for dependency in declared {
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }

        let entry = Entry {
            name,
            render: Arc::new(render),
            dependencies,
        };
        match self.entries.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.order.take();
        self
    }

    /// Removes the render registered under `name`, returning whether one was
    /// present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        let removed = self.entries.len() != before;
        if removed {
            self.order.take();
        }
        removed
    }

    /// Number of registered renders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no render is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates the dependency graph and caches the execution order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for cycles or unregistered dependencies.
    pub fn resolve(&self) -> Result<(), PipelineError> {
        self.order().map(|_| ())
    }

    /// Render names in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the order cannot be resolved.
    pub fn renders(&self) -> Result<Vec<&str>, PipelineError> {
        Ok(self
            .order()?
            .iter()
            .filter_map(|index| self.entries.get(*index))
            .map(|entry| entry.name.as_str())
            .collect())
    }

    /// Runs the renders for `request` and returns the final response.
    ///
    /// Each render sees the response accumulated so far. Iteration ends early
    /// after a render that stops the dispatch's [`StopToken`] or always stops
    /// propagation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the order cannot be resolved.
    pub fn dispatch(&self, request: &Request) -> Result<Option<Response>, PipelineError> {
        let mut response: Option<Response> = None;
        let stop = StopToken::new();
        for entry in self
            .order()?
            .iter()
            .filter_map(|index| self.entries.get(*index))
        {
            if let Some(next) = entry.render.render(request, response.as_mut(), &stop) {
                response = Some(next);
            }
            if stop.is_stopped() || entry.render.is_propagation_stopped() {
                break;
            }
        }
        Ok(response)
    }

    fn order(&self) -> Result<&[usize], PipelineError> {
        self.order
            .get_or_try_init(|| topological_order(&self.entries))
            .map(Vec::as_slice)
    }
}

/// Kahn's algorithm taking ready renders in registration order.
fn topological_order(entries: &[Entry]) -> Result<Vec<usize>, PipelineError> {
    let positions: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.name.as_str(), index))
        .collect();

    let mut pending = vec![0_usize; entries.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
    for (index, entry) in entries.iter().enumerate() {
        for dependency in &entry.dependencies {
            let Some(&position) = positions.get(dependency.as_str()) else {
                return Err(PipelineError::UnknownDependency {
                    render: entry.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            if let Some(list) = dependents.get_mut(position) {
                list.push(index);
            }
            if let Some(count) = pending.get_mut(index) {
                *count += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(index, _)| index)
        .collect();
    let mut order = Vec::with_capacity(entries.len());
    while let Some(index) = ready.pop_first() {
        order.push(index);
        for dependent in dependents.get(index).into_iter().flatten() {
            if let Some(count) = pending.get_mut(*dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() == entries.len() {
        Ok(order)
    } else {
        let names = entries
            .iter()
            .zip(&pending)
            .filter(|(_, count)| **count > 0)
            .map(|(entry, _)| entry.name.clone())
            .collect();
        Err(PipelineError::Cycle { names })
    }
}
