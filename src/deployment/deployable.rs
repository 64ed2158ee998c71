//! Configuration-time ordering node.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A named node carrying ordering constraints and the payload being ordered.
///
/// The payload is a handler when resolving a phase, or a phase when resolving
/// a flow. A node without a target can still be deployed (its constraints are
/// merged) but must receive one before the chain is rebuilt.
pub struct Deployable<T: ?Sized> {
    name: String,
    predecessors: BTreeSet<String>,
    successors: BTreeSet<String>,
    first: bool,
    last: bool,
    target: Option<Arc<T>>,
}

impl<T: ?Sized> Deployable<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predecessors: BTreeSet::new(),
            successors: BTreeSet::new(),
            first: false,
            last: false,
            target: None,
        }
    }

    /// Create a node that already carries its payload
    pub fn with_target(name: impl Into<String>, target: Arc<T>) -> Self {
        let mut deployable = Self::new(name);
        deployable.target = Some(target);
        deployable
    }

    /// This node must come after `name`
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.predecessors.insert(name.into());
        self
    }

    /// This node must come before `name`
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.successors.insert(name.into());
        self
    }

    pub fn first(mut self) -> Self {
        self.first = true;
        self
    }

    pub fn last(mut self) -> Self {
        self.last = true;
        self
    }

    pub fn set_target(&mut self, target: Arc<T>) {
        self.target = Some(target);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predecessors(&self) -> &BTreeSet<String> {
        &self.predecessors
    }

    pub fn successors(&self) -> &BTreeSet<String> {
        &self.successors
    }

    pub fn is_first(&self) -> bool {
        self.first
    }

    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn target(&self) -> Option<&Arc<T>> {
        self.target.as_ref()
    }

    pub(crate) fn take_target(&mut self) -> Option<Arc<T>> {
        self.target.take()
    }
}

impl<T: ?Sized> Clone for Deployable<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predecessors: self.predecessors.clone(),
            successors: self.successors.clone(),
            first: self.first,
            last: self.last,
            target: self.target.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Deployable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployable")
            .field("name", &self.name)
            .field("predecessors", &self.predecessors)
            .field("successors", &self.successors)
            .field("first", &self.first)
            .field("last", &self.last)
            .field("has_target", &self.target.is_some())
            .finish()
    }
}
