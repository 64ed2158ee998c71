//! # Dependency Resolver
//!
//! Turns a set of partially ordered [`Deployable`] nodes into one total order.
//!
//! Placement works in deploy order. The first node takes position 0 and the
//! last node the final position. Every other node is placed immediately before
//! its earliest already-placed successor, recursively placing successors that
//! have not been placed yet, or at the current end when it has no successors.
//! Nodes currently being placed are tracked so that revisiting one reports a
//! cycle. Nothing is committed unless the whole rebuild succeeds.

use super::Deployable;
use crate::error::{EngineError, EngineResult};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Ordered set of deployables with a committed, resolved chain
pub struct DeployableChain<T: ?Sized> {
    /// Deploy order, used as the placement order
    order: Vec<String>,
    nodes: HashMap<String, Deployable<T>>,
    /// Edges `a -> {b, ..}` meaning "a comes before b"
    edges: HashMap<String, BTreeSet<String>>,
    first: Option<String>,
    last: Option<String>,
    committed: Option<Vec<(String, Arc<T>)>>,
}

impl<T: ?Sized> Default for DeployableChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> DeployableChain<T> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            first: None,
            last: None,
            committed: None,
        }
    }

    /// Register a node, merging with a previous deployment of the same name.
    pub fn deploy(&mut self, mut deployable: Deployable<T>) -> EngineResult<()> {
        let name = deployable.name().to_string();

        if deployable.is_first() && !deployable.predecessors().is_empty() {
            return Err(EngineError::configuration(
                name.as_str(),
                "a node claiming first position cannot have predecessors",
            ));
        }
        if deployable.is_last() && !deployable.successors().is_empty() {
            return Err(EngineError::configuration(
                name.as_str(),
                "a node claiming last position cannot have successors",
            ));
        }

        if let Some(existing) = self.nodes.get(&name) {
            if existing.is_first() != deployable.is_first()
                || existing.is_last() != deployable.is_last()
            {
                return Err(EngineError::configuration(
                    name.as_str(),
                    "redeployed with different first/last flags",
                ));
            }
            if let (Some(current), Some(incoming)) = (existing.target(), deployable.target()) {
                if !Arc::ptr_eq(current, incoming) {
                    return Err(EngineError::configuration(
                        name.as_str(),
                        "redeployed with a different target",
                    ));
                }
            }
        } else {
            self.claim_slot(&deployable)?;
        }

        for predecessor in deployable.predecessors() {
            self.add_relationship(predecessor.clone(), name.clone());
        }
        for successor in deployable.successors() {
            self.add_relationship(name.clone(), successor.clone());
        }

        match self.nodes.get_mut(&name) {
            Some(existing) => {
                if existing.target().is_none() {
                    if let Some(target) = deployable.take_target() {
                        existing.set_target(target);
                    }
                }
            }
            None => {
                self.order.push(name.clone());
                self.nodes.insert(name, deployable);
            }
        }

        Ok(())
    }

    fn claim_slot(&mut self, deployable: &Deployable<T>) -> EngineResult<()> {
        let name = deployable.name();
        if deployable.is_first() {
            if let Some(holder) = &self.first {
                return Err(EngineError::configuration(
                    name,
                    format!("first position already claimed by '{holder}'"),
                ));
            }
            self.first = Some(name.to_string());
        }
        if deployable.is_last() {
            if let Some(holder) = &self.last {
                if deployable.is_first() {
                    self.first = None;
                }
                return Err(EngineError::configuration(
                    name,
                    format!("last position already claimed by '{holder}'"),
                ));
            }
            self.last = Some(name.to_string());
        }
        Ok(())
    }

    /// Record that `before` must precede `after` without deploying either.
    pub fn add_relationship(&mut self, before: impl Into<String>, after: impl Into<String>) {
        self.edges
            .entry(before.into())
            .or_default()
            .insert(after.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Targets of the last successful rebuild, if any
    pub fn committed(&self) -> Option<Vec<Arc<T>>> {
        self.committed
            .as_ref()
            .map(|chain| chain.iter().map(|(_, target)| Arc::clone(target)).collect())
    }

    /// Names of the last successful rebuild, if any
    pub fn committed_names(&self) -> Option<Vec<String>> {
        self.committed
            .as_ref()
            .map(|chain| chain.iter().map(|(name, _)| name.clone()).collect())
    }

    /// Resolve the total order. A failure discards any previously committed chain.
    pub fn rebuild(&mut self) -> EngineResult<Vec<Arc<T>>> {
        self.committed = None;

        let names = self.resolve_order()?;
        let mut chain = Vec::with_capacity(names.len());
        for name in names {
            let target = self
                .nodes
                .get(&name)
                .and_then(|node| node.target().cloned())
                .ok_or_else(|| {
                    EngineError::configuration(name.as_str(), "deployed without a target")
                })?;
            chain.push((name, target));
        }

        debug!(
            nodes = chain.len(),
            order = ?chain.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "Deployable chain rebuilt"
        );

        let targets = chain.iter().map(|(_, target)| Arc::clone(target)).collect();
        self.committed = Some(chain);
        Ok(targets)
    }

    fn resolve_order(&self) -> EngineResult<Vec<String>> {
        for (from, targets) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(EngineError::configuration(
                    from.as_str(),
                    "referenced in an ordering constraint but never deployed",
                ));
            }
            for to in targets {
                if !self.nodes.contains_key(to) {
                    return Err(EngineError::configuration(
                        to.as_str(),
                        "referenced in an ordering constraint but never deployed",
                    ));
                }
            }
        }

        if let Some(last) = &self.last {
            if self.edges.get(last).is_some_and(|set| !set.is_empty()) {
                return Err(EngineError::configuration(
                    last.as_str(),
                    "the last node cannot precede other nodes",
                ));
            }
            if self.first.as_ref() == Some(last) && self.nodes.len() > 1 {
                return Err(EngineError::configuration(
                    last.as_str(),
                    "a node claiming both first and last must be alone",
                ));
            }
        }

        let mut placement = Placement {
            edges: &self.edges,
            first: self.first.as_deref(),
            last: self.last.as_deref(),
            middle: Vec::new(),
            placed: HashSet::new(),
            visiting: HashSet::new(),
        };

        for name in &self.order {
            if Some(name.as_str()) == placement.first || Some(name.as_str()) == placement.last {
                continue;
            }
            placement.place(name)?;
        }

        let mut ordered = Vec::with_capacity(self.nodes.len());
        if let Some(first) = &self.first {
            ordered.push(first.clone());
        }
        ordered.extend(placement.middle);
        if let Some(last) = &self.last {
            if self.first.as_ref() != Some(last) {
                ordered.push(last.clone());
            }
        }
        Ok(ordered)
    }
}

struct Placement<'a> {
    edges: &'a HashMap<String, BTreeSet<String>>,
    first: Option<&'a str>,
    last: Option<&'a str>,
    middle: Vec<String>,
    placed: HashSet<String>,
    visiting: HashSet<String>,
}

impl Placement<'_> {
    fn place(&mut self, name: &str) -> EngineResult<()> {
        if self.placed.contains(name) {
            return Ok(());
        }
        if !self.visiting.insert(name.to_string()) {
            return Err(EngineError::configuration(
                name,
                "dependency cycle detected while ordering",
            ));
        }

        let successors = self.edges.get(name);
        if let Some(successors) = successors {
            for successor in successors {
                if Some(successor.as_str()) == self.first {
                    return Err(EngineError::configuration(
                        name,
                        format!("cannot precede first node '{successor}'"),
                    ));
                }
                if Some(successor.as_str()) == self.last {
                    continue;
                }
                self.place(successor)?;
            }
        }

        let position = successors
            .into_iter()
            .flatten()
            .filter_map(|successor| self.middle.iter().position(|placed| placed == successor))
            .min()
            .unwrap_or(self.middle.len());

        self.middle.insert(position, name.to_string());
        self.visiting.remove(name);
        self.placed.insert(name.to_string());
        Ok(())
    }
}
