//! Deferred dependency references.
//!
//! A resolved node can go stale the moment its manifest changes. Anything
//! that outlives a single render holds a [`DependencySupplier`] instead and
//! calls [`get`](DependencySupplier::get) when it actually needs the node.

use std::fmt;
use std::sync::Arc;

use crate::node::{DependencyNode, ExternalDependency};
use crate::resolver::Resolver;
use crate::specifier::DependencySpecifier;

/// A reference that resolves through the cache on every call.
#[derive(Clone)]
pub enum DependencySupplier {
    /// Re-resolved on each [`get`](DependencySupplier::get)
    Deferred {
        /// Resolver to go through
        resolver: Resolver,
        /// What to resolve
        spec: DependencySpecifier,
    },
    /// A node that can never go stale
    Constant(Arc<DependencyNode>),
}

impl DependencySupplier {
    /// Deferred reference to `spec`; externals become constants.
    pub fn new(resolver: Resolver, spec: DependencySpecifier) -> Self {
        if spec.is_external() {
            return Self::Constant(Arc::new(DependencyNode::External(
                ExternalDependency::from_specifier(&spec),
            )));
        }
        Self::Deferred {
            resolver,
            spec,
        }
    }

    /// Current node, `None` when the dependency does not resolve.
    pub fn get(&self) -> Option<Arc<DependencyNode>> {
        match self {
            Self::Deferred {
                resolver,
                spec,
            } => resolver.resolve(spec),
            Self::Constant(node) => Some(node.clone()),
        }
    }
}

impl fmt::Debug for DependencySupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deferred {
                spec,
                ..
            } => f.debug_tuple("Deferred").field(spec).finish(),
            Self::Constant(node) => f.debug_tuple("Constant").field(node).finish(),
        }
    }
}
