//! Registry of derived-metric registrations.
//!
//! The registry owns one static AST per registration, keyed by name and by
//! a synthesised derived id. All public operations serialise on a single
//! mutex; configuration loading re-enters registration logic below the
//! lock, so a loaded file may itself trigger further registrations without
//! deadlocking (see [`crate::config`]).
//!
//! Opening a context binds every registration against the host's
//! [`MetricSource`] and yields a [`ContextBindings`] owned by the caller.
//! A registration that fails to resolve or check in one context is
//! disabled there (and hidden from traversal) without affecting other
//! contexts or other registrations.

use crate::ast::Expr;
use crate::error::{self, DeriveError};
use crate::parser;
use crate::resolve::{self, BoundExpr, MetricSource};
use indexmap::IndexMap;
use metra_types::{Descriptor, MetricId, MetricName, ValueType};
use std::sync::{Mutex, MutexGuard, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};

/// One registration: name, synthesised id, and the static AST.
pub(crate) struct RegEntry {
    pub(crate) name: MetricName,
    pub(crate) id: MetricId,
    pub(crate) anonymous: bool,
    pub(crate) root: Expr,
    /// Registered expression text, kept for error reports
    pub(crate) source: String,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    entries: IndexMap<MetricName, RegEntry>,
}

impl RegistryInner {
    /// Validate, parse and append one registration.
    ///
    /// Ids are dense: item = 1-based registration index, flagged derived.
    pub(crate) fn register(
        &mut self,
        name: &str,
        expr: &str,
        anonymous: bool,
    ) -> Result<MetricId, DeriveError> {
        error::clear_last_error();

        let name = MetricName::new(name).map_err(|e| {
            error::set_last_error(&e.to_string());
            DeriveError::from(e)
        })?;
        if self.entries.contains_key(name.as_str()) {
            error::set_last_error("Duplicate derived metric name");
            return Err(DeriveError::DuplicateName);
        }

        let root = parser::parse(expr).map_err(|e| {
            error::set_last_error(&e.diagnostic);
            DeriveError::Parse(e)
        })?;

        let id = MetricId::derived(self.entries.len());
        debug!(name = %name, %id, anonymous, "registered derived metric");
        self.entries.insert(
            name.clone(),
            RegEntry {
                name,
                id,
                anonymous,
                root,
                source: expr.to_string(),
            },
        );
        Ok(id)
    }
}

/// Thread-safe store of derived-metric registrations.
pub struct MetricRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        MetricRegistry::new()
    }
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> MetricRegistry {
        MetricRegistry {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// The process-wide registry most hosts share.
    pub fn global() -> &'static MetricRegistry {
        static GLOBAL: OnceLock<MetricRegistry> = OnceLock::new();
        GLOBAL.get_or_init(MetricRegistry::new)
    }

    /// Serialise on the registry lock, recovering from poisoning.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `name = expr`.
    ///
    /// On failure, [`DeriveError::position`] is the byte offset into `expr`
    /// to report (0 for a duplicate name), and the diagnostic is also left
    /// in the thread-local channel for [`error::last_error`].
    pub fn register(&self, name: &str, expr: &str) -> Result<MetricId, DeriveError> {
        self.lock().register(name, expr, false)
    }

    /// Register an anonymous metric of the given type, wrapping a
    /// synthesised `anon(...)` expression.
    pub fn register_anonymous(
        &self,
        name: &str,
        value_type: ValueType,
    ) -> Result<MetricId, DeriveError> {
        let expr = format!("anon(PM_TYPE_{})", value_type);
        self.lock().register(name, &expr, true)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the registry holds no registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a registered name to its derived id.
    pub fn lookup_id(&self, name: &str) -> Option<MetricId> {
        self.lock().entries.get(name).map(|e| e.id)
    }

    /// Resolve a derived id back to its registered name.
    pub fn lookup_name(&self, id: MetricId) -> Option<MetricName> {
        self.lock()
            .entries
            .values()
            .find(|e| e.id == id)
            .map(|e| e.name.clone())
    }

    /// Bind every registration for one context.
    ///
    /// Bindings are processed in registration order. The host oracles are
    /// invoked with the registry lock held. The returned bindings are
    /// exclusively owned by the caller's context; dropping them closes the
    /// context (static trees are untouched).
    pub fn open_context(&self, source: &dyn MetricSource) -> ContextBindings {
        error::clear_last_error();
        let inner = self.lock();
        let entries = inner
            .entries
            .values()
            .map(|entry| ContextEntry {
                name: entry.name.clone(),
                id: entry.id,
                anonymous: entry.anonymous,
                root: bind_entry(entry, source),
            })
            .collect();
        ContextBindings { entries }
    }
}

/// Bind one registration, or disable it for this context.
fn bind_entry(entry: &RegEntry, source: &dyn MetricSource) -> Option<BoundExpr> {
    // A derived name that resolves to a real host metric in this context
    // is silently disabled here; it stays registered and may bind in other
    // contexts. Anonymous registrations are exempt.
    if !entry.anonymous {
        if let Some(host_id) = source.lookup_name(entry.name.as_str()) {
            if !host_id.is_derived() {
                debug!(name = %entry.name, %host_id, "derived name clashes with host metric, disabled");
                return None;
            }
        }
    }

    match resolve::bind(&entry.root, source) {
        Ok(mut bound) => {
            bound.desc.id = Some(entry.id);
            Some(bound)
        }
        Err(err) => {
            error::set_last_error(&err.to_string());
            warn!(name = %entry.name, %err, "derived metric disabled for this context");
            debug!(
                "{}",
                error::format_report(entry.name.as_str(), &entry.source, 0, &err.to_string())
            );
            None
        }
    }
}

/// Metadata lookup failure against a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The id is not a registration known to this context
    #[error("metric not found")]
    NotFound,
    /// The registration exists but did not bind in this context
    #[error("metric disabled in this context")]
    Disabled,
}

/// One registration as seen by a context.
#[derive(Debug)]
pub struct ContextEntry {
    /// Registered name
    pub name: MetricName,
    /// Derived id
    pub id: MetricId,
    /// Registered through the anonymous path
    pub anonymous: bool,
    /// Bound tree, or `None` when disabled in this context
    pub root: Option<BoundExpr>,
}

/// Next-component entry reported by [`ContextBindings::children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    /// Name component directly below the prefix
    pub name: String,
    /// Whether that component is a leaf (no further components anywhere)
    pub leaf: bool,
}

/// Per-context bindings, parallel to the registry at open time.
///
/// Exclusively owned by its context; dropping it closes the context and
/// frees the bound trees.
#[derive(Debug, Default)]
pub struct ContextBindings {
    entries: Vec<ContextEntry>,
}

impl ContextBindings {
    /// All entries, in registration order (including disabled ones).
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Descriptor of a bound registration.
    pub fn descriptor(&self, id: MetricId) -> Result<Descriptor, LookupError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or(LookupError::NotFound)?;
        match &entry.root {
            Some(root) => Ok(root.desc),
            None => Err(LookupError::Disabled),
        }
    }

    /// Bound tree of a registration, for the evaluator.
    pub fn bound(&self, id: MetricId) -> Result<&BoundExpr, LookupError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or(LookupError::NotFound)?;
        entry.root.as_ref().ok_or(LookupError::Disabled)
    }

    /// Fully qualified names below `prefix`, which must match on a dot
    /// boundary (`""` matches everything). Disabled entries are invisible.
    pub fn traverse(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.root.is_some() && e.name.matches_prefix(prefix))
            .map(|e| e.name.to_string())
            .collect()
    }

    /// Unique next name components below `prefix`.
    ///
    /// If some entry *is* the prefix, the prefix is a leaf metric and the
    /// result is empty. Components are reported in registration order; a
    /// component is a non-leaf if any match continues past it.
    pub fn children(&self, prefix: &str) -> Vec<Child> {
        let mut out: IndexMap<String, bool> = IndexMap::new();
        for entry in self.entries.iter().filter(|e| e.root.is_some()) {
            if !entry.name.matches_prefix(prefix) {
                continue;
            }
            match entry.name.next_segment(prefix) {
                None => return Vec::new(), // exact match: the prefix is a leaf
                Some((segment, has_more)) => {
                    let leaf = out.entry(segment.to_string()).or_insert(!has_more);
                    *leaf = *leaf && !has_more;
                }
            }
        }
        out.into_iter()
            .map(|(name, leaf)| Child { name, leaf })
            .collect()
    }
}
