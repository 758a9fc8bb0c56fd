//! Cache configuration and the shared state built from it.
//!
//! [`CacheConfig`] is what callers construct. [`CacheContext`] wraps it with
//! the operation memo: every distinct (document, fragment, root, variables)
//! combination is parsed once and handed out as the same
//! [`OperationInstance`], whose [`OperationId`] keys per-snapshot read caches.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::trace;

use crate::cache_snapshot::CacheSnapshot;
use crate::error::{QueryError, Result};
use crate::query::{are_children_dynamic, expand_variables, Document, ParsedQuery, QueryInfo};
use crate::schema::{NodeId, NodeIdSet, StaticNodeId};
use crate::tracer::{LoggingTracer, Tracer};
use crate::transaction::CacheTransaction;
use crate::value::{ObjectMap, Value};

/// Variable values keyed by name.
pub type Variables = JsonMap<String, JsonValue>;

/// Extracts an identity from an entity-shaped object. Strings are used as is
/// and numbers are stringified; anything else means "not an entity".
pub type EntityIdFn = Arc<dyn Fn(&ObjectMap) -> Option<Value> + Send + Sync>;

/// Applied to entity data as it enters a snapshot and to read copies of it.
/// Expected to be idempotent.
pub type EntityTransformer = Arc<dyn Fn(&mut ObjectMap) + Send + Sync>;

/// Maps the arguments of an unresolved parameterized field to another node.
pub type ResolverRedirect = Arc<dyn Fn(&JsonValue) -> Option<NodeId> + Send + Sync>;

/// typename -> field -> redirect.
pub type ResolverRedirects = HashMap<String, HashMap<String, ResolverRedirect>>;

/// Called at transaction commit with the next and previous data of every
/// edited entity of the updater's type.
pub type EntityUpdater = Arc<
    dyn Fn(&mut CacheTransaction, Option<&Value>, Option<&Value>) -> Result<()> + Send + Sync,
>;

/// Called after the cache publishes a new snapshot, with the edited node ids.
pub type ChangeCallback = Arc<dyn Fn(&CacheSnapshot, &NodeIdSet) + Send + Sync>;

/// In-process cache configuration.
#[derive(Clone)]
pub struct CacheConfig {
    pub(crate) entity_id: Option<EntityIdFn>,
    pub(crate) entity_transformer: Option<EntityTransformer>,
    pub(crate) strict: bool,
    pub(crate) verify_snapshots: bool,
    pub(crate) verbose: bool,
    pub(crate) resolver_redirects: ResolverRedirects,
    pub(crate) entity_updaters: HashMap<String, EntityUpdater>,
    pub(crate) on_change: Option<ChangeCallback>,
    pub(crate) tracer: Option<Arc<dyn Tracer>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity_id: None,
            entity_transformer: None,
            strict: true,
            verify_snapshots: false,
            verbose: false,
            resolver_redirects: HashMap::new(),
            entity_updaters: HashMap::new(),
            on_change: None,
            tracer: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how entity identities are extracted.
    pub fn entity_id(
        mut self,
        mapper: impl Fn(&ObjectMap) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.entity_id = Some(Arc::new(mapper));
        self
    }

    pub fn entity_transformer(
        mut self,
        transformer: impl Fn(&mut ObjectMap) + Send + Sync + 'static,
    ) -> Self {
        self.entity_transformer = Some(Arc::new(transformer));
        self
    }

    /// Strict mode tracks the nodes each read depends on, so cached reads
    /// survive unrelated writes. Non-strict mode only carries completeness
    /// forward.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Check reference symmetry of every committed snapshot.
    pub fn verify_snapshots(mut self, verify: bool) -> Self {
        self.verify_snapshots = verify;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn resolver_redirect(
        mut self,
        typename: impl Into<String>,
        field: impl Into<String>,
        redirect: impl Fn(&JsonValue) -> Option<NodeId> + Send + Sync + 'static,
    ) -> Self {
        self.resolver_redirects
            .entry(typename.into())
            .or_default()
            .insert(field.into(), Arc::new(redirect));
        self
    }

    pub fn entity_updater(
        mut self,
        typename: impl Into<String>,
        updater: impl Fn(&mut CacheTransaction, Option<&Value>, Option<&Value>) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.entity_updaters
            .insert(typename.into(), Arc::new(updater));
        self
    }

    pub fn on_change(
        mut self,
        callback: impl Fn(&CacheSnapshot, &NodeIdSet) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Arc::new(callback));
        self
    }

    pub fn tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Some(Arc::new(tracer));
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut redirects: Vec<_> = self
            .resolver_redirects
            .iter()
            .flat_map(|(typename, fields)| {
                fields.keys().map(move |field| format!("{}.{}", typename, field))
            })
            .collect();
        redirects.sort();
        let mut updaters: Vec<_> = self.entity_updaters.keys().collect();
        updaters.sort();

        f.debug_struct("CacheConfig")
            .field("custom_entity_id", &self.entity_id.is_some())
            .field("entity_transformer", &self.entity_transformer.is_some())
            .field("strict", &self.strict)
            .field("verify_snapshots", &self.verify_snapshots)
            .field("verbose", &self.verbose)
            .field("resolver_redirects", &redirects)
            .field("entity_updaters", &updaters)
            .field("on_change", &self.on_change.is_some())
            .field("custom_tracer", &self.tracer.is_some())
            .finish()
    }
}

/// Identity of a memoized operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

/// An operation as supplied by a caller: a document, where to root it, and
/// the variables to bind.
#[derive(Debug, Clone)]
pub struct RawOperation {
    pub document: Arc<Document>,
    pub root_id: NodeId,
    pub variables: Option<Variables>,
    /// Root the selection of this fragment instead of the document's
    /// operation.
    pub fragment_name: Option<String>,
}

impl RawOperation {
    /// The document's operation, rooted at the root node of its type.
    pub fn new(document: Arc<Document>) -> Self {
        let root_id = crate::query::info::operation_or_die(&document)
            .map(|operation| operation.operation_type.root_id())
            .unwrap_or(StaticNodeId::QUERY_ROOT);
        Self {
            document,
            root_id: root_id.to_string(),
            variables: None,
            fragment_name: None,
        }
    }

    /// Parses `source` and wraps its operation.
    pub fn parse(source: &str) -> std::result::Result<Self, QueryError> {
        Ok(Self::new(Arc::new(Document::parse(source)?)))
    }

    /// A named fragment of `document`, rooted at `root_id`.
    pub fn fragment(
        document: Arc<Document>,
        fragment_name: impl Into<String>,
        root_id: impl Into<NodeId>,
    ) -> Self {
        Self {
            document,
            root_id: root_id.into(),
            variables: None,
            fragment_name: Some(fragment_name.into()),
        }
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_root_id(mut self, root_id: impl Into<NodeId>) -> Self {
        self.root_id = root_id.into();
        self
    }
}

/// A parsed operation with its variables bound.
#[derive(Debug)]
pub struct OperationInstance {
    pub id: OperationId,
    pub info: Arc<QueryInfo>,
    pub root_id: NodeId,
    pub parsed_query: ParsedQuery,
    /// No field in the tree is aliased or parameterized.
    pub is_static: bool,
    pub variables: Option<Variables>,
}

impl OperationInstance {
    /// `type name` label for log output.
    pub fn describe(&self) -> String {
        let name = self
            .info
            .fragment_name
            .as_deref()
            .or(self.info.operation_name.as_deref())
            .unwrap_or("<anonymous>");
        format!("{} {}", self.info.operation_type.as_str(), name)
    }
}

/// Configuration plus the memoized operations of one cache.
pub struct CacheContext {
    config: CacheConfig,
    tracer: Arc<dyn Tracer>,
    infos: Mutex<HashMap<String, Arc<QueryInfo>>>,
    operations: Mutex<HashMap<String, Vec<Arc<OperationInstance>>>>,
    next_operation_id: AtomicU64,
}

impl CacheContext {
    pub fn new(config: CacheConfig) -> Self {
        let tracer = config
            .tracer
            .clone()
            .unwrap_or_else(|| Arc::new(LoggingTracer::new(config.verbose)));
        Self {
            config,
            tracer,
            infos: Mutex::default(),
            operations: Mutex::default(),
            next_operation_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn tracer(&self) -> &dyn Tracer {
        self.tracer.as_ref()
    }

    pub fn strict(&self) -> bool {
        self.config.strict
    }

    pub fn entity_transformer(&self) -> Option<&EntityTransformer> {
        self.config.entity_transformer.as_ref()
    }

    pub fn resolver_redirect(&self, typename: &str, field: &str) -> Option<&ResolverRedirect> {
        self.config
            .resolver_redirects
            .get(typename)
            .and_then(|fields| fields.get(field))
    }

    pub fn entity_updater(&self, typename: &str) -> Option<&EntityUpdater> {
        self.config.entity_updaters.get(typename)
    }

    pub fn has_entity_updaters(&self) -> bool {
        !self.config.entity_updaters.is_empty()
    }

    /// Identity of `value`, if it is an entity.
    pub fn entity_id_for_value(&self, value: &Value) -> Option<NodeId> {
        let map = value.as_object()?;
        let id = match &self.config.entity_id {
            Some(mapper) => mapper(map),
            None => map.get("id").cloned(),
        };
        match id? {
            Value::String(id) => Some(id),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Returns the memoized instance for `raw`, parsing it on first use.
    pub fn parse_operation(&self, raw: &RawOperation) -> Result<Arc<OperationInstance>> {
        let cache_key = operation_cache_key(&raw.document, raw.fragment_name.as_deref());

        if let Some(instances) = self.operations.lock().get(&cache_key) {
            if let Some(instance) = instances
                .iter()
                .find(|instance| instance.root_id == raw.root_id && instance.variables == raw.variables)
            {
                return Ok(instance.clone());
            }
        }

        let info = self.query_info(&cache_key, raw)?;
        let mut variables = info.variable_defaults.clone();
        if let Some(supplied) = &raw.variables {
            variables.extend(supplied.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let instance = Arc::new(OperationInstance {
            id: OperationId(self.next_operation_id.fetch_add(1, Ordering::Relaxed)),
            parsed_query: expand_variables(&info.parsed, &variables)?,
            is_static: !are_children_dynamic(Some(&info.parsed)),
            root_id: raw.root_id.clone(),
            variables: raw.variables.clone(),
            info,
        });
        trace!(
            operation = %instance.describe(),
            root_id = %instance.root_id,
            is_static = instance.is_static,
            "Parsed operation"
        );

        self.operations
            .lock()
            .entry(cache_key)
            .or_default()
            .push(instance.clone());
        Ok(instance)
    }

    fn query_info(&self, cache_key: &str, raw: &RawOperation) -> Result<Arc<QueryInfo>> {
        if let Some(info) = self.infos.lock().get(cache_key) {
            return Ok(info.clone());
        }
        let info = Arc::new(QueryInfo::new(
            raw.document.clone(),
            raw.fragment_name.as_deref(),
        )?);
        self.infos
            .lock()
            .insert(cache_key.to_string(), info.clone());
        Ok(info)
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("config", &self.config)
            .field("operations", &self.operations.lock().len())
            .finish()
    }
}

fn operation_cache_key(document: &Document, fragment_name: Option<&str>) -> String {
    match fragment_name {
        Some(name) => format!("{}❖{}", name, document.source),
        None => document.source.clone(),
    }
}
