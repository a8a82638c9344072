//! TypedStore: schema-validating decorator over any store
//!
//! A [`SchemaRegistry`] maps `<bucket><sep><key>` onto a schema name with
//! ordered, fully anchored regular expressions; the first match wins. A
//! [`TypeChecker`] validates a body against a named schema.
//!
//! - Writes under a bound schema are validated first; a violation is
//!   returned as [`StowError::InvalidSchema`] and the inner store is not
//!   touched.
//! - Writes with no bound schema go through unvalidated, with a warning.
//! - Reads are validated only when `verify_read` is set.
//!
//! Everything else is forwarded to the inner store unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonschema::JSONSchema;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stow_core::{Store, StowError, StowResult};
use tracing::{info, warn};

/// Validates a body against a named schema
pub trait TypeChecker: Send + Sync {
    /// Parsed body if it conforms, otherwise a description of the mismatch
    fn validate(&self, schema: &str, body: &str) -> Result<Value, String>;
}

impl<F> TypeChecker for F
where
    F: Fn(&str, &str) -> Result<Value, String> + Send + Sync,
{
    fn validate(&self, schema: &str, body: &str) -> Result<Value, String> {
        self(schema, body)
    }
}

/// Directory of JSON Schema documents, compiled on first use
///
/// Schema names are paths relative to the directory, e.g. `User.json`.
pub struct SchemaDirectory {
    root: PathBuf,
    compiled: RwLock<HashMap<String, Arc<JSONSchema>>>,
}

impl std::fmt::Debug for SchemaDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDirectory")
            .field("root", &self.root)
            .field("compiled", &self.compiled.read().len())
            .finish()
    }
}

impl SchemaDirectory {
    /// Schemas under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Directory schemas are loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load(&self, schema: &str) -> Result<Arc<JSONSchema>, String> {
        if let Some(found) = self.compiled.read().get(schema) {
            return Ok(Arc::clone(found));
        }
        let path = self.root.join(schema);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read schema '{}': {}", path.display(), e))?;
        let document: Value = serde_json::from_str(&text)
            .map_err(|e| format!("schema '{}' is not JSON: {}", schema, e))?;
        let compiled = JSONSchema::compile(&document)
            .map_err(|e| format!("schema '{}' does not compile: {}", schema, e))?;
        let compiled = Arc::new(compiled);
        self.compiled
            .write()
            .insert(schema.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }
}

impl TypeChecker for SchemaDirectory {
    fn validate(&self, schema: &str, body: &str) -> Result<Value, String> {
        let compiled = self.load(schema)?;
        let instance: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
        let outcome = match compiled.validate(&instance) {
            Ok(()) => Ok(()),
            Err(errors) => Err(errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")),
        };
        outcome.map(|()| instance)
    }
}

/// One pattern-to-schema binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    /// Regular expression over `<bucket><sep><key>`, matched in full
    pub pattern: String,
    /// Schema name handed to the checker
    pub schema: String,
}

/// `[typed]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedConfig {
    /// Separator placed between bucket and key before matching
    #[serde(default = "default_sep")]
    pub sep: String,
    /// Validate reads as well as writes
    #[serde(default)]
    pub read: bool,
    /// Directory holding the schema documents
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
    /// Ordered bindings; the first match wins
    #[serde(default)]
    pub paths: Vec<PathRule>,
}

fn default_sep() -> String {
    "/".to_string()
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("./schemas")
}

impl Default for TypedConfig {
    fn default() -> Self {
        Self {
            sep: default_sep(),
            read: false,
            schema_dir: default_schema_dir(),
            paths: Vec::new(),
        }
    }
}

/// Ordered regex-to-schema rules
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    rules: Vec<(Regex, String)>,
    separator: String,
}

impl SchemaRegistry {
    /// Compile `(pattern, schema)` rules; each pattern must match in full
    ///
    /// # Errors
    ///
    /// `InvalidPattern` for the first pattern that is not a valid regex.
    pub fn new<I, P, S>(rules: I, separator: impl Into<String>) -> StowResult<Self>
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<str>,
        S: Into<String>,
    {
        let compiled = rules
            .into_iter()
            .map(|(pattern, schema)| {
                let pattern = pattern.as_ref();
                let schema: String = schema.into();
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                    StowError::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                info!(target: "stow::typed", pattern, schema = %schema, "Bound schema");
                Ok((regex, schema))
            })
            .collect::<StowResult<Vec<_>>>()?;
        Ok(Self {
            rules: compiled,
            separator: separator.into(),
        })
    }

    /// Registry described by a `[typed]` section
    pub fn from_config(config: &TypedConfig) -> StowResult<Self> {
        Self::new(
            config.paths.iter().map(|r| (r.pattern.as_str(), r.schema.as_str())),
            config.sep.as_str(),
        )
    }

    /// Separator between bucket and key
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// String the patterns are matched against
    pub fn access_path(&self, bucket: &str, key: &str) -> String {
        format!("{}{}{}", bucket, self.separator, key)
    }

    /// Schema bound to a key, first match wins
    pub fn schema(&self, bucket: &str, key: &str) -> Option<&str> {
        let path = self.access_path(bucket, key);
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(&path))
            .map(|(_, schema)| schema.as_str())
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rule is bound
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Store decorator enforcing schemas on access
#[derive(Debug)]
pub struct TypedStore<S, C> {
    inner: S,
    registry: SchemaRegistry,
    checker: C,
    verify_read: bool,
}

impl<S: Store, C: TypeChecker> TypedStore<S, C> {
    /// Wrap `inner`
    pub fn new(inner: S, registry: SchemaRegistry, checker: C, verify_read: bool) -> Self {
        Self {
            inner,
            registry,
            checker,
            verify_read,
        }
    }

    /// Wrap `inner` as described by a `[typed]` section
    pub fn from_config(inner: S, config: &TypedConfig, checker: C) -> StowResult<Self> {
        let registry = SchemaRegistry::from_config(config)?;
        info!(target: "stow::typed", rules = registry.len(), verify_read = config.read, separator = %config.sep, "Typed store ready");
        Ok(Self::new(inner, registry, checker, config.read))
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Pattern registry
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Whether reads are validated
    pub fn verify_read(&self) -> bool {
        self.verify_read
    }

    /// Read without schema verification, whatever `verify_read` says
    pub fn read_unverified(&self, bucket: &str, key: &str) -> StowResult<Option<S::Item>> {
        self.inner.read(bucket, key)
    }

    /// Validate `body` if a schema is bound to the key
    fn check(&self, access: &str, bucket: &str, key: &str, body: Result<&str, String>) -> StowResult<()> {
        let Some(schema) = self.registry.schema(bucket, key) else {
            warn!(
                target: "stow::typed",
                access,
                path = %self.registry.access_path(bucket, key),
                "No schema attached with access pattern"
            );
            return Ok(());
        };
        let violation =
            |reason: String| StowError::invalid_schema(schema, self.registry.access_path(bucket, key), reason);
        let body = body.map_err(violation)?;
        self.checker.validate(schema, body).map_err(violation)?;
        Ok(())
    }
}

impl<S: Store, C: TypeChecker> Store for TypedStore<S, C> {
    type Item = S::Item;

    fn write_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> StowResult<bool> {
        let body = std::str::from_utf8(data).map_err(|e| format!("body is not UTF-8: {}", e));
        self.check("write", bucket, key, body)?;
        self.inner.write_bytes(bucket, key, data)
    }

    fn write_text(&self, bucket: &str, key: &str, data: &str) -> StowResult<bool> {
        self.check("write", bucket, key, Ok(data))?;
        self.inner.write_text(bucket, key, data)
    }

    fn exists(&self, bucket: &str, key: &str) -> bool {
        self.inner.exists(bucket, key)
    }

    fn read(&self, bucket: &str, key: &str) -> StowResult<Option<S::Item>> {
        let item = self.inner.read(bucket, key)?;
        if self.verify_read {
            if let Some(found) = &item {
                let body = self.inner.decode_text(found);
                self.check("read", bucket, key, Ok(body.as_str()))?;
            }
        }
        Ok(item)
    }

    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> Box<dyn Iterator<Item = S::Item> + 'a> {
        self.inner.list(bucket, prefix)
    }

    fn create_bucket(&self, bucket: &str, location: &str, prevent_public_access: bool) -> bool {
        self.inner.create_bucket(bucket, location, prevent_public_access)
    }

    fn delete_bucket(&self, bucket: &str) -> bool {
        self.inner.delete_bucket(bucket)
    }

    fn delete(&self, bucket: &str, key: &str) -> bool {
        self.inner.delete(bucket, key)
    }

    fn key_of(&self, item: &S::Item) -> String {
        self.inner.key_of(item)
    }

    fn decode_bytes(&self, item: &S::Item) -> Vec<u8> {
        self.inner.decode_bytes(item)
    }

    fn decode_text(&self, item: &S::Item) -> String {
        self.inner.decode_text(item)
    }

    fn decode_json(&self, item: &S::Item) -> Value {
        self.inner.decode_json(item)
    }
}
