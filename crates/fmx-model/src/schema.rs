//! Model schemas: the ordered field registry plus resolved meta
//! configuration, built once up front and immutable afterward.
//!
//! Schemas are assembled through [`SchemaSet::build`] in two passes so that
//! relational fields can reference each other by name without
//! initialization-order hazards: pass 1 builds every schema independently
//! with targets held by name, pass 2 dereferences the names and registers
//! reverse links on the targets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::field::{FieldDescriptor, FieldKind, SourcePath};

/// A secret that never renders in debug or display output. Connection
/// credentials must not leak into error messages or logs.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The underlying secret, for the transport collaborator only.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password),
        }
    }
}

/// Connection parameters for one model's layout. Required on concrete
/// schemas, forbidden on abstract ones.
#[derive(Debug, Clone)]
pub struct Connection {
    pub endpoint: String,
    pub database: String,
    pub layout: String,
    pub response_layout: Option<String>,
    pub credentials: Option<Credentials>,
}

impl Connection {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        layout: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            layout: layout.into(),
            response_layout: None,
            credentials: None,
        }
    }

    pub fn response_layout(mut self, layout: impl Into<String>) -> Self {
        self.response_layout = Some(layout.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }
}

/// How the consumer export replaces an existing to-many relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToManyPolicy {
    /// Remove the consumer's current related objects, then add the
    /// exported ones. The original web-publishing integrations default to
    /// this so stale relations never survive a refresh.
    #[default]
    ClearThenAdd,
    /// Leave existing related objects alone and add the exported ones.
    Append,
}

/// Default query-manager knobs carried on the schema, read by the query
/// layer at manager construction. Explicit injection replaces the source
/// pattern of an ambient shared manager per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerDefaults {
    /// Record group size (`-max`), 50 unless overridden.
    pub max: u32,
}

impl Default for ManagerDefaults {
    fn default() -> Self {
        Self { max: 50 }
    }
}

/// Declarative meta configuration for one model.
#[derive(Debug, Clone)]
pub struct Meta {
    pub connection: Option<Connection>,
    /// Opaque external-consumer type name the instances project into.
    pub target_type: Option<String>,
    /// Explicit primary-key field; falls back to a field named `pk`, then
    /// `id`, resolved once at build time.
    pub pk_name: Option<String>,
    /// Consumer-side primary-key attribute name.
    pub consumer_pk_name: String,
    /// Local field name → consumer attribute name.
    pub field_name_map: HashMap<String, String>,
    pub abstract_schema: bool,
    pub to_many_policy: ToManyPolicy,
    /// Default sort for managed queries; `-` prefix for descending.
    pub ordering: Option<String>,
    pub manager: ManagerDefaults,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            connection: None,
            target_type: None,
            pk_name: None,
            consumer_pk_name: "pk".to_string(),
            field_name_map: HashMap::new(),
            abstract_schema: false,
            to_many_policy: ToManyPolicy::default(),
            ordering: None,
            manager: ManagerDefaults::default(),
        }
    }
}

/// A reverse reference: some schema declared a relational field targeting
/// this one. Auto-populated during pass 2, read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseLink {
    pub schema: String,
    pub field: String,
}

/// An immutable, ordered field registry plus resolved meta for one model.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    meta: Meta,
    pk_name: Option<String>,
    related: Vec<ReverseLink>,
    many_related: Vec<ReverseLink>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in declaration order, the canonical export order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn is_abstract(&self) -> bool {
        self.meta.abstract_schema
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.meta.connection.as_ref()
    }

    /// Resolved primary-key field name, fixed at build time.
    pub fn pk_name(&self) -> Option<&str> {
        self.pk_name.as_deref()
    }

    /// Schemas holding a to-one field targeting this schema.
    pub fn related(&self) -> &[ReverseLink] {
        &self.related
    }

    /// Schemas holding a to-many field targeting this schema.
    pub fn many_related(&self) -> &[ReverseLink] {
        &self.many_related
    }
}

/// Ordered declaration of one schema, fed to [`SchemaSet::build`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    meta: Meta,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            meta: Meta::default(),
        }
    }

    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }
}

/// The set of schemas a deployment declares, resolved and cross-linked.
/// Safe for unsynchronized concurrent reads once built.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaSet {
    /// Two-pass build. Fails fast, before any query traffic, when a
    /// concrete schema lacks a connection, an abstract one carries one, a
    /// relational target cannot be dereferenced, or a configured primary
    /// key matches no declared field.
    pub fn build(builders: Vec<SchemaBuilder>) -> Result<Self> {
        // Pass 1: each schema independently; targets stay names.
        let mut schemas: Vec<Schema> = Vec::with_capacity(builders.len());
        for builder in builders {
            let schema = Self::build_one(builder)?;
            if schemas.iter().any(|s| s.name == schema.name) {
                return Err(ModelError::configuration(format!(
                    "duplicate schema name `{}`",
                    schema.name
                )));
            }
            schemas.push(schema);
        }

        // Pass 2: dereference targets and register reverse links.
        let mut links: Vec<(String, ReverseLink, bool)> = Vec::new();
        for schema in &schemas {
            for field in &schema.fields {
                let Some(target) = field.kind.target() else {
                    continue;
                };
                if !schemas.iter().any(|s| s.name == target) {
                    return Err(ModelError::configuration(format!(
                        "schema `{}` field `{}` targets unknown schema `{target}`",
                        schema.name, field.name
                    )));
                }
                let link = ReverseLink {
                    schema: schema.name.clone(),
                    field: field.name.clone(),
                };
                let plural = matches!(field.kind, FieldKind::ToMany { .. });
                links.push((target.to_string(), link, plural));
            }
        }
        for (target, link, plural) in links {
            // Target existence was verified while collecting the links.
            if let Some(schema) = schemas.iter_mut().find(|s| s.name == target) {
                if plural {
                    schema.many_related.push(link);
                } else {
                    schema.related.push(link);
                }
            }
        }

        // An abstract schema is reachable only through a relational field
        // of some other schema; one nothing points at is dead weight.
        for schema in &schemas {
            if schema.is_abstract() && schema.related.is_empty() && schema.many_related.is_empty() {
                return Err(ModelError::configuration(format!(
                    "abstract schema `{}` is not referenced by any relational field",
                    schema.name
                )));
            }
        }

        debug!(schemas = schemas.len(), "schema set built");
        Ok(Self {
            schemas: schemas
                .into_iter()
                .map(|s| (s.name.clone(), Arc::new(s)))
                .collect(),
        })
    }

    fn build_one(builder: SchemaBuilder) -> Result<Schema> {
        let SchemaBuilder { name, fields, meta } = builder;

        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                return Err(ModelError::configuration(format!(
                    "schema `{name}` declares field `{}` twice",
                    field.name
                )));
            }
            if field.source == SourcePath::SameRecord && !field.kind.is_relational() {
                return Err(ModelError::configuration(format!(
                    "schema `{name}` field `{}`: a same-record source is only valid on relational fields",
                    field.name
                )));
            }
            if field.source == SourcePath::SameRecord
                && matches!(field.kind, FieldKind::ToMany { .. })
            {
                return Err(ModelError::configuration(format!(
                    "schema `{name}` field `{}`: a same-record source requires single cardinality",
                    field.name
                )));
            }
        }

        if meta.abstract_schema && meta.connection.is_some() {
            return Err(ModelError::configuration(format!(
                "abstract schema `{name}` must not carry connection parameters"
            )));
        }
        if !meta.abstract_schema && meta.connection.is_none() {
            return Err(ModelError::configuration(format!(
                "schema `{name}` is not abstract and has no connection parameters"
            )));
        }

        // Primary-key resolution: explicit name, else `pk`, else `id`.
        let pk_name = match &meta.pk_name {
            Some(explicit) => {
                if !index.contains_key(explicit) {
                    return Err(ModelError::configuration(format!(
                        "schema `{name}` configures primary key `{explicit}` but declares no such field"
                    )));
                }
                Some(explicit.clone())
            }
            None if index.contains_key("pk") => Some("pk".to_string()),
            None if index.contains_key("id") => Some("id".to_string()),
            None => None,
        };

        Ok(Schema {
            name,
            fields,
            index,
            meta,
            pk_name,
            related: Vec::new(),
            many_related: Vec::new(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Arc<Schema>> {
        self.get(name).ok_or_else(|| {
            ModelError::configuration(format!("no schema named `{name}` in this set"))
        })
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
