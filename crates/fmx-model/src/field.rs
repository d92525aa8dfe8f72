//! Field descriptors: self-contained coercion, validation, defaulting and
//! null-handling units. Relational kinds point at a target schema and are
//! recursed by the record resolver.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;

use crate::value::Value;

/// Where a field's raw value comes from on the current raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePath {
    /// A literal name: the raw field of that name for scalar kinds, the
    /// related set of that name for relational kinds.
    Name(String),
    /// Reuse the current raw record unchanged. Only meaningful on to-one
    /// relational fields whose model lives on the parent's flat layout.
    SameRecord,
}

/// Token table for boolean coercion. FileMaker layouts encode booleans
/// inconsistently, so the table is per-field configuration with a common
/// default rather than an inferred canonical set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolTokens {
    truthy: Vec<String>,
    falsy: Vec<String>,
}

impl BoolTokens {
    pub fn new<T, F, S>(truthy: T, falsy: F) -> Self
    where
        T: IntoIterator<Item = S>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            truthy: truthy.into_iter().map(|s| s.into().to_lowercase()).collect(),
            falsy: falsy.into_iter().map(|s| s.into().to_lowercase()).collect(),
        }
    }

    /// `None` when the token is not in the table; coercion treats that as
    /// a failure rather than guessing.
    pub fn lookup(&self, raw: &str) -> Option<bool> {
        let token = raw.trim().to_lowercase();
        if self.truthy.iter().any(|t| *t == token) {
            Some(true)
        } else if self.falsy.iter().any(|f| *f == token) {
            Some(false)
        } else {
            None
        }
    }
}

impl Default for BoolTokens {
    fn default() -> Self {
        Self::new(["1", "yes", "true", "y", "t"], ["0", "no", "false", "n", "f"])
    }
}

/// US-style wire formats are the web publishing engine's defaults; both are
/// per-field overridable since layouts control the actual rendering.
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text {
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Integer,
    Decimal,
    Float,
    Boolean {
        tokens: BoolTokens,
    },
    Date {
        format: String,
    },
    Timestamp {
        format: String,
    },
    /// Recurses the resolver against one nested sub-record of the target.
    ToOne {
        target: String,
    },
    /// Recurses against an ordered sequence of nested sub-records.
    ToMany {
        target: String,
    },
}

impl FieldKind {
    pub fn text() -> Self {
        FieldKind::Text {
            min_length: None,
            max_length: None,
        }
    }

    pub fn boolean() -> Self {
        FieldKind::Boolean {
            tokens: BoolTokens::default(),
        }
    }

    pub fn date() -> Self {
        FieldKind::Date {
            format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    pub fn timestamp() -> Self {
        FieldKind::Timestamp {
            format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(self, FieldKind::ToOne { .. } | FieldKind::ToMany { .. })
    }

    /// Relational target schema name, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldKind::ToOne { target } | FieldKind::ToMany { target } => Some(target),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Integer => "integer",
            FieldKind::Decimal => "decimal",
            FieldKind::Float => "float",
            FieldKind::Boolean { .. } => "boolean",
            FieldKind::Date { .. } => "date",
            FieldKind::Timestamp { .. } => "timestamp",
            FieldKind::ToOne { .. } => "to-one",
            FieldKind::ToMany { .. } => "to-many",
        }
    }
}

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex"));

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("invalid URL regex"));

static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("invalid slug regex"));

static COMMA_SEPARATED_INTEGERS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(,\d+)*$").expect("invalid integer-list regex"));

/// A validator predicate, applied in declared order after coercion and
/// bounds. The first failure aborts with its message.
#[derive(Clone)]
pub enum Validator {
    /// The coerced text must match the given pattern.
    Matches(Regex),
    Email,
    Url,
    Slug,
    CommaSeparatedIntegers,
    /// Caller-supplied predicate; `name` appears in failure messages.
    Predicate {
        name: String,
        check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
    },
}

impl Validator {
    pub fn matches(pattern: &str) -> Result<Self, String> {
        Regex::new(pattern)
            .map(Validator::Matches)
            .map_err(|e| format!("invalid validator pattern: {e}"))
    }

    pub fn predicate(
        name: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Validator::Predicate {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::Matches(regex) => {
                check_text(value, "pattern", |s| regex.is_match(s), || {
                    format!("value does not match pattern {:?}", regex.as_str())
                })
            }
            Validator::Email => check_text(value, "email", |s| EMAIL_REGEX.is_match(s), || {
                "value is not a valid email address".to_string()
            }),
            Validator::Url => check_text(value, "URL", |s| URL_REGEX.is_match(s), || {
                "value is not a valid URL".to_string()
            }),
            Validator::Slug => check_text(value, "slug", |s| SLUG_REGEX.is_match(s), || {
                "value is not a valid slug".to_string()
            }),
            Validator::CommaSeparatedIntegers => check_text(
                value,
                "integer list",
                |s| COMMA_SEPARATED_INTEGERS_REGEX.is_match(s),
                || "value is not a comma-separated integer list".to_string(),
            ),
            Validator::Predicate { name, check } => {
                if check(value) {
                    Ok(())
                } else {
                    Err(format!("value failed the `{name}` validator"))
                }
            }
        }
    }
}

fn check_text(
    value: &Value,
    what: &str,
    ok: impl Fn(&str) -> bool,
    message: impl Fn() -> String,
) -> Result<(), String> {
    match value {
        Value::Text(s) if ok(s) => Ok(()),
        Value::Text(_) => Err(message()),
        other => Err(format!(
            "{what} validator expects text, got {}",
            other.kind_name()
        )),
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Matches(regex) => f.debug_tuple("Matches").field(&regex.as_str()).finish(),
            Validator::Email => f.write_str("Email"),
            Validator::Url => f.write_str("Url"),
            Validator::Slug => f.write_str("Slug"),
            Validator::CommaSeparatedIntegers => f.write_str("CommaSeparatedIntegers"),
            Validator::Predicate { name, .. } => {
                f.debug_struct("Predicate").field("name", name).finish()
            }
        }
    }
}

/// Export-time leaf transform; identity when absent.
#[derive(Clone)]
pub struct OutputTransform(Arc<dyn Fn(&Value) -> serde_json::Value + Send + Sync>);

impl OutputTransform {
    pub fn new(f: impl Fn(&Value) -> serde_json::Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> serde_json::Value {
        (self.0)(value)
    }
}

impl fmt::Debug for OutputTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OutputTransform")
    }
}

/// One declared field on a model schema.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub source: SourcePath,
    pub kind: FieldKind,
    pub nullable: bool,
    /// Raw values treated as null before coercion is ever attempted.
    pub null_values: Vec<String>,
    pub default: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub validators: Vec<Validator>,
    pub transform: Option<OutputTransform>,
}

impl FieldDescriptor {
    /// New descriptor sourcing its value from a raw field of the same name.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            source: SourcePath::Name(name.clone()),
            name,
            kind,
            nullable: false,
            null_values: vec![String::new()],
            default: None,
            min: None,
            max: None,
            validators: Vec::new(),
            transform: None,
        }
    }

    /// Source the raw value from a differently named field (scalar kinds)
    /// or related set (relational kinds).
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.source = SourcePath::Name(name.into());
        self
    }

    /// Resolve against the current raw record rather than a related set.
    pub fn same_record(mut self) -> Self {
        self.source = SourcePath::SameRecord;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn null_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.null_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn min(mut self, value: Value) -> Self {
        self.min = Some(value);
        self
    }

    pub fn max(mut self, value: Value) -> Self {
        self.max = Some(value);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn transform(
        mut self,
        f: impl Fn(&Value) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(OutputTransform::new(f));
        self
    }

    /// True when the raw value counts as null: absent, or listed in the
    /// null-sentinel set. Checked before any coercion.
    pub fn is_null_raw(&self, raw: Option<&str>) -> bool {
        match raw {
            None => true,
            Some(s) => self.null_values.iter().any(|n| n == s),
        }
    }

    /// The shared scalar field contract, in fixed order: null detection,
    /// default/null resolution, coercion, bounds, validators. Relational
    /// kinds are handled by the resolver instead.
    pub fn resolve_scalar(&self, raw: Option<&str>) -> Result<Value, String> {
        debug_assert!(!self.kind.is_relational());
        let Some(raw) = raw else {
            return self.resolve_null();
        };
        if self.is_null_raw(Some(raw)) {
            return self.resolve_null();
        }
        let value = self.coerce(raw)?;
        self.check_bounds(&value)?;
        for validator in &self.validators {
            validator.check(&value)?;
        }
        Ok(value)
    }

    /// Null resolution shared by scalar and relational paths: default if
    /// configured, else null when permitted, else a required-field failure.
    pub(crate) fn resolve_null(&self) -> Result<Value, String> {
        if let Some(default) = &self.default {
            return Ok(default.clone());
        }
        if self.nullable {
            return Ok(Value::Null);
        }
        Err(format!("{} field is required and has no default", self.kind.name()))
    }

    fn coerce(&self, raw: &str) -> Result<Value, String> {
        match &self.kind {
            FieldKind::Text {
                min_length,
                max_length,
            } => {
                if let Some(min) = min_length
                    && raw.chars().count() < *min
                {
                    return Err(format!("text is shorter than {min} characters: {raw:?}"));
                }
                if let Some(max) = max_length
                    && raw.chars().count() > *max
                {
                    return Err(format!("text is longer than {max} characters: {raw:?}"));
                }
                Ok(Value::Text(raw.to_string()))
            }
            FieldKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("not an integer: {raw:?}")),
            FieldKind::Decimal => Decimal::from_str(raw.trim())
                .map(Value::Decimal)
                .map_err(|_| format!("not a decimal number: {raw:?}")),
            FieldKind::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("not a number: {raw:?}")),
            FieldKind::Boolean { tokens } => tokens
                .lookup(raw)
                .map(Value::Bool)
                .ok_or_else(|| format!("not a recognized boolean token: {raw:?}")),
            FieldKind::Date { format } => NaiveDate::parse_from_str(raw.trim(), format)
                .map(Value::Date)
                .map_err(|_| format!("not a {format} date: {raw:?}")),
            FieldKind::Timestamp { format } => NaiveDateTime::parse_from_str(raw.trim(), format)
                .map(Value::Timestamp)
                .map_err(|_| format!("not a {format} timestamp: {raw:?}")),
            FieldKind::ToOne { .. } | FieldKind::ToMany { .. } => {
                Err("relational fields are resolved against sub-records".to_string())
            }
        }
    }

    fn check_bounds(&self, value: &Value) -> Result<(), String> {
        if let Some(min) = &self.min
            && value.partial_cmp_same_kind(min) == Some(std::cmp::Ordering::Less)
        {
            return Err("value is below the configured minimum".to_string());
        }
        if let Some(max) = &self.max
            && value.partial_cmp_same_kind(max) == Some(std::cmp::Ordering::Greater)
        {
            return Err("value is above the configured maximum".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sentinel_skips_coercion() {
        // "" is a null sentinel by default; coercion would fail on it.
        let field = FieldDescriptor::new("flag", FieldKind::boolean()).nullable();
        assert_eq!(field.resolve_scalar(Some("")), Ok(Value::Null));
        assert_eq!(field.resolve_scalar(None), Ok(Value::Null));
    }

    #[test]
    fn missing_required_value_fails() {
        let field = FieldDescriptor::new("flag", FieldKind::boolean());
        assert!(field.resolve_scalar(None).is_err());
        assert!(field.resolve_scalar(Some("")).is_err());
    }

    #[test]
    fn default_applies_to_missing_values() {
        let field = FieldDescriptor::new("count", FieldKind::Integer)
            .default_value(Value::Integer(7));
        assert_eq!(field.resolve_scalar(None), Ok(Value::Integer(7)));
        // A present value still coerces normally.
        assert_eq!(field.resolve_scalar(Some("3")), Ok(Value::Integer(3)));
    }

    #[test]
    fn boolean_tokens_are_a_fixed_table() {
        let field = FieldDescriptor::new("flag", FieldKind::boolean());
        assert_eq!(field.resolve_scalar(Some("Yes")), Ok(Value::Bool(true)));
        assert_eq!(field.resolve_scalar(Some("no")), Ok(Value::Bool(false)));
        assert_eq!(field.resolve_scalar(Some("1")), Ok(Value::Bool(true)));
        assert!(field.resolve_scalar(Some("maybe")).is_err());

        let custom = FieldDescriptor::new(
            "flag",
            FieldKind::Boolean {
                tokens: BoolTokens::new(["on"], ["off"]),
            },
        );
        assert_eq!(custom.resolve_scalar(Some("ON")), Ok(Value::Bool(true)));
        assert!(custom.resolve_scalar(Some("yes")).is_err());
    }

    #[test]
    fn numeric_parses_are_strict() {
        let field = FieldDescriptor::new("total", FieldKind::Integer);
        assert_eq!(field.resolve_scalar(Some(" 42 ")), Ok(Value::Integer(42)));
        assert!(field.resolve_scalar(Some("42.5")).is_err());
        assert!(field.resolve_scalar(Some("1,000")).is_err());

        let decimal = FieldDescriptor::new("price", FieldKind::Decimal);
        assert_eq!(
            decimal.resolve_scalar(Some("12.50")),
            Ok(Value::Decimal(Decimal::from_str("12.50").unwrap()))
        );
        assert!(decimal.resolve_scalar(Some("twelve")).is_err());
    }

    #[test]
    fn dates_use_the_configured_wire_format() {
        let field = FieldDescriptor::new("published", FieldKind::date());
        assert_eq!(
            field.resolve_scalar(Some("02/28/2014")),
            Ok(Value::Date(NaiveDate::from_ymd_opt(2014, 2, 28).unwrap()))
        );
        assert!(field.resolve_scalar(Some("2014-02-28")).is_err());

        let iso = FieldDescriptor::new(
            "published",
            FieldKind::Date {
                format: "%Y-%m-%d".to_string(),
            },
        );
        assert!(iso.resolve_scalar(Some("2014-02-28")).is_ok());
    }

    #[test]
    fn bounds_apply_after_coercion() {
        let field = FieldDescriptor::new("qty", FieldKind::Integer)
            .min(Value::Integer(0))
            .max(Value::Integer(10));
        assert_eq!(field.resolve_scalar(Some("5")), Ok(Value::Integer(5)));
        assert!(field.resolve_scalar(Some("-1")).is_err());
        assert!(field.resolve_scalar(Some("11")).is_err());
    }

    #[test]
    fn validators_run_in_declared_order() {
        let field = FieldDescriptor::new("contact", FieldKind::text())
            .validator(Validator::Email)
            .validator(Validator::predicate("corporate", |v| {
                matches!(v, Value::Text(s) if s.ends_with("@example.com"))
            }));
        assert!(field.resolve_scalar(Some("ann@example.com")).is_ok());
        // Fails the first validator; its message wins.
        let err = field.resolve_scalar(Some("not-an-email")).unwrap_err();
        assert!(err.contains("email"));
        // Passes email, fails the second.
        let err = field.resolve_scalar(Some("ann@other.org")).unwrap_err();
        assert!(err.contains("corporate"));
    }

    #[test]
    fn text_length_bounds() {
        let field = FieldDescriptor::new(
            "code",
            FieldKind::Text {
                min_length: Some(2),
                max_length: Some(4),
            },
        );
        assert!(field.resolve_scalar(Some("ab")).is_ok());
        assert!(field.resolve_scalar(Some("a")).is_err());
        assert!(field.resolve_scalar(Some("abcde")).is_err());
    }
}
