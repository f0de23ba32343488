//! Property Descriptors - Typed, validating accessors for model fields
//!
//! A `Property` is built with one of the typed constructors, refined with
//! the consuming builder methods and handed to a `SchemaBuilder`, which
//! binds it to its schema and attribute name exactly once. After that the
//! descriptor is immutable and shared between the schema and every schema
//! that extends it.
//!
//! ```rust,ignore
//! let title = Property::string().required();
//! let body = Property::text();
//! let tags = Property::string_list();
//! let created = Property::date_time().auto_now_add();
//! ```

pub mod list;
pub mod reference;
pub mod scalar;
pub mod temporal;

use std::fmt;
use std::sync::Arc;

use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::users::UserService;
use crate::value::{Value, ValueType};

pub use reference::{ReferenceConfig, ReferenceTarget};
pub use temporal::AutoTime;

/// User supplied validation callback; it confirms a value or rejects it
pub type Validator = Arc<dyn Fn(&Value) -> ModelResult<()> + Send + Sync>;

/// The native type of a property and its type-specific options
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    String { multiline: bool },
    Text,
    Blob,
    ByteString,
    Integer,
    Float,
    Boolean,
    DateTime(AutoTime),
    Date(AutoTime),
    Time(AutoTime),
    User {
        auto_current_user: bool,
        auto_current_user_add: bool,
    },
    Category,
    Link,
    Email,
    GeoPt,
    Im,
    PhoneNumber,
    PostalAddress,
    Rating,
    List { item_type: ValueType },
    Reference(ReferenceConfig),
}

impl PropertyKind {
    /// Native value type stored on model instances
    pub fn data_type(&self) -> ValueType {
        match self {
            PropertyKind::String { .. } => ValueType::String,
            PropertyKind::Text => ValueType::Text,
            PropertyKind::Blob => ValueType::Blob,
            PropertyKind::ByteString => ValueType::ByteString,
            PropertyKind::Integer => ValueType::Integer,
            PropertyKind::Float => ValueType::Float,
            PropertyKind::Boolean => ValueType::Boolean,
            PropertyKind::DateTime(_) => ValueType::DateTime,
            PropertyKind::Date(_) => ValueType::Date,
            PropertyKind::Time(_) => ValueType::Time,
            PropertyKind::User { .. } => ValueType::User,
            PropertyKind::Category => ValueType::Category,
            PropertyKind::Link => ValueType::Link,
            PropertyKind::Email => ValueType::Email,
            PropertyKind::GeoPt => ValueType::GeoPt,
            PropertyKind::Im => ValueType::Im,
            PropertyKind::PhoneNumber => ValueType::PhoneNumber,
            PropertyKind::PostalAddress => ValueType::PostalAddress,
            PropertyKind::Rating => ValueType::Rating,
            PropertyKind::List { .. } => ValueType::List,
            PropertyKind::Reference(_) => ValueType::Key,
        }
    }
}

/// A named, typed, validated field of a schema
#[derive(Clone)]
pub struct Property {
    kind: PropertyKind,
    attr_name: Option<String>,
    name: Option<String>,
    verbose_name: Option<String>,
    default: Option<Value>,
    required: Option<bool>,
    indexed: Option<bool>,
    validator: Option<Validator>,
    choices: Option<Vec<Value>>,
    model_kind: Option<String>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("kind", &self.kind)
            .field("attr_name", &self.attr_name)
            .field("name", &self.name)
            .field("default", &self.default)
            .field("required", &self.is_required())
            .field("indexed", &self.is_indexed())
            .field("choices", &self.choices)
            .field("validator", &self.validator.is_some())
            .field("model_kind", &self.model_kind)
            .finish()
    }
}

impl Property {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            kind,
            attr_name: None,
            name: None,
            verbose_name: None,
            default: None,
            required: None,
            indexed: None,
            validator: None,
            choices: None,
            model_kind: None,
        }
    }

    /// Short single-line string, at most 500 bytes
    pub fn string() -> Self {
        Self::new(PropertyKind::String { multiline: false })
    }

    /// Long unindexed string
    pub fn text() -> Self {
        Self::new(PropertyKind::Text)
    }

    /// Long unindexed byte string
    pub fn blob() -> Self {
        Self::new(PropertyKind::Blob)
    }

    /// Short indexed byte string
    pub fn byte_string() -> Self {
        Self::new(PropertyKind::ByteString)
    }

    pub fn integer() -> Self {
        Self::new(PropertyKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(PropertyKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(PropertyKind::Boolean)
    }

    pub fn date_time() -> Self {
        Self::new(PropertyKind::DateTime(AutoTime::default()))
    }

    pub fn date() -> Self {
        Self::new(PropertyKind::Date(AutoTime::default()))
    }

    pub fn time() -> Self {
        Self::new(PropertyKind::Time(AutoTime::default()))
    }

    pub fn user() -> Self {
        Self::new(PropertyKind::User {
            auto_current_user: false,
            auto_current_user_add: false,
        })
    }

    pub fn category() -> Self {
        Self::new(PropertyKind::Category)
    }

    pub fn link() -> Self {
        Self::new(PropertyKind::Link)
    }

    pub fn email() -> Self {
        Self::new(PropertyKind::Email)
    }

    pub fn geo_pt() -> Self {
        Self::new(PropertyKind::GeoPt)
    }

    /// Instant-messaging handle, coerced from `"protocol address"`
    pub fn im() -> Self {
        Self::new(PropertyKind::Im)
    }

    pub fn phone_number() -> Self {
        Self::new(PropertyKind::PhoneNumber)
    }

    pub fn postal_address() -> Self {
        Self::new(PropertyKind::PostalAddress)
    }

    pub fn rating() -> Self {
        Self::new(PropertyKind::Rating)
    }

    /// List whose items all have `item_type`
    pub fn list(item_type: ValueType) -> Self {
        Self::new(PropertyKind::List { item_type })
    }

    pub fn string_list() -> Self {
        Self::list(ValueType::String)
    }

    /// Many-to-one reference to entities of `kind`
    pub fn reference(kind: impl Into<String>) -> Self {
        Self::new(PropertyKind::Reference(ReferenceConfig::new(
            ReferenceTarget::Kind(kind.into()),
        )))
    }

    /// Reference to entities of any kind
    pub fn reference_any() -> Self {
        Self::new(PropertyKind::Reference(ReferenceConfig::new(ReferenceTarget::Any)))
    }

    /// Reference to entities of the declaring schema
    pub fn self_reference() -> Self {
        Self::new(PropertyKind::Reference(ReferenceConfig::new(
            ReferenceTarget::SelfKind,
        )))
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    /// Explicitly set the required flag; list properties only accept `true`
    pub fn set_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = Some(indexed);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Storage name, when it differs from the attribute name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Permit newlines in a string property
    pub fn multiline(mut self) -> Self {
        if let PropertyKind::String { multiline } = &mut self.kind {
            *multiline = true;
        }
        self
    }

    /// Name of the reverse collection created on the referenced schema
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        if let PropertyKind::Reference(config) = &mut self.kind {
            config.collection_name = Some(name.into());
        }
        self
    }

    /// Recompute the timestamp, or the current user, on every write
    pub fn auto_now(mut self) -> Self {
        match &mut self.kind {
            PropertyKind::DateTime(auto) | PropertyKind::Date(auto) | PropertyKind::Time(auto) => {
                auto.auto_now = true
            }
            PropertyKind::User {
                auto_current_user, ..
            } => *auto_current_user = true,
            _ => {}
        }
        self
    }

    /// Use the current timestamp, or the current user, as the default
    pub fn auto_now_add(mut self) -> Self {
        match &mut self.kind {
            PropertyKind::DateTime(auto) | PropertyKind::Date(auto) | PropertyKind::Time(auto) => {
                auto.auto_now_add = true
            }
            PropertyKind::User {
                auto_current_user_add,
                ..
            } => *auto_current_user_add = true,
            _ => {}
        }
        self
    }

    /// Bind the property to its schema and attribute
    pub(crate) fn configure(&mut self, model_kind: &str, attr_name: &str) -> ModelResult<()> {
        if let Some(existing) = &self.model_kind {
            return Err(ModelError::Configuration(format!(
                "Property {} is already bound to {}",
                attr_name, existing
            )));
        }

        match &self.kind {
            PropertyKind::Text | PropertyKind::Blob => self.require_option("indexed", self.indexed, false)?,
            PropertyKind::List { item_type } => {
                list::check_item_type(*item_type)?;
                if matches!(item_type, ValueType::Text | ValueType::Blob) {
                    self.require_option("indexed", self.indexed, false)?;
                }
                self.require_option("required", self.required, true)?;
            }
            PropertyKind::User { .. } if self.default.is_some() => {
                return Err(ModelError::Configuration(format!(
                    "User property {} does not accept a default; use auto_now_add",
                    attr_name
                )));
            }
            _ => {}
        }

        if let PropertyKind::Reference(config) = &mut self.kind {
            config.bind(model_kind);
        }

        self.model_kind = Some(model_kind.to_string());
        self.attr_name = Some(attr_name.to_string());
        if self.name.is_none() {
            self.name = Some(attr_name.to_string());
        }
        Ok(())
    }

    fn require_option(&self, option: &str, actual: Option<bool>, expected: bool) -> ModelResult<()> {
        match actual {
            Some(actual) if actual != expected => Err(ModelError::Configuration(format!(
                "{} must be {}.",
                option, expected
            ))),
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn data_type(&self) -> ValueType {
        self.kind.data_type()
    }

    /// Attribute name on the model
    pub fn attr_name(&self) -> &str {
        self.attr_name.as_deref().unwrap_or_default()
    }

    /// Storage name in the raw record
    pub fn storage_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.attr_name.as_deref())
            .unwrap_or_default()
    }

    pub fn verbose_name_or_default(&self) -> &str {
        self.verbose_name.as_deref().unwrap_or_else(|| self.attr_name())
    }

    /// Kind of the schema that declared this property
    pub fn model_kind(&self) -> Option<&str> {
        self.model_kind.as_deref()
    }

    pub fn is_required(&self) -> bool {
        match self.kind {
            PropertyKind::List { .. } => true,
            _ => self.required.unwrap_or(false),
        }
    }

    pub fn is_indexed(&self) -> bool {
        match self.kind {
            PropertyKind::Text | PropertyKind::Blob => false,
            PropertyKind::List {
                item_type: ValueType::Text | ValueType::Blob,
            } => false,
            _ => self.indexed.unwrap_or(true),
        }
    }

    pub fn choices_list(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn reference_config(&self) -> Option<&ReferenceConfig> {
        match &self.kind {
            PropertyKind::Reference(config) => Some(config),
            _ => None,
        }
    }

    /// Type-specific emptiness; only strings and bytes have an empty non-null form
    pub fn is_empty_value(&self, value: &Value) -> bool {
        if matches!(self.kind, PropertyKind::List { .. }) {
            return value.is_null();
        }
        match value {
            Value::Null => true,
            Value::String(s)
            | Value::Text(s)
            | Value::Category(s)
            | Value::Link(s)
            | Value::Email(s)
            | Value::PhoneNumber(s)
            | Value::PostalAddress(s) => s.is_empty(),
            Value::ByteString(b) | Value::Blob(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Validate a value, returning it coerced to the native type
    pub fn validate(&self, value: Value) -> ModelResult<Value> {
        if self.is_empty_value(&value) {
            if self.is_required() {
                return Err(ModelError::Validation(format!(
                    "Property {} is required",
                    self.storage_name()
                )));
            }
            return Ok(value);
        }

        let value = self.coerce(value)?;

        if let Some(choices) = &self.choices {
            if !choices.iter().any(|choice| choice == &value) {
                let listed: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                return Err(ModelError::Validation(format!(
                    "Property {} is {}; must be one of [{}]",
                    self.storage_name(),
                    value,
                    listed.join(", ")
                )));
            }
        }

        if let Some(validator) = &self.validator {
            validator(&value)?;
        }

        self.check_constraints(&value)?;
        Ok(value)
    }

    fn coerce(&self, value: Value) -> ModelResult<Value> {
        let name = self.storage_name();
        match &self.kind {
            PropertyKind::DateTime(_) | PropertyKind::Date(_) | PropertyKind::Time(_) => {
                temporal::coerce(name, &self.kind, value)
            }
            PropertyKind::List { item_type } => list::coerce(name, *item_type, value),
            PropertyKind::Reference(config) => reference::coerce(name, config, value),
            kind => scalar::coerce(name, kind, value),
        }
    }

    fn check_constraints(&self, value: &Value) -> ModelResult<()> {
        match &self.kind {
            PropertyKind::List { .. } => Ok(()),
            kind => scalar::check_constraints(self.storage_name(), kind, value),
        }
    }

    /// Value a freshly constructed instance starts with
    pub fn default_value(&self, users: &dyn UserService) -> Value {
        match &self.kind {
            PropertyKind::DateTime(auto) | PropertyKind::Date(auto) | PropertyKind::Time(auto)
                if auto.auto_now || auto.auto_now_add =>
            {
                temporal::now(&self.kind)
            }
            PropertyKind::User {
                auto_current_user,
                auto_current_user_add,
            } => {
                if *auto_current_user || *auto_current_user_add {
                    users.current_user().map(Value::User).unwrap_or(Value::Null)
                } else {
                    Value::Null
                }
            }
            PropertyKind::List { .. } => self
                .default
                .clone()
                .unwrap_or_else(|| Value::List(Vec::new())),
            _ => self.default.clone().unwrap_or(Value::Null),
        }
    }

    /// Representation written to the raw record for the instance value `current`
    pub fn value_for_storage(&self, current: &Value, users: &dyn UserService) -> ModelResult<Value> {
        let value = match &self.kind {
            PropertyKind::DateTime(auto) | PropertyKind::Date(auto) | PropertyKind::Time(auto)
                if auto.auto_now =>
            {
                temporal::now(&self.kind)
            }
            PropertyKind::User {
                auto_current_user: true,
                ..
            } => users.current_user().map(Value::User).unwrap_or(Value::Null),
            _ => current.clone(),
        };

        let is_list = matches!(self.kind, PropertyKind::List { .. });
        if !is_list && self.is_required() && self.is_empty_value(&value) {
            return Err(ModelError::Validation(format!(
                "Property {} is required",
                self.storage_name()
            )));
        }

        match &self.kind {
            PropertyKind::Date(_) | PropertyKind::Time(_) => Ok(temporal::widen(value)),
            PropertyKind::List { item_type } => {
                let items = list::validate_contents(self.storage_name(), *item_type, value)?;
                let items = Value::List(items);
                if let Some(validator) = &self.validator {
                    validator(&items)?;
                }
                Ok(list::widen_items(items))
            }
            _ => Ok(value),
        }
    }

    /// Instance value for a value read from a raw record
    pub fn value_from_storage(&self, stored: Value) -> Value {
        match &self.kind {
            PropertyKind::Date(_) | PropertyKind::Time(_) => temporal::narrow(&self.kind, stored),
            PropertyKind::List { item_type } => list::narrow_items(*item_type, stored),
            _ => stored,
        }
    }

    /// Current value of this property on `model`
    pub fn get(&self, model: &Model) -> Value {
        model.raw_value(self.attr_name()).cloned().unwrap_or(Value::Null)
    }

    /// Validate and store a value on `model`
    pub fn set(&self, model: &mut Model, value: impl Into<Value>) -> ModelResult<()> {
        let value = self.validate(value.into())?;
        model.store_value(self.attr_name(), value);
        Ok(())
    }
}
