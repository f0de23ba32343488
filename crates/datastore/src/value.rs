//! Property Values - Native values held by model fields and stored records
//!
//! `Value` is the closed set of types a property may hold. The same enum is
//! used in memory and in stored records; a few variants (dates, times) only
//! appear in memory and are widened to timestamps before storage.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};
use crate::key::Key;

/// Identity of a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct User {
    email: String,
    auth_domain: String,
    user_id: Option<String>,
}

impl User {
    pub fn new(email: impl Into<String>, auth_domain: impl Into<String>) -> ModelResult<Self> {
        let email = email.into();
        if email.is_empty() {
            return Err(ModelError::Validation("User email cannot be empty".to_string()));
        }
        Ok(Self {
            email,
            auth_domain: auth_domain.into(),
            user_id: None,
        })
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn auth_domain(&self) -> &str {
        &self.auth_domain
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Email local part, or the full email when the domain matches the auth domain
    pub fn nickname(&self) -> &str {
        match self.email.split_once('@') {
            Some((local, domain)) if domain == self.auth_domain => local,
            _ => &self.email,
        }
    }
}

/// Geographical point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPt {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPt {
    pub fn new(lat: f64, lon: f64) -> ModelResult<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ModelError::Validation(format!(
                "Latitude must be between -90 and 90; received {}",
                lat
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ModelError::Validation(format!(
                "Longitude must be between -180 and 180; received {}",
                lon
            )));
        }
        Ok(Self { lat, lon })
    }
}

impl FromStr for GeoPt {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s.split_once(',').ok_or_else(|| {
            ModelError::Validation(format!("Expected a 'lat,lon' pair, got '{}'", s))
        })?;
        let parse = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| ModelError::Validation(format!("Expected floats for lat and lon, got '{}'", s)))
        };
        GeoPt::new(parse(lat)?, parse(lon)?)
    }
}

impl fmt::Display for GeoPt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Protocols an instant-messaging handle may name besides a URL
pub const IM_PROTOCOLS: [&str; 3] = ["sip", "unknown", "xmpp"];

/// Instant-messaging handle: a protocol and an address on it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Im {
    protocol: String,
    address: String,
}

impl Im {
    pub fn new(protocol: impl Into<String>, address: impl Into<String>) -> ModelResult<Self> {
        let protocol = protocol.into();
        let address = address.into();
        if !IM_PROTOCOLS.contains(&protocol.as_str()) && url::Url::parse(&protocol).is_err() {
            return Err(ModelError::Validation(format!(
                "Protocol must be a URL or one of {}; received {}",
                IM_PROTOCOLS.join(", "),
                protocol
            )));
        }
        if address.is_empty() {
            return Err(ModelError::Validation("IM address cannot be empty".to_string()));
        }
        Ok(Self { protocol, address })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl FromStr for Im {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, address) = s.split_once(' ').ok_or_else(|| {
            ModelError::Validation(format!("Expected a 'protocol address' pair, got '{}'", s))
        })?;
        Im::new(protocol, address)
    }
}

impl fmt::Display for Im {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.address)
    }
}

/// Native type tag of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Text,
    ByteString,
    Blob,
    DateTime,
    Date,
    Time,
    Key,
    User,
    Category,
    Link,
    Email,
    GeoPt,
    Im,
    PhoneNumber,
    PostalAddress,
    Rating,
    List,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// Short indexed text, at most 500 bytes
    String(String),
    /// Long unindexed text
    Text(String),
    /// Short indexed bytes, at most 500 bytes
    ByteString(Vec<u8>),
    /// Long unindexed bytes
    Blob(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Key(Key),
    User(User),
    Category(String),
    Link(String),
    Email(String),
    GeoPt(GeoPt),
    Im(Im),
    PhoneNumber(String),
    PostalAddress(String),
    Rating(i64),
    List(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Text(_) => ValueType::Text,
            Value::ByteString(_) => ValueType::ByteString,
            Value::Blob(_) => ValueType::Blob,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::Key(_) => ValueType::Key,
            Value::User(_) => ValueType::User,
            Value::Category(_) => ValueType::Category,
            Value::Link(_) => ValueType::Link,
            Value::Email(_) => ValueType::Email,
            Value::GeoPt(_) => ValueType::GeoPt,
            Value::Im(_) => ValueType::Im,
            Value::PhoneNumber(_) => ValueType::PhoneNumber,
            Value::PostalAddress(_) => ValueType::PostalAddress,
            Value::Rating(_) => ValueType::Rating,
            Value::List(_) => ValueType::List,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text held by any of the string-like variants
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s)
            | Value::Text(s)
            | Value::Category(s)
            | Value::Link(s)
            | Value::Email(s)
            | Value::PhoneNumber(s)
            | Value::PostalAddress(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteString(b) | Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) | Value::Rating(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Value::Key(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Value::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Timestamp view of the temporal variants, anchored at midnight or 1970-01-01
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(date) => Some(date.and_time(NaiveTime::default())),
            Value::Time(time) => Some(epoch_date().and_time(*time)),
            _ => None,
        }
    }

    /// Ordering family; values of different families never compare equal
    fn family(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Rating(_) => 1,
            Value::DateTime(_) | Value::Date(_) | Value::Time(_) => 2,
            Value::Boolean(_) => 3,
            Value::ByteString(_) | Value::Blob(_) => 4,
            Value::String(_)
            | Value::Text(_)
            | Value::Category(_)
            | Value::Link(_)
            | Value::Email(_)
            | Value::Im(_)
            | Value::PhoneNumber(_)
            | Value::PostalAddress(_) => 5,
            Value::Float(_) => 6,
            Value::GeoPt(_) => 7,
            Value::User(_) => 8,
            Value::Key(_) => 9,
            Value::List(_) => 10,
        }
    }

    /// Text a string-family value sorts by; handles sort by their stored form
    fn sort_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Im(im) => Some(Cow::Owned(im.to_string())),
            other => other.as_str().map(Cow::Borrowed),
        }
    }

    pub fn same_family(&self, other: &Value) -> bool {
        self.family() == other.family()
    }

    /// Total order used for sorting and range filters
    pub fn datastore_cmp(&self, other: &Value) -> Ordering {
        let by_family = self.family().cmp(&other.family());
        if by_family != Ordering::Equal {
            return by_family;
        }
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::GeoPt(a), Value::GeoPt(b)) => a
                .lat
                .total_cmp(&b.lat)
                .then_with(|| a.lon.total_cmp(&b.lon)),
            (Value::User(a), Value::User(b)) => a.cmp(b),
            (Value::Key(a), Value::Key(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ordering = x.datastore_cmp(y);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => {
                if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
                    a.cmp(&b)
                } else if let (Some(a), Some(b)) = (self.as_datetime(), other.as_datetime()) {
                    a.cmp(&b)
                } else if let (Some(a), Some(b)) = (self.as_bytes(), other.as_bytes()) {
                    a.cmp(b)
                } else if let (Some(a), Some(b)) = (self.sort_text(), other.sort_text()) {
                    a.cmp(&b)
                } else {
                    Ordering::Equal
                }
            }
        }
    }
}

/// Date every stored time-of-day is anchored to
pub fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) | Value::Rating(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::ByteString(b) | Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Key(key) => write!(f, "{}", key),
            Value::User(user) => write!(f, "{}", user.email()),
            Value::GeoPt(pt) => write!(f, "{}", pt),
            Value::Im(im) => write!(f, "'{}'", im),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            other => write!(f, "'{}'", other.as_str().unwrap_or_default()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<Key> for Value {
    fn from(value: Key) -> Self {
        Value::Key(value)
    }
}

impl From<&Key> for Value {
    fn from(value: &Key) -> Self {
        Value::Key(value.clone())
    }
}

impl From<User> for Value {
    fn from(value: User) -> Self {
        Value::User(value)
    }
}

impl From<Im> for Value {
    fn from(value: Im) -> Self {
        Value::Im(value)
    }
}

impl From<GeoPt> for Value {
    fn from(value: GeoPt) -> Self {
        Value::GeoPt(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl TryFrom<u64> for Value {
    type Error = ModelError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Value::Integer)
            .map_err(|_| ModelError::Validation(format!("Integer {} must fit in 64 bits", value)))
    }
}

impl TryFrom<i128> for Value {
    type Error = ModelError;

    fn try_from(value: i128) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Value::Integer)
            .map_err(|_| ModelError::Validation(format!("Integer {} must fit in 64 bits", value)))
    }
}
