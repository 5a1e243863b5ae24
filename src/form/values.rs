use std::borrow::{Borrow, Cow};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::controller::FormError;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(Cow<'static, str>);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for FieldKey {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&FieldKey> for FieldKey {
    fn from(value: &FieldKey) -> Self {
        value.clone()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(Decimal),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Null => ValueKind::Null,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::Number(_) => ValueKind::Number,
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::List(_) => ValueKind::List,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Number(Decimal::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl<V> From<Vec<V>> for FieldValue
where
    V: Into<FieldValue>,
{
    fn from(values: Vec<V>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    Text,
    List,
    Any,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Any => "any value",
        })
    }
}

/// Never coerces across kinds: a `Text("21")` is not a number. Integer
/// targets reject fractional and out-of-range numbers.
pub trait FieldType: Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn to_field_value(&self) -> FieldValue;

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue>;

    fn decode(key: &FieldKey, value: FieldValue) -> Result<Self, FormError> {
        Self::from_field_value(value).map_err(|rejected| FormError::TypeMismatch {
            key: key.clone(),
            expected: Self::KIND,
            found: rejected.kind(),
        })
    }
}

impl FieldType for FieldValue {
    const KIND: ValueKind = ValueKind::Any;

    fn to_field_value(&self) -> FieldValue {
        self.clone()
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        Ok(value)
    }
}

impl FieldType for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Text(text) => Ok(text),
            other => Err(other),
        }
    }
}

impl FieldType for Option<String> {
    const KIND: ValueKind = ValueKind::Text;

    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(text) => FieldValue::Text(text.clone()),
            None => FieldValue::Null,
        }
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Text(text) => Ok(Some(text)),
            FieldValue::Null => Ok(None),
            other => Err(other),
        }
    }
}

impl FieldType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Bool(flag) => Ok(flag),
            other => Err(other),
        }
    }
}

impl FieldType for Decimal {
    const KIND: ValueKind = ValueKind::Number;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(*self)
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Number(number) => Ok(number),
            other => Err(other),
        }
    }
}

impl FieldType for i64 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(Decimal::from(*self))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Number(number) if number.fract().is_zero() => {
                number.to_i64().ok_or(FieldValue::Number(number))
            }
            other => Err(other),
        }
    }
}

impl FieldType for u32 {
    const KIND: ValueKind = ValueKind::Number;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::Number(Decimal::from(*self))
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        match value {
            FieldValue::Number(number) if number.fract().is_zero() => {
                number.to_u32().ok_or(FieldValue::Number(number))
            }
            other => Err(other),
        }
    }
}

impl FieldType for Vec<String> {
    const KIND: ValueKind = ValueKind::List;

    fn to_field_value(&self) -> FieldValue {
        FieldValue::List(self.iter().cloned().map(FieldValue::Text).collect())
    }

    fn from_field_value(value: FieldValue) -> Result<Self, FieldValue> {
        let FieldValue::List(items) = value else {
            return Err(value);
        };
        if !items.iter().all(|item| matches!(item, FieldValue::Text(_))) {
            return Err(FieldValue::List(items));
        }
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                FieldValue::Text(text) => Some(text),
                _ => None,
            })
            .collect())
    }
}

pub trait FormValues: Clone + Send + Sync + 'static {
    fn field_keys(&self) -> Vec<FieldKey>;
    fn field(&self, key: &FieldKey) -> Option<FieldValue>;
    fn set_field(&mut self, key: &FieldKey, value: FieldValue) -> Result<(), FormError>;
}

/// Untyped form values. Accepts writes to keys it did not start with.
pub type DynamicValues = BTreeMap<FieldKey, FieldValue>;

impl FormValues for DynamicValues {
    fn field_keys(&self) -> Vec<FieldKey> {
        self.keys().cloned().collect()
    }

    fn field(&self, key: &FieldKey) -> Option<FieldValue> {
        self.get(key).cloned()
    }

    fn set_field(&mut self, key: &FieldKey, value: FieldValue) -> Result<(), FormError> {
        self.insert(key.clone(), value);
        Ok(())
    }
}

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: FieldType;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

pub trait FormModel: FormValues {
    type Fields;

    fn fields() -> Self::Fields;
}
