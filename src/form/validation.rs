use std::collections::BTreeMap;
use std::collections::btree_map;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::values::FieldKey;

/// Field name to message. A key counts as an error even when its message is
/// empty.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<FieldKey, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<FieldKey>, message: impl Into<String>) -> Self {
        self.insert(key, message);
        self
    }

    pub fn when(self, failed: bool, key: impl Into<FieldKey>, message: impl Into<String>) -> Self {
        if failed {
            self.with(key, message)
        } else {
            self
        }
    }

    pub fn insert(
        &mut self,
        key: impl Into<FieldKey>,
        message: impl Into<String>,
    ) -> Option<String> {
        self.0.insert(key.into(), message.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &str)> {
        self.0.iter().map(|(key, message)| (key, message.as_str()))
    }
}

impl<K, M> FromIterator<(K, M)> for FieldErrors
where
    K: Into<FieldKey>,
    M: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, M)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, message)| (key.into(), message.into()))
                .collect(),
        )
    }
}

impl IntoIterator for FieldErrors {
    type Item = (FieldKey, String);
    type IntoIter = btree_map::IntoIter<FieldKey, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub trait FormValidator<T>: Send + Sync {
    fn validate(&self, values: &T) -> FieldErrors;
}

impl<T, F> FormValidator<T> for F
where
    F: Fn(&T) -> FieldErrors + Send + Sync,
{
    fn validate(&self, values: &T) -> FieldErrors {
        (self)(values)
    }
}

pub type SubmitError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BoxedSubmitFuture =
    Pin<Box<dyn Future<Output = Result<(), SubmitError>> + Send + 'static>>;

/// The persistence action run after a successful validation pass. Receives a
/// copy of the values taken when the submit started.
pub trait SubmitHandler<T>: Send + Sync {
    fn submit(&self, values: T) -> BoxedSubmitFuture;
}

impl<T, F, Fut, E> SubmitHandler<T> for F
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<SubmitError> + 'static,
{
    fn submit(&self, values: T) -> BoxedSubmitFuture {
        let pending = (self)(values);
        Box::pin(async move { pending.await.map_err(Into::into) })
    }
}
