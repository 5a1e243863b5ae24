use std::future::Future;

use super::controller::{FormController, SubmitOutcome};
use super::values::{FieldKey, FieldValue, FormValues};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Checkbox,
    Select,
    File,
}

impl InputKind {
    pub fn is_boolean(self) -> bool {
        matches!(self, InputKind::Checkbox)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub field: FieldKey,
    pub kind: InputKind,
    pub value: FieldValue,
    pub checked: bool,
}

impl ChangeEvent {
    pub fn new(field: impl Into<FieldKey>, kind: InputKind, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            kind,
            value: value.into(),
            checked: false,
        }
    }

    pub fn text(field: impl Into<FieldKey>, value: impl Into<String>) -> Self {
        Self::new(field, InputKind::Text, FieldValue::Text(value.into()))
    }

    pub fn number(field: impl Into<FieldKey>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, InputKind::Number, value)
    }

    pub fn select(field: impl Into<FieldKey>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, InputKind::Select, value)
    }

    pub fn checkbox(field: impl Into<FieldKey>, checked: bool) -> Self {
        Self {
            checked,
            ..Self::new(field, InputKind::Checkbox, FieldValue::Null)
        }
    }

    /// Checkbox-like inputs store their checked flag; everything else stores
    /// the raw value as is.
    pub fn into_field_value(self) -> (FieldKey, FieldValue) {
        let value = if self.kind.is_boolean() {
            FieldValue::Bool(self.checked)
        } else {
            self.value
        };
        (self.field, value)
    }
}

pub trait HostEvent {
    fn prevent_default(&mut self);
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldProps {
    pub value: Option<FieldValue>,
    pub error: Option<String>,
    pub touched: bool,
    pub disabled: bool,
}

impl<T> FormController<T>
where
    T: FormValues,
{
    pub fn handle_submit_event<'a>(
        &'a self,
        event: &mut dyn HostEvent,
    ) -> impl Future<Output = SubmitOutcome> + use<'a, T> {
        event.prevent_default();
        self.handle_submit()
    }

    /// The field's error, only once the field has been touched.
    pub fn field_error_for_display(&self, key: impl Into<FieldKey>) -> Option<String> {
        let key = key.into();
        let state = self.read_state();
        if !state.touched.get(&key).copied().unwrap_or(false) {
            return None;
        }
        state.errors.get(key.as_str()).map(str::to_owned)
    }

    pub fn field_props(&self, key: impl Into<FieldKey>) -> FieldProps {
        let key = key.into();
        let state = self.read_state();
        let touched = state.touched.get(&key).copied().unwrap_or(false);
        FieldProps {
            value: state.values.field(&key),
            error: touched
                .then(|| state.errors.get(key.as_str()).map(str::to_owned))
                .flatten(),
            touched,
            disabled: state.in_flight > 0,
        }
    }
}
