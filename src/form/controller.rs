use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::binding::ChangeEvent;
use super::validation::{FieldErrors, FormValidator, SubmitError, SubmitHandler};
use super::values::{FieldKey, FieldLens, FieldValue, FormValues, ValueKind};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "form-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurRevalidation {
    #[default]
    Field,
    Form,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub blur_revalidation: BlurRevalidation,
    /// Off by default: callers are expected to disable their submit control
    /// while `is_submitting` holds.
    pub guard_reentrant_submit: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("unknown field `{0}`")]
    UnknownField(FieldKey),
    #[error("field `{key}` expects {expected}, got {found}")]
    TypeMismatch {
        key: FieldKey,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("submit handler failed: {0}")]
    SubmitFailed(String),
    #[error("submit handler panicked: {0}")]
    SubmitPanicked(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    Skipped,
    Invalid(FieldErrors),
    /// Validation passed and no submit handler is configured.
    Validated,
    Submitted,
    Failed(FormError),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Validated | SubmitOutcome::Submitted)
    }
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<T> {
    pub values: T,
    pub errors: FieldErrors,
    pub touched: BTreeMap<FieldKey, bool>,
    pub is_submitting: bool,
    pub submit_count: u32,
    pub last_submit_error: Option<FormError>,
    pub revision: u64,
}

impl<T> FormSnapshot<T> {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_touched(&self, key: &str) -> bool {
        self.touched.get(key).copied().unwrap_or(false)
    }
}

pub struct FormConfig<T> {
    initial_values: T,
    options: FormOptions,
    validator: Option<Arc<dyn FormValidator<T>>>,
    submit_handler: Option<Arc<dyn SubmitHandler<T>>>,
}

impl<T> FormConfig<T>
where
    T: FormValues,
{
    pub fn new(initial_values: T) -> Self {
        Self {
            initial_values,
            options: FormOptions::default(),
            validator: None,
            submit_handler: None,
        }
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(mut self, validator: impl FormValidator<T> + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn on_submit(mut self, handler: impl SubmitHandler<T> + 'static) -> Self {
        self.submit_handler = Some(Arc::new(handler));
        self
    }
}

pub(super) struct FormState<T> {
    pub(super) id: FormId,
    pub(super) initial_values: T,
    pub(super) values: T,
    pub(super) errors: FieldErrors,
    pub(super) touched: BTreeMap<FieldKey, bool>,
    pub(super) in_flight: u32,
    pub(super) submit_generation: u64,
    pub(super) submit_count: u32,
    pub(super) last_submit_error: Option<FormError>,
    pub(super) revision: u64,
}

impl<T: Clone> FormState<T> {
    fn snapshot(&self) -> FormSnapshot<T> {
        FormSnapshot {
            values: self.values.clone(),
            errors: self.errors.clone(),
            touched: self.touched.clone(),
            is_submitting: self.in_flight > 0,
            submit_count: self.submit_count,
            last_submit_error: self.last_submit_error.clone(),
            revision: self.revision,
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

type Listener<T> = Arc<dyn Fn(&FormSnapshot<T>) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: BTreeMap<ListenerId, Listener<T>>,
}

/// Shared handle to one form's state. Clones refer to the same form.
#[derive(Clone)]
pub struct FormController<T>
where
    T: FormValues,
{
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormState<T>>>,
    pub(super) validator: Option<Arc<dyn FormValidator<T>>>,
    pub(super) submit_handler: Option<Arc<dyn SubmitHandler<T>>>,
    listeners: Arc<RwLock<Listeners<T>>>,
}

impl<T> FormController<T>
where
    T: FormValues,
{
    pub fn new(config: FormConfig<T>) -> Self {
        let FormConfig {
            initial_values,
            options,
            validator,
            submit_handler,
        } = config;
        Self {
            options,
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                initial_values: initial_values.clone(),
                values: initial_values,
                errors: FieldErrors::new(),
                touched: BTreeMap::new(),
                in_flight: 0,
                submit_generation: 0,
                submit_count: 0,
                last_submit_error: None,
                revision: 0,
            })),
            validator,
            submit_handler,
            listeners: Arc::new(RwLock::new(Listeners {
                next_id: 1,
                entries: BTreeMap::new(),
            })),
        }
    }

    pub fn form_id(&self) -> FormId {
        self.read_state().id
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn snapshot(&self) -> FormSnapshot<T> {
        self.read_state().snapshot()
    }

    pub fn values(&self) -> T {
        self.read_state().values.clone()
    }

    pub fn field_value(&self, key: &FieldKey) -> Option<FieldValue> {
        self.read_state().values.field(key)
    }

    pub fn is_submitting(&self) -> bool {
        self.read_state().in_flight > 0
    }

    pub fn handle_change(&self, event: ChangeEvent) {
        let (key, value) = event.into_field_value();
        self.set_field_value(key, value);
    }

    pub fn set_field_value(&self, key: impl Into<FieldKey>, value: impl Into<FieldValue>) {
        let key = key.into();
        if let Err(error) = self.try_set_field_value(&key, value.into()) {
            warn!(form_id = %self.form_id(), field = %key, error = %error, "Ignoring field write");
        }
    }

    pub(crate) fn try_set_field_value(
        &self,
        key: &FieldKey,
        value: FieldValue,
    ) -> Result<(), FormError> {
        {
            let mut state = self.write_state();
            state.values.set_field(key, value)?;
            state.bump();
        }
        self.notify();
        Ok(())
    }

    /// Dry run of a write against a copy of the current values.
    pub(crate) fn check_field_value(
        &self,
        key: &FieldKey,
        value: FieldValue,
    ) -> Result<(), FormError> {
        let mut values = self.values();
        values.set_field(key, value)
    }

    pub fn set<L>(&self, lens: L, value: L::Value)
    where
        L: FieldLens<T>,
    {
        {
            let mut state = self.write_state();
            lens.set(&mut state.values, value);
            state.bump();
        }
        self.notify();
    }

    pub fn value<L>(&self, lens: L) -> L::Value
    where
        L: FieldLens<T>,
    {
        lens.get(&self.read_state().values).clone()
    }

    pub fn handle_blur(&self, key: impl Into<FieldKey>) {
        let key = key.into();
        let values = {
            let mut state = self.write_state();
            state.touched.insert(key.clone(), true);
            state.bump();
            self.validator.as_ref().map(|_| state.values.clone())
        };

        if let Some(mut result) = values.and_then(|values| self.run_validator(&values)) {
            let mut state = self.write_state();
            match self.options.blur_revalidation {
                BlurRevalidation::Field => match result.remove(key.as_str()) {
                    Some(message) => {
                        state.errors.insert(key, message);
                    }
                    None => {
                        state.errors.remove(key.as_str());
                    }
                },
                BlurRevalidation::Form => state.errors = result,
            }
            state.bump();
        }
        self.notify();
    }

    pub fn set_field_error(&self, key: impl Into<FieldKey>, message: impl Into<String>) {
        {
            let mut state = self.write_state();
            state.errors.insert(key.into(), message.into());
            state.bump();
        }
        self.notify();
    }

    pub fn clear_field_error(&self, key: impl Into<FieldKey>) {
        let key = key.into();
        {
            let mut state = self.write_state();
            state.errors.remove(key.as_str());
            state.bump();
        }
        self.notify();
    }

    /// Merges externally produced errors (a server-side validation response)
    /// over the current map.
    pub fn set_field_errors(&self, errors: FieldErrors) {
        {
            let mut state = self.write_state();
            for (key, message) in errors {
                state.errors.insert(key, message);
            }
            state.bump();
        }
        self.notify();
    }

    pub fn set_field_touched(&self, key: impl Into<FieldKey>, is_touched: bool) {
        {
            let mut state = self.write_state();
            state.touched.insert(key.into(), is_touched);
            state.bump();
        }
        self.notify();
    }

    pub fn touch(&self, key: impl Into<FieldKey>) {
        self.set_field_touched(key, true);
    }

    pub fn validate_form(&self) -> FieldErrors {
        let values = self.values();
        let errors = self.run_validator(&values).unwrap_or_default();
        {
            let mut state = self.write_state();
            state.errors = errors.clone();
            state.bump();
        }
        self.notify();
        errors
    }

    /// Never fails: handler errors and panics are logged, recorded in
    /// `last_submit_error`, and reported as [`SubmitOutcome::Failed`].
    pub async fn handle_submit(&self) -> SubmitOutcome {
        let (form_id, prepared) = {
            let mut state = self.write_state();
            if self.options.guard_reentrant_submit && state.in_flight > 0 {
                debug!(form_id = %state.id, "Skipping submit while another one is in flight");
                return SubmitOutcome::Skipped;
            }
            state.submit_count = state.submit_count.saturating_add(1);
            state.last_submit_error = None;
            state.touched = state
                .values
                .field_keys()
                .into_iter()
                .map(|key| (key, true))
                .collect();
            let values = state.values.clone();
            let errors = self.run_validator(&values).unwrap_or_default();
            state.errors = errors.clone();
            state.bump();

            let prepared = if !errors.is_empty() {
                debug!(form_id = %state.id, invalid_fields = errors.len(), "Submit blocked by validation");
                Err(SubmitOutcome::Invalid(errors))
            } else if let Some(handler) = self.submit_handler.clone() {
                let in_flight = InFlightSubmit::enter(self, &mut state);
                Ok((handler, values, in_flight))
            } else {
                Err(SubmitOutcome::Validated)
            };
            (state.id, prepared)
        };
        self.notify();

        let (handler, values, in_flight) = match prepared {
            Ok(run) => run,
            Err(outcome) => return outcome,
        };
        debug!(form_id = %form_id, "Running submit handler");
        let attempt = async move { handler.submit(values).await };
        let result = AssertUnwindSafe(attempt).catch_unwind().await;
        let outcome = self.finish_submit(form_id, in_flight.generation, result);
        drop(in_flight);
        outcome
    }

    /// Restores the initial values and clears errors, touched flags and the
    /// submitting flag. `submit_count` is kept. Submits still in flight
    /// settle without touching the reset state.
    pub fn reset_form(&self) {
        {
            let mut state = self.write_state();
            state.values = state.initial_values.clone();
            state.errors = FieldErrors::new();
            state.touched.clear();
            state.in_flight = 0;
            state.submit_generation = state.submit_generation.wrapping_add(1);
            state.last_submit_error = None;
            state.bump();
        }
        self.notify();
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&FormSnapshot<T>) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.insert(id, Arc::new(listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(&id)
            .is_some()
    }

    fn finish_submit(
        &self,
        form_id: FormId,
        generation: u64,
        result: Result<Result<(), SubmitError>, Box<dyn Any + Send>>,
    ) -> SubmitOutcome {
        let error = match result {
            Ok(Ok(())) => {
                debug!(form_id = %form_id, "Submit handler finished");
                return SubmitOutcome::Submitted;
            }
            Ok(Err(error)) => FormError::SubmitFailed(error.to_string()),
            Err(payload) => FormError::SubmitPanicked(panic_message(payload.as_ref())),
        };
        warn!(form_id = %form_id, error = %error, "Submit handler failed");
        let mut state = self.write_state();
        if state.submit_generation == generation {
            state.last_submit_error = Some(error.clone());
        }
        SubmitOutcome::Failed(error)
    }

    fn run_validator(&self, values: &T) -> Option<FieldErrors> {
        self.validator
            .as_ref()
            .map(|validator| validator.validate(values))
    }

    pub(super) fn read_state(&self) -> RwLockReadGuard<'_, FormState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write_state(&self) -> RwLockWriteGuard<'_, FormState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .values()
            .cloned()
            .collect::<Vec<_>>();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Keeps `is_submitting` raised for one handler run. Dropping it lowers the
/// flag whether the handler finished, panicked, or the submit future itself
/// was dropped mid-await. A guard from before the last reset leaves the
/// counter alone.
struct InFlightSubmit<'a, T>
where
    T: FormValues,
{
    form: &'a FormController<T>,
    generation: u64,
}

impl<'a, T> InFlightSubmit<'a, T>
where
    T: FormValues,
{
    fn enter(form: &'a FormController<T>, state: &mut FormState<T>) -> Self {
        state.in_flight = state.in_flight.saturating_add(1);
        Self {
            form,
            generation: state.submit_generation,
        }
    }
}

impl<T> Drop for InFlightSubmit<'_, T>
where
    T: FormValues,
{
    fn drop(&mut self) {
        {
            let mut state = self.form.write_state();
            if state.submit_generation != self.generation {
                return;
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            state.bump();
        }
        self.form.notify();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
