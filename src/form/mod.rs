mod binding;
mod controller;
mod validation;
mod values;


pub use artisan_form_derive::FormModel;
pub use binding::{ChangeEvent, FieldProps, HostEvent, InputKind};
pub use controller::{
    BlurRevalidation, FormConfig, FormController, FormError, FormId, FormOptions, FormSnapshot,
    ListenerId, SubmitOutcome,
};
pub use validation::{BoxedSubmitFuture, FieldErrors, FormValidator, SubmitError, SubmitHandler};
pub use values::{
    DynamicValues, FieldKey, FieldLens, FieldType, FieldValue, FormModel, FormValues, ValueKind,
};
