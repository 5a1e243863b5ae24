pub use crate::form::{
    BlurRevalidation, ChangeEvent, DynamicValues, FieldErrors, FieldKey, FieldLens, FieldProps,
    FieldValue, FormConfig, FormController, FormModel, FormOptions, FormSnapshot, FormValues,
    HostEvent, InputKind, SubmitOutcome,
};
pub use crate::upload::{ImageFile, ImageUploader, UploadError, UploadOptions, UploadedImage};
