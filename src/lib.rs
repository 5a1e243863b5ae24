pub mod form;
pub mod prelude;
pub mod upload;
