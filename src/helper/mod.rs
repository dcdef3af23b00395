pub mod form_helpers;
