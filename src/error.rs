//! Error types for form parsing and manipulation
//!
//! Structural failures (a template that cannot be located or parsed, a
//! missing CSRF secret, a bad programmatic access) surface as [`FormError`].
//! Data-validity failures never do: they are collected per field by
//! [`Form::check`](crate::Form::check) so the caller can re-render the form
//! with inline messages.

/// Fatal errors raised by form construction and programmatic access.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
	/// The source string was treated as a template path but nothing
	/// readable exists there.
	#[error("template source not found: {0}")]
	SourceNotFound(String),
	/// The markup could not be turned into a field model.
	#[error("malformed template: {0}")]
	Parse(String),
	/// `get_token()` was called but no CSRF secret was configured.
	#[error("CSRF secret is not configured")]
	MissingSecret,
	/// A field name that does not exist in the form.
	#[error("unknown field: {0}")]
	UnknownField(String),
	/// A programmatic set tried to change the scalar/collection shape of
	/// a field. The shape is fixed by the field kind at parse time.
	#[error("field '{field}' expects a {expected} value")]
	Shape {
		field: String,
		expected: &'static str,
	},
}

pub type FormResult<T> = Result<T, FormError>;
