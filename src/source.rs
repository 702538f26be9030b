//! Template source resolution
//!
//! A form is constructed from a single string which is either a filesystem
//! path or literal markup. The heuristic is the one the rest of the crate
//! relies on: markup always contains `<`, a path never does.

use crate::error::{FormError, FormResult};
use std::fs;
use std::path::PathBuf;

/// Where a template came from. Used to derive the CSRF identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
	/// Loaded from a file; the path is the form's identity key.
	File(PathBuf),
	/// Given as literal markup; the identity key is derived from the
	/// parsed field structure instead.
	Literal,
}

/// Resolved raw markup plus its origin.
#[derive(Debug, Clone)]
pub struct Source {
	pub markup: String,
	pub origin: Origin,
}

impl Source {
	/// Resolve a source string into raw markup.
	///
	/// A string containing `<` is taken as literal markup; anything else
	/// is read from the filesystem, failing with
	/// [`FormError::SourceNotFound`] when unreadable.
	///
	/// # Examples
	///
	/// ```
	/// use formelle::source::{Origin, Source};
	///
	/// let source = Source::resolve("<form><input name=\"a\" /></form>").unwrap();
	/// assert_eq!(source.origin, Origin::Literal);
	///
	/// assert!(Source::resolve("/no/such/template.html").is_err());
	/// ```
	pub fn resolve(input: &str) -> FormResult<Self> {
		if input.contains('<') {
			return Ok(Self {
				markup: input.to_string(),
				origin: Origin::Literal,
			});
		}

		let path = PathBuf::from(input);
		match fs::read_to_string(&path) {
			Ok(markup) => Ok(Self {
				markup,
				origin: Origin::File(path),
			}),
			Err(_) => Err(FormError::SourceNotFound(input.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_literal_markup() {
		let source = Source::resolve("<form></form>").unwrap();
		assert_eq!(source.origin, Origin::Literal);
		assert_eq!(source.markup, "<form></form>");
	}

	#[test]
	fn test_file_source() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "<form><input type=\"text\" name=\"a\" /></form>").unwrap();

		let path = file.path().to_str().unwrap().to_string();
		let source = Source::resolve(&path).unwrap();
		assert_eq!(source.origin, Origin::File(file.path().to_path_buf()));
		assert!(source.markup.contains("name=\"a\""));
	}

	#[test]
	fn test_missing_file() {
		let err = Source::resolve("/definitely/not/here.html").unwrap_err();
		assert!(matches!(err, FormError::SourceNotFound(_)));
	}
}
