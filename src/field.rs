//! Field model: one form control, its attributes, value, and constraints

use crate::constraint::Constraint;
use crate::error::{FormError, FormResult};

/// The current value of a field. The shape (scalar vs. collection) is
/// fixed by the field kind at parse time and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
	Scalar(String),
	Items(Vec<String>),
}

impl FieldValue {
	/// The scalar content, if this is a scalar value.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Scalar(s) => Some(s),
			Self::Items(_) => None,
		}
	}

	/// The elements, if this is a collection value.
	pub fn as_items(&self) -> Option<&[String]> {
		match self {
			Self::Scalar(_) => None,
			Self::Items(items) => Some(items),
		}
	}

	/// True for an empty string or a collection with no non-empty element.
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Scalar(s) => s.is_empty(),
			Self::Items(items) => items.iter().all(|item| item.is_empty()),
		}
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::Scalar(value.to_string())
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::Scalar(value)
	}
}

impl From<Vec<String>> for FieldValue {
	fn from(items: Vec<String>) -> Self {
		Self::Items(items)
	}
}

impl From<Vec<&str>> for FieldValue {
	fn from(items: Vec<&str>) -> Self {
		Self::Items(items.into_iter().map(str::to_string).collect())
	}
}

/// What sort of control a field is. Decided once by the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	/// `<input>` with a text-like type (text, password, email, ...).
	Text,
	/// `<textarea>`; the value is the element text.
	TextArea,
	/// `<input type="hidden">`.
	Hidden,
	/// A single `<input type="checkbox">`; the `value` attribute is the
	/// submit value, the field value is that string when checked.
	Checkbox,
	/// A group of `<input type="radio">` sharing one name.
	Radio,
	/// `<select>` without `multiple`.
	Select,
	/// `<select multiple>`; collection-shaped.
	SelectMultiple,
	/// Several checkboxes sharing one name; collection-shaped.
	CheckboxGroup,
	/// A text input with the `multiple` attribute: a collection of free
	/// text elements rendered as an add/remove widget.
	Multiple,
	/// `<input type="file">`; flips the form to multipart encoding.
	File,
	/// The reserved captcha control; carries a generated challenge.
	Captcha,
}

impl FieldKind {
	/// Whether values of this kind are collections.
	pub fn is_collection(self) -> bool {
		matches!(self, Self::SelectMultiple | Self::CheckboxGroup | Self::Multiple)
	}

	pub(crate) fn signature(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::TextArea => "textarea",
			Self::Hidden => "hidden",
			Self::Checkbox => "checkbox",
			Self::Radio => "radio",
			Self::Select => "select",
			Self::SelectMultiple => "select-multiple",
			Self::CheckboxGroup => "checkbox-group",
			Self::Multiple => "multiple",
			Self::File => "file",
			// A captcha renders as a plain text input, so a re-parse of
			// the output must derive the same signature.
			Self::Captcha => "text",
		}
	}
}

/// One declared choice of a choice-shaped field.
///
/// For `<select>` this is an `<option>` (attributes minus `selected`,
/// label text). For radio and checkbox groups it is one `<input>` of the
/// group, attributes minus `checked`.
#[derive(Debug, Clone)]
pub struct ChoiceOption {
	/// The submit value: the `value` attribute, falling back to the
	/// option label for `<option>` and to `on` for inputs.
	pub value: String,
	/// Option label text; empty for radio/checkbox group members.
	pub label: String,
	/// Attributes preserved verbatim for re-rendering.
	pub attributes: Vec<(String, String)>,
}

/// One form control: name, kind, attributes, current value, constraints.
pub struct Field {
	pub name: String,
	pub kind: FieldKind,
	/// Insertion-ordered attributes, unknown ones preserved verbatim.
	pub attributes: Vec<(String, String)>,
	pub value: FieldValue,
	pub options: Vec<ChoiceOption>,
	pub readonly: bool,
	pub(crate) constraints: Vec<Constraint>,
	pub(crate) challenge: Option<String>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("attributes", &self.attributes)
			.field("value", &self.value)
			.field("readonly", &self.readonly)
			.field("constraints", &self.constraints.len())
			.finish()
	}
}

impl Field {
	pub(crate) fn new(name: String, kind: FieldKind) -> Self {
		let value = if kind.is_collection() {
			FieldValue::Items(vec![])
		} else {
			FieldValue::Scalar(String::new())
		};
		Self {
			name,
			kind,
			attributes: vec![],
			value,
			options: vec![],
			readonly: false,
			constraints: vec![],
			challenge: None,
		}
	}

	/// Look up an attribute by name.
	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(key, _)| key == name)
			.map(|(_, value)| value.as_str())
	}

	/// Set or append an attribute, keeping insertion order for new ones.
	pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
		let value = value.into();
		if let Some(entry) = self.attributes.iter_mut().find(|(key, _)| key == name) {
			entry.1 = value;
		} else {
			self.attributes.push((name.to_string(), value));
		}
	}

	/// The expected captcha answer, when this is a captcha field.
	pub fn captcha_value(&self) -> Option<&str> {
		self.challenge.as_deref()
	}

	pub(crate) fn add_constraint(&mut self, constraint: Constraint) {
		self.constraints.push(constraint);
	}

	/// Programmatic assignment: bypasses constraints and readonly, but the
	/// shape invariant always holds.
	pub(crate) fn assign(&mut self, value: FieldValue) -> FormResult<()> {
		match (self.kind.is_collection(), &value) {
			(true, FieldValue::Items(_)) | (false, FieldValue::Scalar(_)) => {
				self.value = value;
				Ok(())
			}
			(true, FieldValue::Scalar(_)) => Err(FormError::Shape {
				field: self.name.clone(),
				expected: "collection",
			}),
			(false, FieldValue::Items(_)) => Err(FormError::Shape {
				field: self.name.clone(),
				expected: "scalar",
			}),
		}
	}

	/// Shape submitted data onto this field.
	///
	/// Returns the value to store (if any) and the binding errors. Shape
	/// violations and readonly violations are reported here and leave the
	/// stored value untouched.
	pub(crate) fn bind_submitted(
		&self,
		raw: Option<&serde_json::Value>,
	) -> (Option<FieldValue>, Vec<String>) {
		let mut errors = vec![];

		let incoming = if self.kind.is_collection() {
			match raw {
				None => FieldValue::Items(vec![]),
				Some(serde_json::Value::Array(items)) => {
					let mut elements = Vec::with_capacity(items.len());
					for item in items {
						match scalar_text(item) {
							Some(text) => elements.push(text),
							None => errors
								.push("Nested values are not allowed.".to_string()),
						}
					}
					if !errors.is_empty() {
						return (None, errors);
					}
					FieldValue::Items(elements)
				}
				// A scalar submitted to a collection field binds as empty.
				Some(_) => FieldValue::Items(vec![]),
			}
		} else {
			match raw {
				None => FieldValue::Scalar(String::new()),
				Some(serde_json::Value::Array(_)) => {
					errors.push("Expected a single value, got a list.".to_string());
					return (None, errors);
				}
				Some(value) => match scalar_text(value) {
					Some(text) => FieldValue::Scalar(text),
					None => {
						errors.push("Unsupported value type.".to_string());
						return (None, errors);
					}
				},
			}
		};

		if self.readonly && incoming != self.value {
			errors.push("This field is read-only and cannot be changed.".to_string());
			return (None, errors);
		}

		(Some(incoming), errors)
	}
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
	match value {
		serde_json::Value::String(s) => Some(s.clone()),
		serde_json::Value::Number(n) => Some(n.to_string()),
		serde_json::Value::Bool(b) => Some(if *b { "1".to_string() } else { String::new() }),
		_ => None,
	}
}

/// Escape a string for use inside a double-quoted HTML attribute.
pub fn escape_attribute(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for ch in value.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			_ => out.push(ch),
		}
	}
	out
}

/// Inverse of [`escape_attribute`], also accepting `&#39;`.
pub(crate) fn unescape_attribute(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	let mut rest = value;
	while let Some(pos) = rest.find('&') {
		out.push_str(&rest[..pos]);
		rest = &rest[pos..];
		let mut replaced = false;
		for (entity, ch) in [
			("&amp;", '&'),
			("&lt;", '<'),
			("&gt;", '>'),
			("&quot;", '"'),
			("&#39;", '\''),
		] {
			if let Some(tail) = rest.strip_prefix(entity) {
				out.push(ch);
				rest = tail;
				replaced = true;
				break;
			}
		}
		if !replaced {
			out.push('&');
			rest = &rest[1..];
		}
	}
	out.push_str(rest);
	out
}
