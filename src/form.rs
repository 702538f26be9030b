//! Form aggregate root
//!
//! A [`Form`] owns the field model and the markup skeleton produced by the
//! parser, binds submitted data, runs the constraint pipeline, and renders
//! itself back to markup.

use crate::csrf::{self, CSRF_TOKEN_FIELD};
use crate::error::{FormError, FormResult};
use crate::field::{Field, FieldValue};
use crate::parser::{self, Node};
use crate::render;
use crate::source::{Origin, Source};
use std::collections::HashMap;
use std::ops::Index;

/// Construction-time configuration.
///
/// The CSRF secret is set once at process start and passed here; it is
/// never mutated afterwards. Without a secret the form parses and renders,
/// but [`Form::get_token`] and [`Form::posted`] fail.
#[derive(Debug, Clone, Default)]
pub struct FormConfig {
	csrf_secret: Option<String>,
}

impl FormConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the process-wide CSRF secret.
	///
	/// # Examples
	///
	/// ```
	/// use formelle::{Form, FormConfig};
	///
	/// let config = FormConfig::new().with_secret("s3cret");
	/// let form = Form::parse_with("<form><input name=\"a\" /></form>", config).unwrap();
	/// assert!(form.get_token().is_ok());
	/// ```
	pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
		self.csrf_secret = Some(secret.into());
		self
	}
}

/// A stateful, validated, re-renderable form.
pub struct Form {
	fields: Vec<Field>,
	index: HashMap<String, usize>,
	nodes: Vec<Node>,
	multipart: bool,
	/// Parse-time value snapshot, used by [`Form::reset`].
	initial: Vec<FieldValue>,
	token: Option<String>,
	data: Option<HashMap<String, serde_json::Value>>,
}

impl Form {
	/// Parse a source (template path or literal markup) without CSRF
	/// configuration.
	///
	/// # Examples
	///
	/// ```
	/// use formelle::Form;
	///
	/// let form = Form::parse("<form><input type=\"text\" name=\"foo\" value=\"bar\" /></form>").unwrap();
	/// assert_eq!(form.get_value("foo").unwrap().as_str(), Some("bar"));
	/// ```
	pub fn parse(source: &str) -> FormResult<Self> {
		Self::parse_with(source, FormConfig::default())
	}

	/// Parse a source with explicit configuration.
	pub fn parse_with(source: &str, config: FormConfig) -> FormResult<Self> {
		let source = Source::resolve(source)?;
		let output = parser::parse(&source.markup)?;

		let mut index = HashMap::new();
		for (i, field) in output.fields.iter().enumerate() {
			index.insert(field.name.clone(), i);
		}

		let identity = match &source.origin {
			Origin::File(path) => path.display().to_string(),
			Origin::Literal => structural_signature(&output.fields),
		};
		let token = config
			.csrf_secret
			.as_deref()
			.map(|secret| csrf::derive_token(secret, &identity));

		let initial = output.fields.iter().map(|f| f.value.clone()).collect();
		Ok(Self {
			fields: output.fields,
			index,
			nodes: output.nodes,
			multipart: output.multipart,
			initial,
			token,
			data: None,
		})
	}

	/// Store submitted request data for [`Form::posted`] and [`Form::check`].
	///
	/// Values are strings or one-level sequences of strings
	/// (`serde_json::Value` strings, numbers, arrays); deeper nesting is a
	/// validation failure, never a crash.
	pub fn bind(&mut self, data: HashMap<String, serde_json::Value>) {
		tracing::trace!(keys = data.len(), "bound submitted data");
		self.data = Some(data);
	}

	pub fn is_bound(&self) -> bool {
		self.data.is_some()
	}

	/// The form's CSRF token; fails when no secret was configured.
	///
	/// Deterministic: two forms parsed from the same source with the same
	/// secret share a token.
	pub fn get_token(&self) -> FormResult<String> {
		self.token.clone().ok_or(FormError::MissingSecret)
	}

	/// Whether the bound data carries this form's CSRF token.
	///
	/// Must be consulted before treating [`Form::check`] as meaningful;
	/// `check` does not call it implicitly.
	pub fn posted(&self) -> FormResult<bool> {
		let token = self.get_token()?;
		let submitted = self
			.data
			.as_ref()
			.and_then(|data| data.get(CSRF_TOKEN_FIELD))
			.and_then(|value| value.as_str());
		Ok(submitted.is_some_and(|s| csrf::token_matches(&token, s)))
	}

	/// Bind the submitted data onto every field and evaluate all
	/// constraints.
	///
	/// Returns field name → error messages; an empty map means the form is
	/// valid. Data-validity failures (shape mismatches, readonly
	/// violations, constraint failures) are always collected here, never
	/// returned as `Err`. An unbound form has nothing to validate and
	/// yields an empty map.
	///
	/// # Examples
	///
	/// ```
	/// use formelle::Form;
	/// use std::collections::HashMap;
	/// use serde_json::json;
	///
	/// let mut form =
	///     Form::parse("<form><input name=\"name\" required=\"required\" /></form>").unwrap();
	/// let mut data = HashMap::new();
	/// data.insert("name".to_string(), json!(""));
	/// form.bind(data);
	///
	/// let errors = form.check();
	/// assert!(errors.contains_key("name"));
	/// ```
	pub fn check(&mut self) -> HashMap<String, Vec<String>> {
		let Some(data) = self.data.clone() else {
			return HashMap::new();
		};

		let mut errors: HashMap<String, Vec<String>> = HashMap::new();
		for field in &mut self.fields {
			let (value, mut field_errors) = field.bind_submitted(data.get(&field.name));
			if let Some(value) = value {
				field.value = value;
			}
			// Shape and readonly violations preempt constraint evaluation.
			if field_errors.is_empty() {
				for constraint in &field.constraints {
					field_errors.extend(constraint.check(&field.value));
				}
			}
			if !field_errors.is_empty() {
				errors.insert(field.name.clone(), field_errors);
			}
		}
		tracing::trace!(invalid_fields = errors.len(), "checked form");
		errors
	}

	/// Current value of a field.
	pub fn get_value(&self, name: &str) -> Option<&FieldValue> {
		self.get(name).map(|field| &field.value)
	}

	/// Programmatic set: bypasses constraints and readonly protection but
	/// enforces the scalar/collection shape invariant.
	///
	/// # Examples
	///
	/// ```
	/// use formelle::Form;
	///
	/// let mut form = Form::parse("<form><input name=\"message\" /></form>").unwrap();
	/// form.set_value("message", "Setting a value").unwrap();
	/// assert!(form.render().contains("Setting a value"));
	/// assert!(form.set_value("message", vec!["not", "scalar"]).is_err());
	/// ```
	pub fn set_value(&mut self, name: &str, value: impl Into<FieldValue>) -> FormResult<()> {
		let idx = *self
			.index
			.get(name)
			.ok_or_else(|| FormError::UnknownField(name.to_string()))?;
		self.fields[idx].assign(value.into())
	}

	/// Set several values at once.
	pub fn set_values<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> FormResult<()>
	where
		K: AsRef<str>,
		V: Into<FieldValue>,
	{
		for (name, value) in values {
			self.set_value(name.as_ref(), value)?;
		}
		Ok(())
	}

	/// An attribute of a field, unknown/custom attributes included.
	pub fn get_attribute(&self, name: &str, attribute: &str) -> Option<&str> {
		self.get(name).and_then(|field| field.attribute(attribute))
	}

	/// Set or add an attribute on a field. Attribute mutations survive
	/// [`Form::reset`].
	pub fn set_attribute(
		&mut self,
		name: &str,
		attribute: &str,
		value: impl Into<String>,
	) -> FormResult<()> {
		let idx = *self
			.index
			.get(name)
			.ok_or_else(|| FormError::UnknownField(name.to_string()))?;
		self.fields[idx].set_attribute(attribute, value);
		Ok(())
	}

	/// Attach a custom constraint to a field, evaluated after the
	/// attribute-derived ones in registration order. The predicate
	/// receives each scalar element and returns `None` to accept or an
	/// error message to reject.
	///
	/// # Examples
	///
	/// ```
	/// use formelle::Form;
	///
	/// let mut form = Form::parse("<form><input name=\"name\" /></form>").unwrap();
	/// form.add_constraint("name", |value| {
	///     value.starts_with('J').then(|| "No J names.".to_string())
	/// })
	/// .unwrap();
	/// ```
	pub fn add_constraint<F>(&mut self, name: &str, predicate: F) -> FormResult<()>
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		let idx = *self
			.index
			.get(name)
			.ok_or_else(|| FormError::UnknownField(name.to_string()))?;
		self.fields[idx]
			.add_constraint(crate::constraint::Constraint::Custom(Box::new(predicate)));
		Ok(())
	}

	/// Restore every field's value to the parse-time snapshot.
	///
	/// Deliberately asymmetric: attribute and constraint mutations made
	/// after parsing are not rolled back.
	pub fn reset(&mut self) {
		for (field, initial) in self.fields.iter_mut().zip(&self.initial) {
			field.value = initial.clone();
		}
	}

	/// Regenerate markup from the skeleton and the current field state.
	pub fn render(&self) -> String {
		render::render_form(&self.nodes, &self.fields, self.multipart, self.token.as_deref())
	}

	/// Field lookup by name.
	pub fn get(&self, name: &str) -> Option<&Field> {
		self.index.get(name).map(|&idx| &self.fields[idx])
	}

	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	/// Whether rendering adds `enctype="multipart/form-data"`.
	pub fn multipart(&self) -> bool {
		self.multipart
	}

	/// The expected answer of the form's captcha field, if any. Exposed
	/// for tests and debugging.
	pub fn captcha_value(&self) -> Option<&str> {
		self.fields.iter().find_map(|field| field.captcha_value())
	}
}

impl std::fmt::Display for Form {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.render())
	}
}

impl Index<&str> for Form {
	type Output = Field;

	fn index(&self, name: &str) -> &Self::Output {
		self.get(name)
			.unwrap_or_else(|| panic!("Field '{}' not found", name))
	}
}

/// Identity key for literal sources: the ordered field structure.
///
/// The structure survives a render and re-parse cycle, so the derived
/// CSRF token, and with it the whole rendered output, stays byte-stable
/// across round trips.
fn structural_signature(fields: &[Field]) -> String {
	fields
		.iter()
		.map(|field| format!("{}:{}", field.name, field.kind.signature()))
		.collect::<Vec<_>>()
		.join(";")
}
