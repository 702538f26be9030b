//! Template parser
//!
//! Walks raw markup, discovers form controls, and produces the field model
//! plus a skeleton: the markup with control-bearing nodes replaced by
//! placeholders the renderer refills. This is deliberately not a DOM:
//! only `form`, `input`, `select`/`option`, `textarea`, and the generated
//! collection widget are modeled; everything else passes through verbatim,
//! which keeps the parse, mutate, render cycle lossless.

use crate::captcha;
use crate::constraint::Constraint;
use crate::csrf::CSRF_TOKEN_FIELD;
use crate::error::{FormError, FormResult};
use crate::field::{ChoiceOption, Field, FieldKind, FieldValue, unescape_attribute};
use regex::Regex;
use std::collections::HashMap;

/// One node of the retained markup skeleton.
#[derive(Debug)]
pub(crate) enum Node {
	/// Verbatim markup the parser does not model.
	Text(String),
	/// The form-level wrapper tag; re-emitted with enctype and the CSRF
	/// input injected.
	FormOpen { attributes: Vec<(String, String)> },
	/// A control placeholder. `option` addresses one member of a radio or
	/// checkbox group; `None` means the field renders as a whole.
	Control { field: usize, option: Option<usize> },
}

#[derive(Debug)]
pub(crate) struct ParseOutput {
	pub nodes: Vec<Node>,
	pub fields: Vec<Field>,
	pub multipart: bool,
}

pub(crate) fn parse(markup: &str) -> FormResult<ParseOutput> {
	let mut parser = Parser {
		src: markup,
		pos: 0,
		text: String::new(),
		nodes: vec![],
		fields: vec![],
		index: HashMap::new(),
		multipart: false,
	};
	parser.run()?;
	parser.finalize();
	tracing::debug!(fields = parser.fields.len(), "parsed form template");
	Ok(ParseOutput {
		nodes: parser.nodes,
		fields: parser.fields,
		multipart: parser.multipart,
	})
}

struct RawTag {
	name: String,
	closing: bool,
	attributes: Vec<(String, String)>,
	start: usize,
	end: usize,
}

impl RawTag {
	fn attr(&self, key: &str) -> Option<&str> {
		self.attributes
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	fn has(&self, key: &str) -> bool {
		self.attributes.iter().any(|(k, _)| k == key)
	}
}

struct Parser<'a> {
	src: &'a str,
	pos: usize,
	text: String,
	nodes: Vec<Node>,
	fields: Vec<Field>,
	index: HashMap<String, usize>,
	multipart: bool,
}

fn is_name_byte(b: u8) -> bool {
	b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn read_tag(src: &str, start: usize) -> FormResult<RawTag> {
	let bytes = src.as_bytes();
	let len = bytes.len();
	let mut i = start + 1;
	let closing = bytes.get(i) == Some(&b'/');
	if closing {
		i += 1;
	}
	let name_start = i;
	while i < len && is_name_byte(bytes[i]) {
		i += 1;
	}
	if i == name_start {
		return Err(FormError::Parse(format!(
			"stray '<' at byte {start} is not a tag"
		)));
	}
	let name = src[name_start..i].to_ascii_lowercase();

	let mut attributes = vec![];
	loop {
		while i < len && bytes[i].is_ascii_whitespace() {
			i += 1;
		}
		if i >= len {
			return Err(FormError::Parse(format!("unterminated <{name}> tag")));
		}
		match bytes[i] {
			b'>' => {
				i += 1;
				break;
			}
			b'/' => {
				if bytes.get(i + 1) == Some(&b'>') {
					i += 2;
					break;
				}
				i += 1;
			}
			_ => {
				let key_start = i;
				while i < len
					&& !bytes[i].is_ascii_whitespace()
					&& bytes[i] != b'='
					&& bytes[i] != b'>'
					&& bytes[i] != b'/'
				{
					i += 1;
				}
				let key = src[key_start..i].to_ascii_lowercase();
				while i < len && bytes[i].is_ascii_whitespace() {
					i += 1;
				}
				let value = if i < len && bytes[i] == b'=' {
					i += 1;
					while i < len && bytes[i].is_ascii_whitespace() {
						i += 1;
					}
					if i < len && (bytes[i] == b'"' || bytes[i] == b'\'') {
						let quote = bytes[i];
						i += 1;
						let value_start = i;
						while i < len && bytes[i] != quote {
							i += 1;
						}
						if i >= len {
							return Err(FormError::Parse(format!(
								"unterminated attribute value in <{name}>"
							)));
						}
						let raw = &src[value_start..i];
						i += 1;
						unescape_attribute(raw)
					} else {
						let value_start = i;
						while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
							i += 1;
						}
						unescape_attribute(&src[value_start..i])
					}
				} else {
					// Boolean attribute, normalized to key="key" form.
					key.clone()
				};
				if !key.is_empty() {
					attributes.push((key, value));
				}
			}
		}
	}

	Ok(RawTag {
		name,
		closing,
		attributes,
		start,
		end: i,
	})
}

impl<'a> Parser<'a> {
	fn run(&mut self) -> FormResult<()> {
		let len = self.src.len();
		while self.pos < len {
			let rest = &self.src[self.pos..];
			let Some(offset) = rest.find('<') else {
				self.text.push_str(rest);
				self.pos = len;
				break;
			};
			self.text.push_str(&rest[..offset]);
			self.pos += offset;

			let after = &self.src[self.pos..];
			if after.starts_with("<!--") {
				match after.find("-->") {
					Some(end) => {
						self.text.push_str(&after[..end + 3]);
						self.pos += end + 3;
					}
					None => {
						self.text.push_str(after);
						self.pos = len;
					}
				}
				continue;
			}

			let next = after.as_bytes().get(1).copied();
			let is_tag_start =
				matches!(next, Some(b) if b.is_ascii_alphabetic() || b == b'/' || b == b'!');
			if !is_tag_start {
				self.text.push('<');
				self.pos += 1;
				continue;
			}

			let tag = read_tag(self.src, self.pos)?;
			if tag.closing {
				self.passthrough(&tag);
				continue;
			}
			match tag.name.as_str() {
				"form" => {
					self.flush_text();
					self.nodes.push(Node::FormOpen {
						attributes: tag.attributes.clone(),
					});
					self.pos = tag.end;
				}
				"input" => self.handle_input(tag)?,
				"select" => self.handle_select(tag)?,
				"textarea" => self.handle_textarea(tag)?,
				"span" if tag
					.attr("class")
					.is_some_and(|c| c.split_whitespace().any(|w| w == "multiple")) =>
				{
					self.handle_multiple_widget(tag)?
				}
				_ => self.passthrough(&tag),
			}
		}
		self.flush_text();
		Ok(())
	}

	fn passthrough(&mut self, tag: &RawTag) {
		self.text.push_str(&self.src[tag.start..tag.end]);
		self.pos = tag.end;
	}

	fn flush_text(&mut self) {
		if !self.text.is_empty() {
			self.nodes.push(Node::Text(std::mem::take(&mut self.text)));
		}
	}

	fn push_control(&mut self, field: usize, option: Option<usize>) {
		self.flush_text();
		self.nodes.push(Node::Control { field, option });
	}

	/// Register a freshly created field under its name.
	fn register(&mut self, field: Field) -> FormResult<usize> {
		let name = field.name.clone();
		if self.index.contains_key(&name) {
			return Err(FormError::Parse(format!(
				"field '{name}' redeclared with a different control type"
			)));
		}
		let idx = self.fields.len();
		self.fields.push(field);
		self.index.insert(name, idx);
		Ok(idx)
	}

	fn handle_input(&mut self, tag: RawTag) -> FormResult<()> {
		let input_type = tag.attr("type").unwrap_or("text").to_ascii_lowercase();
		let Some(raw_name) = tag.attr("name").map(str::to_string) else {
			self.passthrough(&tag);
			return Ok(());
		};

		// Buttons are presentation, not data.
		if matches!(input_type.as_str(), "submit" | "button" | "reset" | "image") {
			self.passthrough(&tag);
			return Ok(());
		}

		// The renderer injects the token input itself; swallowing it here
		// keeps re-parsing rendered output idempotent.
		if input_type == "hidden" && raw_name == CSRF_TOKEN_FIELD {
			self.pos = tag.end;
			return Ok(());
		}

		match input_type.as_str() {
			"radio" => self.handle_group_member(tag, raw_name, FieldKind::Radio),
			"checkbox" => self.handle_group_member(tag, raw_name, FieldKind::Checkbox),
			"file" => {
				self.multipart = true;
				let mut field = Field::new(raw_name, FieldKind::File);
				field.attributes = tag.attributes.clone();
				derive_constraints(&tag.attributes, &mut field)?;
				let idx = self.register(field)?;
				self.push_control(idx, None);
				self.pos = tag.end;
				Ok(())
			}
			"captcha" => {
				let challenge = captcha::generate_challenge();
				let mut field = Field::new(raw_name, FieldKind::Captcha);
				field.attributes = tag
					.attributes
					.iter()
					.map(|(k, v)| {
						if k == "type" {
							(k.clone(), "text".to_string())
						} else {
							(k.clone(), v.clone())
						}
					})
					.collect();
				derive_constraints(&tag.attributes, &mut field)?;
				field.add_constraint(Constraint::Captcha(challenge.clone()));
				field.challenge = Some(challenge);
				let idx = self.register(field)?;
				self.push_control(idx, None);
				self.pos = tag.end;
				Ok(())
			}
			_ => self.handle_value_input(tag, raw_name, &input_type),
		}
	}

	/// Text-like inputs: text, hidden, and the `multiple` collection form.
	fn handle_value_input(
		&mut self,
		tag: RawTag,
		raw_name: String,
		input_type: &str,
	) -> FormResult<()> {
		let name = raw_name.strip_suffix("[]").unwrap_or(&raw_name).to_string();
		let collection = tag.has("multiple") || raw_name.ends_with("[]");
		let value = tag.attr("value").unwrap_or("").to_string();

		if collection && let Some(&idx) = self.index.get(&name) {
			// Another element of an already-seen collection field.
			let field = &mut self.fields[idx];
			if field.kind != FieldKind::Multiple {
				return Err(FormError::Parse(format!(
					"field '{name}' redeclared with a different control type"
				)));
			}
			if let FieldValue::Items(items) = &mut field.value
				&& !value.is_empty()
			{
				items.push(value);
			}
			self.pos = tag.end;
			return Ok(());
		}

		let kind = if collection {
			FieldKind::Multiple
		} else if input_type == "hidden" {
			FieldKind::Hidden
		} else {
			FieldKind::Text
		};

		let mut field = Field::new(name.clone(), kind);
		field.attributes = tag
			.attributes
			.iter()
			.filter(|(k, _)| k != "value")
			.map(|(k, v)| {
				if k == "name" {
					(k.clone(), name.clone())
				} else {
					(k.clone(), v.clone())
				}
			})
			.collect();
		derive_constraints(&tag.attributes, &mut field)?;
		field.value = if collection {
			if value.is_empty() {
				FieldValue::Items(vec![])
			} else {
				FieldValue::Items(vec![value])
			}
		} else {
			FieldValue::Scalar(value)
		};
		let idx = self.register(field)?;
		self.push_control(idx, None);
		self.pos = tag.end;
		Ok(())
	}

	/// One radio button or checkbox. Members sharing a name form a group;
	/// a second checkbox upgrades the field to a collection.
	fn handle_group_member(
		&mut self,
		tag: RawTag,
		name: String,
		kind: FieldKind,
	) -> FormResult<()> {
		let option_value = tag.attr("value").unwrap_or("on").to_string();
		let checked = tag.has("checked");
		let option = ChoiceOption {
			value: option_value.clone(),
			label: String::new(),
			attributes: tag
				.attributes
				.iter()
				.filter(|(k, _)| k != "checked")
				.cloned()
				.collect(),
		};

		let idx = match self.index.get(&name).copied() {
			Some(idx) => {
				let field = &mut self.fields[idx];
				match (kind, field.kind) {
					(FieldKind::Radio, FieldKind::Radio) => {}
					(FieldKind::Checkbox, FieldKind::Checkbox) => {
						// Second checkbox with the same name: collection.
						field.kind = FieldKind::CheckboxGroup;
						let prior = match &field.value {
							FieldValue::Scalar(s) if !s.is_empty() => vec![s.clone()],
							_ => vec![],
						};
						field.value = FieldValue::Items(prior);
					}
					(FieldKind::Checkbox, FieldKind::CheckboxGroup) => {}
					_ => {
						return Err(FormError::Parse(format!(
							"field '{name}' redeclared with a different control type"
						)));
					}
				}
				idx
			}
			None => {
				let mut field = Field::new(name, kind);
				field.attributes = option.attributes.clone();
				derive_constraints(&tag.attributes, &mut field)?;
				self.register(field)?
			}
		};

		let field = &mut self.fields[idx];
		let option_index = field.options.len();
		field.options.push(option);
		if checked {
			match &mut field.value {
				FieldValue::Scalar(current) => *current = option_value,
				FieldValue::Items(items) => items.push(option_value),
			}
		}
		self.push_control(idx, Some(option_index));
		self.pos = tag.end;
		Ok(())
	}

	fn handle_select(&mut self, tag: RawTag) -> FormResult<()> {
		let Some(name) = tag.attr("name").map(str::to_string) else {
			// Nameless select cannot hold data; pass it through whole.
			let mut scan = tag.end;
			loop {
				let rest = &self.src[scan..];
				let offset = rest
					.find('<')
					.ok_or_else(|| FormError::Parse("unterminated <select>".to_string()))?;
				scan += offset;
				if self.src[scan..].to_ascii_lowercase().starts_with("</select") {
					let close = self.src[scan..]
						.find('>')
						.ok_or_else(|| FormError::Parse("unterminated </select>".to_string()))?;
					scan += close + 1;
					break;
				}
				scan += 1;
			}
			self.text.push_str(&self.src[tag.start..scan]);
			self.pos = scan;
			return Ok(());
		};

		let multi = tag.has("multiple");
		let kind = if multi {
			FieldKind::SelectMultiple
		} else {
			FieldKind::Select
		};
		let mut field = Field::new(name, kind);
		field.attributes = tag.attributes.clone();
		derive_constraints(&tag.attributes, &mut field)?;

		self.pos = tag.end;
		let mut selected = vec![];
		loop {
			let rest = &self.src[self.pos..];
			let offset = rest
				.find('<')
				.ok_or_else(|| FormError::Parse("unterminated <select>".to_string()))?;
			self.pos += offset;
			let rest = &self.src[self.pos..];
			if rest.to_ascii_lowercase().starts_with("</select") {
				let close = rest
					.find('>')
					.ok_or_else(|| FormError::Parse("unterminated </select>".to_string()))?;
				self.pos += close + 1;
				break;
			}
			let option_tag = read_tag(self.src, self.pos)?;
			if option_tag.closing || option_tag.name != "option" {
				// Whitespace and stray tags between options are dropped.
				self.pos = option_tag.end;
				continue;
			}
			let label_start = option_tag.end;
			let label_end = label_start
				+ self.src[label_start..]
					.find('<')
					.ok_or_else(|| FormError::Parse("unterminated <option>".to_string()))?;
			let label = unescape_attribute(&self.src[label_start..label_end]);
			let value = option_tag
				.attr("value")
				.map(str::to_string)
				.unwrap_or_else(|| label.clone());
			if option_tag.has("selected") {
				selected.push(value.clone());
			}
			field.options.push(ChoiceOption {
				value,
				label,
				attributes: option_tag
					.attributes
					.iter()
					.filter(|(k, _)| k != "selected")
					.cloned()
					.collect(),
			});
			self.pos = label_end;
			if self.src[self.pos..].to_ascii_lowercase().starts_with("</option") {
				let close_tag = read_tag(self.src, self.pos)?;
				self.pos = close_tag.end;
			}
		}

		field.value = if multi {
			FieldValue::Items(selected)
		} else {
			FieldValue::Scalar(selected.into_iter().next().unwrap_or_default())
		};
		let idx = self.register(field)?;
		self.push_control(idx, None);
		Ok(())
	}

	fn handle_textarea(&mut self, tag: RawTag) -> FormResult<()> {
		let Some(name) = tag.attr("name").map(str::to_string) else {
			self.passthrough(&tag);
			return Ok(());
		};

		let body_start = tag.end;
		let close = self.src[body_start..]
			.find("</textarea>")
			.ok_or_else(|| FormError::Parse("unterminated <textarea>".to_string()))?;
		let value = unescape_attribute(&self.src[body_start..body_start + close]);

		let mut field = Field::new(name, FieldKind::TextArea);
		field.attributes = tag.attributes.clone();
		derive_constraints(&tag.attributes, &mut field)?;
		field.value = FieldValue::Scalar(value);
		let idx = self.register(field)?;
		self.push_control(idx, None);
		self.pos = body_start + close + "</textarea>".len();
		Ok(())
	}

	/// Re-parse the renderer's own collection widget back into one field:
	/// a `span.multiple` wrapper holding one input per element, followed
	/// by a script block that is regenerated on render.
	fn handle_multiple_widget(&mut self, tag: RawTag) -> FormResult<()> {
		self.pos = tag.end;
		let mut inputs: Vec<Vec<(String, String)>> = vec![];
		loop {
			let rest = &self.src[self.pos..];
			let offset = rest
				.find('<')
				.ok_or_else(|| FormError::Parse("unterminated multiple widget".to_string()))?;
			self.pos += offset;
			if self.src[self.pos..].starts_with("</span") {
				let inner = read_tag(self.src, self.pos)?;
				self.pos = inner.end;
				break;
			}
			let inner = read_tag(self.src, self.pos)?;
			if !inner.closing && inner.name == "input" {
				inputs.push(inner.attributes.clone());
			}
			self.pos = inner.end;
		}
		if self.src[self.pos..].starts_with("<script") {
			let close = self.src[self.pos..]
				.find("</script>")
				.ok_or_else(|| FormError::Parse("unterminated widget script".to_string()))?;
			self.pos += close + "</script>".len();
		}

		let first = inputs
			.first()
			.ok_or_else(|| FormError::Parse("multiple widget without inputs".to_string()))?
			.clone();
		let raw_name = first
			.iter()
			.find(|(k, _)| k == "name")
			.map(|(_, v)| v.clone())
			.ok_or_else(|| FormError::Parse("multiple widget input without name".to_string()))?;
		let name = raw_name.strip_suffix("[]").unwrap_or(&raw_name).to_string();

		let mut field = Field::new(name.clone(), FieldKind::Multiple);
		field.attributes = first
			.iter()
			.filter(|(k, _)| k != "value")
			.map(|(k, v)| {
				if k == "name" {
					(k.clone(), name.clone())
				} else {
					(k.clone(), v.clone())
				}
			})
			.collect();
		derive_constraints(&first, &mut field)?;
		field.value = FieldValue::Items(
			inputs
				.iter()
				.map(|attrs| {
					attrs
						.iter()
						.find(|(k, _)| k == "value")
						.map(|(_, v)| v.clone())
						.unwrap_or_default()
				})
				.collect(),
		);
		let idx = self.register(field)?;
		self.push_control(idx, None);
		Ok(())
	}

	/// Attach choice-membership constraints once all options are known.
	fn finalize(&mut self) {
		for field in &mut self.fields {
			if matches!(
				field.kind,
				FieldKind::Radio
					| FieldKind::Checkbox
					| FieldKind::CheckboxGroup
					| FieldKind::Select
					| FieldKind::SelectMultiple
			) {
				let allowed = field
					.options
					.iter()
					.map(|option| option.value.clone())
					.collect();
				field.add_constraint(Constraint::Choice(allowed));
			}
		}
	}
}

/// Attribute-to-constraint mapping, in attribute declaration order.
fn derive_constraints(attrs: &[(String, String)], field: &mut Field) -> FormResult<()> {
	let mut range_done = false;
	for (key, value) in attrs {
		match key.as_str() {
			"required" => field.add_constraint(Constraint::Required),
			"maxlength" => {
				let max = value.parse().map_err(|_| {
					FormError::Parse(format!("invalid maxlength '{value}' on '{}'", field.name))
				})?;
				field.add_constraint(Constraint::MaxLength(max));
			}
			"minlength" => {
				let min = value.parse().map_err(|_| {
					FormError::Parse(format!("invalid minlength '{value}' on '{}'", field.name))
				})?;
				field.add_constraint(Constraint::MinLength(min));
			}
			"pattern" => {
				let re = Regex::new(&format!("^(?:{value})$")).map_err(|e| {
					FormError::Parse(format!("invalid pattern on '{}': {e}", field.name))
				})?;
				field.add_constraint(Constraint::Pattern(re));
			}
			"min" | "max" => {
				if range_done {
					continue;
				}
				range_done = true;
				let parse_bound = |bound: Option<&str>| -> FormResult<Option<f64>> {
					match bound {
						None => Ok(None),
						Some(raw) => raw.parse().map(Some).map_err(|_| {
							FormError::Parse(format!(
								"invalid numeric bound '{raw}' on '{}'",
								field.name
							))
						}),
					}
				};
				let min = parse_bound(lookup(attrs, "min"))?;
				let max = parse_bound(lookup(attrs, "max"))?;
				field.add_constraint(Constraint::Range { min, max });
			}
			"readonly" => field.readonly = true,
			_ => {}
		}
	}
	Ok(())
}

fn lookup<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
	attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}
