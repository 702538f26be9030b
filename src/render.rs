//! Renderer: skeleton + current field state back to markup
//!
//! Emission is normalized (one space between attributes, `attr="value"`,
//! self-closing inputs) so that parsing the renderer's own output and
//! rendering again is byte-stable. Constraint-only attributes are enforced
//! but never echoed back to the client.

use crate::captcha;
use crate::csrf::CSRF_TOKEN_FIELD;
use crate::field::{Field, FieldKind, FieldValue, escape_attribute};
use crate::parser::Node;

/// Attributes that drive validation only; they never appear in output.
const SUPPRESSED: [&str; 4] = ["minlength", "pattern", "min", "max"];

const WIDGET_SCRIPT: &str = concat!(
	"<script type=\"text/javascript\">",
	"(function(){var widget=document.currentScript.previousElementSibling;",
	"widget.addEventListener('click',function(event){var target=event.target;",
	"if(target.tagName!=='A'){return;}event.preventDefault();",
	"if(target.className==='multiple-add'){",
	"var input=widget.querySelector('input').cloneNode(false);input.value='';",
	"var remove=document.createElement('a');remove.href='#';",
	"remove.className='multiple-remove';remove.textContent='-';",
	"widget.insertBefore(input,target);widget.insertBefore(remove,target);}",
	"else if(target.className==='multiple-remove'){",
	"widget.removeChild(target.previousElementSibling);widget.removeChild(target);}});",
	"})();</script>"
);

pub(crate) fn render_form(
	nodes: &[Node],
	fields: &[Field],
	multipart: bool,
	token: Option<&str>,
) -> String {
	let mut out = String::new();
	for node in nodes {
		match node {
			Node::Text(text) => out.push_str(text),
			Node::FormOpen { attributes } => {
				out.push_str("<form");
				push_attributes(&mut out, attributes, false);
				if multipart && !attributes.iter().any(|(k, _)| k == "enctype") {
					out.push_str(" enctype=\"multipart/form-data\"");
				}
				out.push('>');
				if let Some(token) = token {
					out.push_str(&format!(
						"<input type=\"hidden\" name=\"{}\" value=\"{}\" />",
						CSRF_TOKEN_FIELD,
						escape_attribute(token)
					));
				}
			}
			Node::Control { field, option } => {
				render_control(&mut out, &fields[*field], *option);
			}
		}
	}
	out
}

fn render_control(out: &mut String, field: &Field, option: Option<usize>) {
	match field.kind {
		FieldKind::Text | FieldKind::Hidden => {
			emit_input(out, &field.attributes, field.value.as_str(), false);
		}
		FieldKind::File => emit_input(out, &field.attributes, None, false),
		FieldKind::TextArea => {
			out.push_str("<textarea");
			push_attributes(out, &field.attributes, true);
			out.push('>');
			out.push_str(&escape_attribute(field.value.as_str().unwrap_or_default()));
			out.push_str("</textarea>");
		}
		FieldKind::Captcha => {
			if let Some(challenge) = field.captcha_value() {
				out.push_str(&format!(
					"<img src=\"captcha/{}.png\" alt=\"captcha\" />",
					captcha::image_reference(challenge)
				));
			}
			// The expected value is never echoed back.
			emit_input(out, &field.attributes, None, false);
		}
		FieldKind::Radio | FieldKind::Checkbox | FieldKind::CheckboxGroup => {
			let Some(choice) = option.and_then(|i| field.options.get(i)) else {
				return;
			};
			let checked = match &field.value {
				FieldValue::Scalar(current) => !current.is_empty() && *current == choice.value,
				FieldValue::Items(items) => items.iter().any(|item| *item == choice.value),
			};
			emit_input(out, &choice.attributes, None, checked);
		}
		FieldKind::Select | FieldKind::SelectMultiple => {
			out.push_str("<select");
			push_attributes(out, &field.attributes, true);
			out.push('>');
			for choice in &field.options {
				let selected = match &field.value {
					FieldValue::Scalar(current) => {
						!current.is_empty() && *current == choice.value
					}
					FieldValue::Items(items) => items.iter().any(|item| *item == choice.value),
				};
				out.push_str("<option");
				push_attributes(out, &choice.attributes, true);
				if selected {
					out.push_str(" selected=\"selected\"");
				}
				out.push('>');
				out.push_str(&escape_attribute(&choice.label));
				out.push_str("</option>");
			}
			out.push_str("</select>");
		}
		FieldKind::Multiple => render_multiple_widget(out, field),
	}
}

/// The add/remove widget for collection text fields. Re-parsed as a unit:
/// the parser folds the wrapper, inputs, anchors, and trailing script back
/// into a single field.
fn render_multiple_widget(out: &mut String, field: &Field) {
	let empty = [String::new()];
	let elements: &[String] = match field.value.as_items() {
		Some(items) if !items.is_empty() => items,
		_ => &empty,
	};

	out.push_str("<span class=\"multiple\">");
	for element in elements {
		emit_collection_input(out, field, element);
		out.push_str("<a href=\"#\" class=\"multiple-remove\">-</a>");
	}
	out.push_str("<a href=\"#\" class=\"multiple-add\">+</a></span>");
	out.push_str(WIDGET_SCRIPT);
}

fn emit_collection_input(out: &mut String, field: &Field, element: &str) {
	out.push_str("<input");
	for (key, value) in &field.attributes {
		if SUPPRESSED.contains(&key.as_str()) {
			continue;
		}
		if key == "name" {
			out.push_str(&format!(" name=\"{}[]\"", escape_attribute(&field.name)));
		} else {
			out.push_str(&format!(" {}=\"{}\"", key, escape_attribute(value)));
		}
	}
	if !element.is_empty() {
		out.push_str(&format!(" value=\"{}\"", escape_attribute(element)));
	}
	out.push_str(" />");
}

fn emit_input(
	out: &mut String,
	attributes: &[(String, String)],
	value: Option<&str>,
	checked: bool,
) {
	out.push_str("<input");
	push_attributes(out, attributes, true);
	if let Some(value) = value
		&& !value.is_empty()
	{
		out.push_str(&format!(" value=\"{}\"", escape_attribute(value)));
	}
	if checked {
		out.push_str(" checked=\"checked\"");
	}
	out.push_str(" />");
}

fn push_attributes(out: &mut String, attributes: &[(String, String)], suppress: bool) {
	for (key, value) in attributes {
		if suppress && SUPPRESSED.contains(&key.as_str()) {
			continue;
		}
		out.push_str(&format!(" {}=\"{}\"", key, escape_attribute(value)));
	}
}
