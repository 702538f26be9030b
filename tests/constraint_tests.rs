//! Constraint pipeline: attribute-derived, custom, and captcha checks
//! exercised through the submit path (bind + posted + check).

use formelle::{Form, FormConfig};
use serde_json::{Value, json};
use std::collections::HashMap;

fn config() -> FormConfig {
	FormConfig::new().with_secret("constraint-secret")
}

fn parse(markup: &str) -> Form {
	Form::parse_with(markup, config()).unwrap()
}

fn submit(form: &mut Form, entries: &[(&str, Value)]) -> HashMap<String, Vec<String>> {
	let mut data: HashMap<String, Value> = entries
		.iter()
		.map(|(k, v)| (k.to_string(), v.clone()))
		.collect();
	data.insert("csrf_token".to_string(), json!(form.get_token().unwrap()));
	form.bind(data);
	assert!(form.posted().unwrap());
	form.check()
}

fn assert_accept(form: &mut Form, entries: &[(&str, Value)]) {
	let errors = submit(form, entries);
	assert!(errors.is_empty(), "expected acceptance, got {errors:?}");
}

fn assert_refuse(form: &mut Form, entries: &[(&str, Value)]) {
	let errors = submit(form, entries);
	assert!(!errors.is_empty(), "expected refusal, form accepted");
}

#[test]
fn test_required() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" required=\"required\" />
	</form>";

	assert!(parse(markup).render().contains("required="));

	assert_accept(&mut parse(markup), &[("name", json!("Jack"))]);
	assert_refuse(&mut parse(markup), &[("name", json!(""))]);
	assert_refuse(&mut parse(markup), &[]);
	// "0" is a present value, not an empty one.
	assert_accept(&mut parse(markup), &[("name", json!("0"))]);
}

#[test]
fn test_scalar_field_refuses_array() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" required=\"required\" />
	</form>";
	assert_refuse(&mut parse(markup), &[("name", json!(["Jack", "Paul"]))]);
}

#[test]
fn test_optional() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" />
	</form>";

	assert!(!parse(markup).render().contains("required="));

	assert_accept(&mut parse(markup), &[("name", json!(""))]);
	assert_accept(&mut parse(markup), &[]);
	assert_accept(&mut parse(markup), &[("name", json!("Jack"))]);
}

#[test]
fn test_maxlength() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" maxlength=\"100\" />
	</form>";

	assert!(parse(markup).render().contains("maxlength="));

	assert_accept(&mut parse(markup), &[("name", json!("x".repeat(100)))]);
	assert_refuse(&mut parse(markup), &[("name", json!("x".repeat(101)))]);
}

#[test]
fn test_minlength_enforced_but_suppressed() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" minlength=\"10\" />
	</form>";

	assert!(!parse(markup).render().contains("minlength="));

	assert_accept(&mut parse(markup), &[("name", json!("x".repeat(10)))]);
	assert_refuse(&mut parse(markup), &[("name", json!("x".repeat(9)))]);
}

#[test]
fn test_pattern_enforced_but_suppressed() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" pattern=\"[a-z]+\" />
	</form>";

	assert!(!parse(markup).render().contains("pattern="));

	assert_accept(&mut parse(markup), &[("name", json!("hello"))]);
	// Anchored: a partial match is not enough.
	assert_refuse(&mut parse(markup), &[("name", json!("hm hm"))]);
}

#[test]
fn test_min_max_enforced_but_suppressed() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"num\" min=\"5\" max=\"10\" />
	</form>";

	let html = parse(markup).render();
	assert!(!html.contains("min="));
	assert!(!html.contains("max="));

	assert_accept(&mut parse(markup), &[("num", json!(7))]);
	assert_refuse(&mut parse(markup), &[("num", json!(3))]);
	assert_refuse(&mut parse(markup), &[("num", json!(13))]);
}

#[test]
fn test_custom_constraint() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" />
	</form>";

	let check = |form: &mut Form| {
		form.add_constraint("name", |value| {
			(value == "Jack").then(|| "This name is already taken.".to_string())
		})
		.unwrap();
	};

	let mut form = parse(markup);
	check(&mut form);
	assert_accept(&mut form, &[("name", json!("Paul"))]);

	let mut form = parse(markup);
	check(&mut form);
	assert_refuse(&mut form, &[("name", json!("Jack"))]);
}

#[test]
fn test_captcha() {
	let markup = "<form method=\"post\">
		<input type=\"captcha\" name=\"code\" />
	</form>";

	let mut form = parse(markup);
	let html = form.render();
	assert!(html.contains("<img"));
	assert!(html.contains("name=\"code\""));

	let answer = form.captcha_value().unwrap().to_string();
	assert_accept(&mut form, &[("code", json!(answer))]);

	// A fresh parse gets a fresh challenge; stale answers fail.
	assert_refuse(&mut parse(markup), &[("code", json!("xxx"))]);
}

#[test]
fn test_select_membership() {
	let markup = "<form method=\"post\">
		<select name=\"city\">
			<option value=\"la\">Los Angeles</option>
			<option value=\"ny\">New York</option>
		</select>
	</form>";

	assert_accept(&mut parse(markup), &[("city", json!("la"))]);
	assert_refuse(&mut parse(markup), &[("city", json!("xy"))]);
}

#[test]
fn test_radio_membership() {
	let markup = "<form method=\"post\">
		<input type=\"radio\" name=\"gender\" value=\"1\" />
		<input type=\"radio\" name=\"gender\" value=\"2\" />
	</form>";

	assert_accept(&mut parse(markup), &[("gender", json!("2"))]);
	assert_refuse(&mut parse(markup), &[("gender", json!("3"))]);
}

#[test]
fn test_multiple() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"names\" multiple=\"multiple\" required=\"required\" maxlength=\"20\" />
	</form>";

	let html = parse(markup).render();
	assert!(html.contains("<script"));
	assert!(html.contains("<a"));

	assert_accept(&mut parse(markup), &[("names", json!(["a", "b"]))]);
	// A scalar where a collection is expected binds nothing.
	assert_refuse(&mut parse(markup), &[("names", json!(""))]);
	// Element constraints apply to each entry.
	assert_refuse(&mut parse(markup), &[("names", json!(["x".repeat(25)]))]);
}

#[test]
fn test_nested_collections_are_refused() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"names\" multiple=\"multiple\" />
	</form>";
	assert_refuse(&mut parse(markup), &[("names", json!([["a", "b"]]))]);
}

#[test]
fn test_readonly() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"nom\" value=\"Jack\" readonly=\"readonly\" />
		<select name=\"color\" readonly=\"readonly\">
			<option value=\"g\" selected=\"selected\">Green</option>
			<option value=\"y\">Yellow</option>
		</select>
	</form>";

	let html = parse(markup).render();
	assert!(html.contains("Jack"));
	assert!(html.contains("selected="));

	assert_accept(&mut parse(markup), &[("nom", json!("Jack")), ("color", json!("g"))]);
	assert_refuse(&mut parse(markup), &[("nom", json!("Paul")), ("color", json!("g"))]);
	assert_refuse(&mut parse(markup), &[("nom", json!("Jack")), ("color", json!("y"))]);
}

#[test]
fn test_reset_restores_initial_values() {
	let markup = "<form method=\"post\">
		<input type=\"text\" name=\"name\" value=\"Jack\" />
	</form>";

	let mut form = parse(markup);
	assert_accept(&mut form, &[("name", json!("Paul"))]);
	assert_eq!(form.get_value("name").unwrap().as_str(), Some("Paul"));

	form.reset();
	assert_eq!(form.get_value("name").unwrap().as_str(), Some("Jack"));
}
