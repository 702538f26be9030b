//! Constraint engine
//!
//! Built-in constraints are derived from HTML attributes at parse time;
//! custom constraints wrap an opaque predicate. Every constraint attached
//! to a field runs independently and the error messages concatenate, so a
//! field can report several problems at once.

use crate::field::FieldValue;
use regex::Regex;

/// Predicate for custom constraints: `None` means the value is accepted,
/// `Some(message)` rejects it.
pub type Predicate = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A named rule a field's value must satisfy.
///
/// Length, pattern, range, and choice checks skip empty values: emptiness
/// is owned by [`Constraint::Required`], matching HTML5 semantics. On
/// collection fields every element is checked independently.
pub enum Constraint {
	Required,
	MaxLength(usize),
	MinLength(usize),
	Pattern(Regex),
	Range { min: Option<f64>, max: Option<f64> },
	Choice(Vec<String>),
	Captcha(String),
	Custom(Predicate),
}

impl std::fmt::Debug for Constraint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Required => write!(f, "Required"),
			Self::MaxLength(n) => write!(f, "MaxLength({n})"),
			Self::MinLength(n) => write!(f, "MinLength({n})"),
			Self::Pattern(re) => write!(f, "Pattern({})", re.as_str()),
			Self::Range { min, max } => write!(f, "Range({min:?}, {max:?})"),
			Self::Choice(allowed) => write!(f, "Choice({allowed:?})"),
			Self::Captcha(_) => write!(f, "Captcha"),
			Self::Custom(_) => write!(f, "Custom"),
		}
	}
}

impl Constraint {
	/// Evaluate against a bound value. An empty vec means acceptance.
	pub fn check(&self, value: &FieldValue) -> Vec<String> {
		match value {
			FieldValue::Scalar(s) => self.check_scalar(s).into_iter().collect(),
			FieldValue::Items(items) => match self {
				// Required looks at the collection as a whole.
				Self::Required => {
					if value.is_empty() {
						vec!["This field is required.".to_string()]
					} else {
						vec![]
					}
				}
				_ => items
					.iter()
					.filter_map(|item| self.check_scalar(item))
					.collect(),
			},
		}
	}

	fn check_scalar(&self, value: &str) -> Option<String> {
		match self {
			Self::Required => value
				.is_empty()
				.then(|| "This field is required.".to_string()),
			Self::MaxLength(max) => {
				let count = value.chars().count();
				(!value.is_empty() && count > *max).then(|| {
					format!(
						"Ensure this value has at most {} characters (it has {}).",
						max, count
					)
				})
			}
			Self::MinLength(min) => {
				let count = value.chars().count();
				(!value.is_empty() && count < *min).then(|| {
					format!(
						"Ensure this value has at least {} characters (it has {}).",
						min, count
					)
				})
			}
			Self::Pattern(re) => {
				(!value.is_empty() && !re.is_match(value))
					.then(|| "Enter a value matching the required format.".to_string())
			}
			Self::Range { min, max } => {
				if value.is_empty() {
					return None;
				}
				let number: f64 = match value.parse() {
					Ok(n) => n,
					Err(_) => return Some("Enter a number.".to_string()),
				};
				if let Some(min) = min
					&& number < *min
				{
					return Some(format!(
						"Ensure this value is greater than or equal to {}.",
						min
					));
				}
				if let Some(max) = max
					&& number > *max
				{
					return Some(format!(
						"Ensure this value is less than or equal to {}.",
						max
					));
				}
				None
			}
			Self::Choice(allowed) => {
				(!value.is_empty() && !allowed.iter().any(|choice| choice == value)).then(
					|| {
						format!(
							"Select a valid choice: '{}' is not one of the available choices.",
							value
						)
					},
				)
			}
			Self::Captcha(expected) => {
				(value != expected).then(|| "The verification code does not match.".to_string())
			}
			Self::Custom(predicate) => predicate(value),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn scalar(s: &str) -> FieldValue {
		FieldValue::Scalar(s.to_string())
	}

	#[rstest]
	#[case("", false)]
	#[case("jack", true)]
	#[case("0", true)]
	fn test_required(#[case] value: &str, #[case] accepted: bool) {
		let errors = Constraint::Required.check(&scalar(value));
		assert_eq!(errors.is_empty(), accepted);
	}

	#[test]
	fn test_required_collection() {
		let required = Constraint::Required;
		assert!(!required.check(&FieldValue::Items(vec![])).is_empty());
		assert!(
			!required
				.check(&FieldValue::Items(vec![String::new()]))
				.is_empty()
		);
		assert!(
			required
				.check(&FieldValue::Items(vec!["a".to_string(), "b".to_string()]))
				.is_empty()
		);
	}

	#[rstest]
	#[case(100, true)]
	#[case(101, false)]
	fn test_max_length_boundary(#[case] len: usize, #[case] accepted: bool) {
		let constraint = Constraint::MaxLength(100);
		let errors = constraint.check(&scalar(&"x".repeat(len)));
		assert_eq!(errors.is_empty(), accepted);
	}

	#[rstest]
	#[case(10, true)]
	#[case(9, false)]
	fn test_min_length_boundary(#[case] len: usize, #[case] accepted: bool) {
		let constraint = Constraint::MinLength(10);
		let errors = constraint.check(&scalar(&"x".repeat(len)));
		assert_eq!(errors.is_empty(), accepted);
	}

	#[test]
	fn test_lengths_count_characters_not_bytes() {
		let constraint = Constraint::MaxLength(5);
		assert!(constraint.check(&scalar("こんにちは")).is_empty());
		assert!(!constraint.check(&scalar("こんにちは!")).is_empty());
	}

	#[test]
	fn test_length_skips_empty_values() {
		assert!(Constraint::MinLength(10).check(&scalar("")).is_empty());
		assert!(Constraint::MaxLength(3).check(&scalar("")).is_empty());
	}

	#[test]
	fn test_pattern() {
		let constraint = Constraint::Pattern(Regex::new("^(?:[a-z]+)$").unwrap());
		assert!(constraint.check(&scalar("hello")).is_empty());
		assert!(!constraint.check(&scalar("hm hm")).is_empty());
		assert!(constraint.check(&scalar("")).is_empty());
	}

	#[rstest]
	#[case("7", true)]
	#[case("3", false)]
	#[case("13", false)]
	#[case("abc", false)]
	#[case("", true)]
	fn test_range(#[case] value: &str, #[case] accepted: bool) {
		let constraint = Constraint::Range {
			min: Some(5.0),
			max: Some(10.0),
		};
		assert_eq!(constraint.check(&scalar(value)).is_empty(), accepted);
	}

	#[test]
	fn test_choice_membership() {
		let constraint = Constraint::Choice(vec!["la".to_string(), "ny".to_string()]);
		assert!(constraint.check(&scalar("la")).is_empty());
		assert!(!constraint.check(&scalar("xy")).is_empty());
		assert!(constraint.check(&scalar("")).is_empty());
	}

	#[test]
	fn test_captcha_is_case_sensitive() {
		let constraint = Constraint::Captcha("AbC123".to_string());
		assert!(constraint.check(&scalar("AbC123")).is_empty());
		assert!(!constraint.check(&scalar("abc123")).is_empty());
	}

	#[test]
	fn test_custom_predicate() {
		let constraint = Constraint::Custom(Box::new(|value| {
			value
				.starts_with('J')
				.then(|| "Names must not start with J.".to_string())
		}));
		assert!(constraint.check(&scalar("Paul")).is_empty());
		assert!(!constraint.check(&scalar("Jack")).is_empty());
	}

	#[test]
	fn test_collection_checks_each_element() {
		let constraint = Constraint::MaxLength(20);
		let long = "x".repeat(25);
		let errors = constraint.check(&FieldValue::Items(vec!["ok".to_string(), long]));
		assert_eq!(errors.len(), 1);
	}
}
