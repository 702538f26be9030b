//! Stateful, validated, re-renderable HTML forms
//!
//! This crate turns an ordinary HTML form fragment into a form object:
//! - field values can be read and written programmatically
//! - HTML5-style attributes (`required`, `minlength`, `maxlength`,
//!   `pattern`, `min`/`max`, `multiple`, `readonly`) become enforced
//!   constraints, and custom predicate constraints can be attached
//! - a CSRF token is transparently injected and checked
//! - a captcha control kind plugs into the same constraint pipeline
//! - the object re-serializes itself back into semantically equivalent
//!   markup after any value or attribute mutation
//!
//! ```
//! use formelle::{Form, FormConfig};
//! use std::collections::HashMap;
//! use serde_json::json;
//!
//! let config = FormConfig::new().with_secret("process-wide-secret");
//! let mut form = Form::parse_with(
//!     "<form method=\"post\"><input type=\"text\" name=\"name\" required=\"required\" /></form>",
//!     config,
//! )
//! .unwrap();
//!
//! let mut data = HashMap::new();
//! data.insert("name".to_string(), json!("Jack"));
//! data.insert("csrf_token".to_string(), json!(form.get_token().unwrap()));
//! form.bind(data);
//!
//! assert!(form.posted().unwrap());
//! assert!(form.check().is_empty());
//! assert!(form.render().contains("value=\"Jack\""));
//! ```

pub mod constraint;
pub mod error;
pub mod field;
pub mod form;
pub mod source;

mod captcha;
mod csrf;
mod parser;
mod render;

pub use constraint::Constraint;
pub use csrf::CSRF_TOKEN_FIELD;
pub use error::{FormError, FormResult};
pub use field::{ChoiceOption, Field, FieldKind, FieldValue};
pub use form::{Form, FormConfig};
pub use source::{Origin, Source};
