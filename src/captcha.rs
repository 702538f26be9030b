//! Captcha challenge generation
//!
//! A challenge is a short random alphanumeric string generated once at
//! parse time. The rendered form shows an image reference derived from a
//! hash of the challenge, never the expected value itself; actual image
//! encoding is the hosting application's concern.

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

pub(crate) const CHALLENGE_LENGTH: usize = 6;

pub(crate) fn generate_challenge() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(CHALLENGE_LENGTH)
		.map(char::from)
		.collect()
}

/// Opaque image name for a challenge. Hashed so the markup never leaks
/// the expected value in plaintext.
pub(crate) fn image_reference(challenge: &str) -> String {
	let digest = Sha256::digest(challenge.as_bytes());
	digest
		.iter()
		.take(8)
		.map(|byte| format!("{byte:02x}"))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_challenge_shape() {
		let challenge = generate_challenge();
		assert_eq!(challenge.chars().count(), CHALLENGE_LENGTH);
		assert!(challenge.chars().all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn test_image_reference_hides_the_challenge() {
		let reference = image_reference("AbC123");
		assert_eq!(reference.len(), 16);
		assert!(!reference.contains("AbC123"));
		assert_eq!(reference, image_reference("AbC123"));
	}
}
