//! PKCE Generator
//!
//! RFC 7636 Proof Key for Code Exchange, S256 only.

use base64::Engine;
use parking_lot::Mutex;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::ConfigurationError;

/// Challenge method sent to the provider.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// A PKCE verifier and its S256 challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PkcePair {
    pub code_verifier: String,
    pub code_challenge: String,
}

/// PKCE generator interface (for dependency injection).
pub trait PkceGenerator: Send + Sync {
    /// Generate a verifier/challenge pair.
    fn generate(&self) -> PkcePair;
}

/// S256 challenge for a verifier: BASE64URL(SHA256(verifier)).
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}

/// Default PKCE generator implementation.
pub struct DefaultPkceGenerator {
    verifier_length: usize,
}

impl DefaultPkceGenerator {
    /// Create new PKCE generator with the default verifier length (43).
    pub fn new() -> Self {
        Self { verifier_length: 43 }
    }

    /// Create PKCE generator with custom verifier length (43 to 128).
    pub fn with_length(length: usize) -> Result<Self, ConfigurationError> {
        if !(43..=128).contains(&length) {
            return Err(ConfigurationError::invalid(
                "pkce_verifier_length",
                "must be between 43 and 128",
            ));
        }
        Ok(Self {
            verifier_length: length,
        })
    }

    fn generate_verifier(&self) -> String {
        let mut rng = rand::thread_rng();
        let bytes_needed = (self.verifier_length * 3 + 3) / 4;
        let random_bytes: Vec<u8> = (0..bytes_needed).map(|_| rng.gen()).collect();

        let mut encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&random_bytes);
        encoded.truncate(self.verifier_length);
        encoded
    }
}

impl Default for DefaultPkceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceGenerator for DefaultPkceGenerator {
    fn generate(&self) -> PkcePair {
        let code_verifier = self.generate_verifier();
        let code_challenge = compute_challenge(&code_verifier);

        PkcePair {
            code_verifier,
            code_challenge,
        }
    }
}

/// Mock PKCE generator for testing.
#[derive(Default)]
pub struct MockPkceGenerator {
    next_verifier: Mutex<Option<String>>,
    generate_history: Mutex<Vec<PkcePair>>,
}

impl MockPkceGenerator {
    /// Create new mock PKCE generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next verifier to generate.
    pub fn set_next_verifier(&self, verifier: impl Into<String>) -> &Self {
        *self.next_verifier.lock() = Some(verifier.into());
        self
    }

    /// Get generate history.
    pub fn get_generate_history(&self) -> Vec<PkcePair> {
        self.generate_history.lock().clone()
    }
}

impl PkceGenerator for MockPkceGenerator {
    fn generate(&self) -> PkcePair {
        let code_verifier = self
            .next_verifier
            .lock()
            .take()
            .unwrap_or_else(|| format!("mock-verifier-{}", rand::random::<u32>()));

        let pair = PkcePair {
            code_challenge: compute_challenge(&code_verifier),
            code_verifier,
        };

        self.generate_history.lock().push(pair.clone());
        pair
    }
}

/// Validate PKCE verifier format.
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

/// Create production PKCE generator.
pub fn create_pkce_generator() -> DefaultPkceGenerator {
    DefaultPkceGenerator::new()
}

/// Create mock PKCE generator for testing.
pub fn create_mock_pkce_generator() -> MockPkceGenerator {
    MockPkceGenerator::new()
}
