use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// PBKDF2-HMAC-SHA256 iterations used when none are configured.
pub const DEFAULT_ROUNDS: u32 = 600_000;

const METHOD: &str = "pbkdf2:sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Hashes passwords as `pbkdf2:sha256:<rounds>$<salt>$<key>` (salt and key base64).
///
/// The round count is part of the stored string, so changing it only affects new
/// hashes; [`verify_password`] reads it back from whatever it is given.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    rounds: u32,
}

impl PasswordHasher {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.max(1),
        }
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Hashes `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, self.rounds, &mut key);

        format!(
            "{}:{}${}${}",
            METHOD,
            self.rounds,
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(key)
        )
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ROUNDS)
    }
}

struct StoredHash {
    rounds: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

fn parse_stored(stored: &str) -> Option<StoredHash> {
    let (method, rest) = stored.split_once('$')?;
    let (salt, key) = rest.split_once('$')?;
    let rounds = method
        .strip_prefix(METHOD)?
        .strip_prefix(':')?
        .parse::<u32>()
        .ok()
        .filter(|r| *r > 0)?;
    let salt = STANDARD_NO_PAD.decode(salt).ok()?;
    let key = STANDARD_NO_PAD.decode(key).ok()?;
    if key.is_empty() {
        return None;
    }
    Some(StoredHash { rounds, salt, key })
}

/// Checks `password` against a stored hash in constant time.
///
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Some(stored) = parse_stored(stored_hash) else {
        return false;
    };

    let mut candidate = vec![0u8; stored.key.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &stored.salt, stored.rounds, &mut candidate);
    candidate.as_slice().ct_eq(stored.key.as_slice()).into()
}
