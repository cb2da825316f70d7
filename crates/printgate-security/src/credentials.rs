// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credential store — immutable username → SHA-256 password hash lookup.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `password` and return it as a lowercase hex
/// string.
///
/// This is the format stored in the credential file and the format clients
/// send on login.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Stand-in compared against when the username is not registered.
const UNKNOWN_USER_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Registered users and their password hashes. Populated once at startup.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// Build the store from `(username, hash)` pairs.
    ///
    /// Hashes are normalised to lowercase hex. Later duplicates replace
    /// earlier ones.
    pub fn new<U, H>(users: impl IntoIterator<Item = (U, H)>) -> Self
    where
        U: Into<String>,
        H: AsRef<str>,
    {
        let users = users
            .into_iter()
            .map(|(u, h)| (u.into(), h.as_ref().trim().to_ascii_lowercase()))
            .collect();
        Self { users }
    }

    /// True iff `username` is registered with exactly `password_hash`.
    ///
    /// An unknown username is compared against a dummy hash of the same
    /// shape as a stored one, and the result is always rejected.
    pub fn verify(&self, username: &str, password_hash: &str) -> bool {
        let supplied = password_hash.trim().to_ascii_lowercase();
        match self.users.get(username) {
            Some(stored) => constant_time_eq(stored.as_bytes(), supplied.as_bytes()),
            None => {
                std::hint::black_box(constant_time_eq(
                    UNKNOWN_USER_HASH.as_bytes(),
                    supplied.as_bytes(),
                ));
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
