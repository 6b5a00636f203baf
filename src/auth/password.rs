/// Stored as the password hash of accounts created through a federated
/// login. It is not a valid bcrypt string, so no password ever matches it.
pub const UNUSABLE_PASSWORD: &str = "!";

pub fn hash(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Malformed hashes count as a mismatch.
pub fn verify(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}
