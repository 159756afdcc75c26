//! Shared-secret handling.

use rand::Rng;
use sha2::{Digest, Sha256};

pub const TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.~";
pub const TOKEN_LEN: usize = 96;
pub const MIN_TOKEN_LEN: usize = 12;

pub const TOKEN_HEADER: &str = "x-token";
pub const TOKEN_QUERY_PARAM: &str = "token";

pub fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// Constant-time comparison; only the length check short-circuits.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// Percent-decoded `token` value from a query string.
pub fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?;
        let value = parts.next()?;
        if key == TOKEN_QUERY_PARAM {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Rate-limit identity: client IP plus a short hash of a verified token.
/// Callers pass `None` for unverified requests so they share `ip|-`.
pub fn client_key(ip: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => {
            let digest = hex::encode(Sha256::digest(token.as_bytes()));
            format!("{ip}|{}", &digest[..12])
        }
        _ => format!("{ip}|-"),
    }
}
