/// License key generation
use rand::Rng;

/// Every key starts with this prefix
pub const KEY_PREFIX: &str = "LIC-";

/// Random characters after the prefix
pub const KEY_SUFFIX_LEN: usize = 16;

/// Total key length
pub const KEY_LEN: usize = KEY_PREFIX.len() + KEY_SUFFIX_LEN;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a new license key: `LIC-` followed by 16 characters of `A-Z0-9`
pub fn generate_key() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{}{}", KEY_PREFIX, suffix)
}

/// Whether a string has the shape of a generated key
pub fn is_well_formed(key: &str) -> bool {
    key.len() == KEY_LEN
        && key
            .strip_prefix(KEY_PREFIX)
            .map(|suffix| suffix.bytes().all(|b| CHARSET.contains(&b)))
            .unwrap_or(false)
}
