// src/utils/resume_token.rs

use std::sync::LazyLock;

use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use url::Url;

/// Random bytes behind each token (256 bits).
pub const TOKEN_BYTES: usize = 32;

static TOKEN_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^[0-9a-f]{{{}}}$", TOKEN_BYTES * 2)).expect("static token regex")
});

/// Generates a new resume token from the operating system CSPRNG.
///
/// The token is the only credential needed to resume a draft, so it must not
/// be derivable from user or draft data.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Cheap shape check done before any storage lookup.
pub fn is_well_formed(token: &str) -> bool {
    TOKEN_FORMAT.is_match(token)
}

/// Client route that triggers the resume lookup: `{base}/resume/{token}`.
pub fn resume_url(base: &Url, token: &str) -> String {
    let mut url = base.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push("resume").push(token);
        }
        Err(()) => {
            return format!("{}/resume/{}", base.as_str().trim_end_matches('/'), token);
        }
    }
    url.to_string()
}
