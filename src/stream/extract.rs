//! Candidate mint extraction from transaction log lines

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::WSOL_MINT;

lazy_static! {
    /// Base58 address pattern: 32-44 chars, Bitcoin-style alphabet
    static ref ADDRESS_RE: Regex =
        Regex::new(r"[1-9A-HJ-NP-Za-km-z]{32,44}").expect("static regex");
}

/// Case-insensitive banned-keyword substring match
pub fn is_banned(candidate: &str, banned_keywords: &[String]) -> bool {
    let lower = candidate.to_lowercase();
    banned_keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
}

/// Scan log lines in order for the first base58-looking substring that is
/// neither the wrapped-SOL placeholder nor banned. Returns None when no
/// line qualifies.
pub fn extract_candidate(logs: &[String], banned_keywords: &[String]) -> Option<String> {
    for line in logs {
        for m in ADDRESS_RE.find_iter(line) {
            let candidate = m.as_str();
            if candidate == WSOL_MINT {
                continue;
            }
            if is_banned(candidate, banned_keywords) {
                continue;
            }
            return Some(candidate.to_string());
        }
    }
    None
}
