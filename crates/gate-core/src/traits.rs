//! ============================================================================
//! Trait Matcher
//! ============================================================================
//! Pure comparison of a required trait set against an asset's traits.
//! ============================================================================

use std::collections::BTreeMap;

/// Returns true iff every required key is present in `asset_traits` with an
/// exactly equal value. Case-sensitive, no normalization, no partial credit.
/// An absent or empty requirement always matches.
pub fn traits_match(
    asset_traits: &BTreeMap<String, String>,
    required: Option<&BTreeMap<String, String>>,
) -> bool {
    let required = match required {
        None => return true,
        Some(r) if r.is_empty() => return true,
        Some(r) => r,
    };

    required
        .iter()
        .all(|(key, value)| asset_traits.get(key) == Some(value))
}
