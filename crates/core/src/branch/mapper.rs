//! Legacy branch id to canonical UUID mapping.
//!
//! Branches created before UUIDs were adopted are referenced by a 32-bit
//! integer. Their canonical UUID is derived without a lookup table:
//!
//! 1. seed = `"branch:"` followed by the decimal legacy id
//! 2. digest = MD5(seed)
//! 3. patch byte 6 to version 3 and byte 8 to the RFC 4122 variant
//! 4. read the 16 bytes as a UUID using a [`GuidLayout`]
//!
//! The hash and the layout are fixed by identifiers already persisted in
//! downstream systems. Changing either silently re-keys every legacy branch.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::errors::{BranchIdError, ConfigError};

/// Prefix hashed in front of the decimal legacy id.
pub const SEED_PREFIX: &str = "branch:";

/// How the 16 patched digest bytes are laid out into a UUID.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GuidLayout {
    /// `time_low`, `time_mid` and `time_hi_and_version` are read
    /// little-endian; the trailing 8 bytes are taken as-is. This is the
    /// layout of a GUID built from a raw byte buffer on the platform that
    /// first issued these identifiers.
    #[default]
    MixedEndian,
    /// All 16 bytes are taken in order (RFC 4122 network order).
    BigEndian,
}

impl GuidLayout {
    /// Build a UUID from raw bytes under this layout.
    pub fn to_uuid(self, bytes: [u8; 16]) -> Uuid {
        match self {
            GuidLayout::MixedEndian => Uuid::from_bytes_le(bytes),
            GuidLayout::BigEndian => Uuid::from_bytes(bytes),
        }
    }

    /// Recover the raw bytes a UUID was built from under this layout.
    pub fn to_bytes(self, uuid: &Uuid) -> [u8; 16] {
        match self {
            GuidLayout::MixedEndian => uuid.to_bytes_le(),
            GuidLayout::BigEndian => *uuid.as_bytes(),
        }
    }

    /// The configuration spelling of this layout.
    pub fn as_str(self) -> &'static str {
        match self {
            GuidLayout::MixedEndian => "mixed-endian",
            GuidLayout::BigEndian => "big-endian",
        }
    }
}

impl fmt::Display for GuidLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuidLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mixed-endian" => Ok(GuidLayout::MixedEndian),
            "big-endian" => Ok(GuidLayout::BigEndian),
            other => Err(ConfigError::InvalidValue {
                field: "branch.guid_layout".into(),
                detail: format!("unknown layout '{other}', expected 'mixed-endian' or 'big-endian'"),
            }),
        }
    }
}

/// Outcome of resolving a raw branch token.
///
/// `legacy_id` is set only when the canonical id was derived from an integer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBranch {
    pub canonical_id: Uuid,
    pub legacy_id: Option<i32>,
}

impl ResolvedBranch {
    /// Whether the canonical id was derived from a legacy integer id.
    pub fn is_legacy(&self) -> bool {
        self.legacy_id.is_some()
    }
}

/// The patched MD5 digest for a legacy id, before any layout is applied.
///
/// Byte 6 always carries version 3 in its high nibble and byte 8 always
/// carries the `10` variant bits.
pub fn derive_bytes(legacy_id: i32) -> [u8; 16] {
    let seed = format!("{SEED_PREFIX}{legacy_id}");
    let digest = Md5::digest(seed.as_bytes());

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    bytes[6] = (bytes[6] & 0x0F) | 0x30;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    bytes
}

/// Derive the canonical UUID for a legacy branch id using the default
/// [`GuidLayout::MixedEndian`] layout.
pub fn derive(legacy_id: i32) -> Uuid {
    derive_with_layout(legacy_id, GuidLayout::default())
}

/// Derive the canonical UUID for a legacy branch id under `layout`.
pub fn derive_with_layout(legacy_id: i32, layout: GuidLayout) -> Uuid {
    let canonical_id = layout.to_uuid(derive_bytes(legacy_id));
    trace!(legacy_id, %canonical_id, %layout, "derived canonical branch id");
    canonical_id
}

/// Resolve a raw branch token using the default layout.
///
/// See [`resolve_with_layout`].
pub fn resolve(raw: &str) -> Result<ResolvedBranch, BranchIdError> {
    resolve_with_layout(raw, GuidLayout::default())
}

/// Resolve a raw branch token to its canonical id.
///
/// A UUID is passed through unchanged; otherwise a base-10 `i32` is derived
/// under `layout`. UUID parsing runs first, so a 32-digit numeric string is
/// read as a simple-form UUID. Any Unicode whitespace may surround a UUID,
/// but only ASCII whitespace may surround an integer.
pub fn resolve_with_layout(raw: &str, layout: GuidLayout) -> Result<ResolvedBranch, BranchIdError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(BranchIdError::Blank);
    }

    if let Some(canonical_id) = parse_native_uuid(token) {
        debug!(%canonical_id, "branch token is a native UUID");
        return Ok(ResolvedBranch {
            canonical_id,
            legacy_id: None,
        });
    }

    if let Ok(legacy_id) = raw.trim_matches(is_integer_padding).parse::<i32>() {
        let canonical_id = derive_with_layout(legacy_id, layout);
        debug!(legacy_id, %canonical_id, "branch token is a legacy id");
        return Ok(ResolvedBranch {
            canonical_id,
            legacy_id: Some(legacy_id),
        });
    }

    debug!(token, "branch token is neither a UUID nor a legacy id");
    Err(BranchIdError::Unrecognized(token.to_string()))
}

/// Tab, line feed, vertical tab, form feed, carriage return and space.
fn is_integer_padding(c: char) -> bool {
    matches!(c, '\t'..='\r' | ' ')
}

/// Parse the textual UUID forms accepted for native branch ids: hyphenated,
/// simple, braced, parenthesized and hex-braced. URNs are rejected.
fn parse_native_uuid(token: &str) -> Option<Uuid> {
    if token.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("urn:")) {
        return None;
    }

    if token.starts_with('{') && token.contains(',') {
        return parse_hex_braced(token);
    }

    if let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        // Only the hyphenated form may be parenthesized.
        if inner.len() != 36 {
            return None;
        }
        return Uuid::try_parse(inner).ok();
    }

    Uuid::try_parse(token).ok()
}

/// Parse the hex-braced form
/// `{0x550e8400,0xe29b,0x41d4,{0xa7,0x16,0x44,0x66,0x55,0x44,0x00,0x00}}`.
///
/// Whitespace anywhere in the token is ignored. Each component needs a `0x`
/// prefix and at most 8, 4, 4 and 2 hex digits respectively.
fn parse_hex_braced(token: &str) -> Option<Uuid> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    let inner = compact.strip_prefix('{')?.strip_suffix("}}")?;
    let (head, tail) = inner.split_once(",{")?;

    let fields: Vec<&str> = head.split(',').collect();
    let bytes: Vec<&str> = tail.split(',').collect();
    if fields.len() != 3 || bytes.len() != 8 {
        return None;
    }

    let d1 = hex_component(fields[0], 8)?;
    let d2 = u16::try_from(hex_component(fields[1], 4)?).ok()?;
    let d3 = u16::try_from(hex_component(fields[2], 4)?).ok()?;
    let mut d4 = [0u8; 8];
    for (slot, part) in d4.iter_mut().zip(&bytes) {
        *slot = u8::try_from(hex_component(part, 2)?).ok()?;
    }

    Some(Uuid::from_fields(d1, d2, d3, &d4))
}

fn hex_component(part: &str, max_digits: usize) -> Option<u32> {
    let digits = part
        .strip_prefix("0x")
        .or_else(|| part.strip_prefix("0X"))?;
    if digits.is_empty()
        || digits.len() > max_digits
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn test_known_vectors_mixed_endian() {
        assert_eq!(derive(1), uuid("9fecdfbb-344c-5339-b2f0-d738e8c3df0b"));
        assert_eq!(derive(42), uuid("3f1001f9-9afb-7f3a-aef9-cb8844fbae5f"));
        assert_eq!(derive(-7), uuid("b090f9f2-28aa-843b-b2db-45f5a942ef1e"));
        assert_eq!(derive(0), uuid("5600fe3e-1ef1-7b36-9810-9915ebe0bb29"));
    }

    #[test]
    fn test_known_vectors_big_endian() {
        let layout = GuidLayout::BigEndian;
        assert_eq!(
            derive_with_layout(1, layout),
            uuid("bbdfec9f-4c34-3953-b2f0-d738e8c3df0b")
        );
        assert_eq!(
            derive_with_layout(42, layout),
            uuid("f901103f-fb9a-3a7f-aef9-cb8844fbae5f")
        );
        assert_eq!(
            derive_with_layout(i32::MAX, layout),
            uuid("009ca1a6-1cfb-379a-afb2-1ecad2989af7")
        );
        assert_eq!(
            derive_with_layout(i32::MIN, layout),
            uuid("b76d947b-6e36-39f2-b49c-265507a91888")
        );
    }

    #[test]
    fn test_derive_bytes_matches_digest() {
        let expected: [u8; 16] = [
            0xbb, 0xdf, 0xec, 0x9f, 0x4c, 0x34, 0x39, 0x53, 0xb2, 0xf0, 0xd7, 0x38, 0xe8, 0xc3,
            0xdf, 0x0b,
        ];
        assert_eq!(derive_bytes(1), expected);
    }

    #[test]
    fn test_layouts_share_bytes() {
        for id in [-1000, -1, 0, 1, 7, 42, 9999] {
            let bytes = derive_bytes(id);
            for layout in [GuidLayout::MixedEndian, GuidLayout::BigEndian] {
                assert_eq!(layout.to_bytes(&derive_with_layout(id, layout)), bytes);
            }
        }
    }

    #[test]
    fn test_version_and_variant_bits() {
        for id in (-500..500).chain([i32::MIN, i32::MAX]) {
            let bytes = derive_bytes(id);
            assert_eq!(bytes[6] >> 4, 3, "version nibble for {id}");
            assert_eq!(bytes[8] & 0xC0, 0x80, "variant bits for {id}");

            let big = derive_with_layout(id, GuidLayout::BigEndian);
            assert_eq!(big.get_version_num(), 3);
            assert_eq!(big.get_variant(), uuid::Variant::RFC4122);
        }
    }

    #[test]
    fn test_textual_version_and_variant() {
        for id in 0..2000 {
            let big = derive_with_layout(id, GuidLayout::BigEndian).to_string();
            let groups: Vec<&str> = big.split('-').collect();
            assert!(groups[2].starts_with('3'), "{big}");
            assert!(matches!(&groups[3][..1], "8" | "9" | "a" | "b"), "{big}");

            // The version nibble sits in the second byte of the swapped field.
            let mixed = derive(id).to_string();
            let groups: Vec<&str> = mixed.split('-').collect();
            assert_eq!(&groups[2][2..3], "3", "{mixed}");
            assert!(matches!(&groups[3][..1], "8" | "9" | "a" | "b"), "{mixed}");
        }
    }

    #[test]
    fn test_derive_is_deterministic() {
        for id in [i32::MIN, -1, 0, 1, 42, i32::MAX] {
            assert_eq!(derive(id), derive(id));
            assert_eq!(derive_bytes(id), derive_bytes(id));
        }
    }

    #[test]
    fn test_resolve_native_uuid_passthrough() {
        let resolved = resolve("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(resolved.canonical_id, uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert_eq!(resolved.legacy_id, None);
        assert!(!resolved.is_legacy());
    }

    #[test]
    fn test_resolve_accepts_uuid_forms() {
        let expected = uuid("550e8400-e29b-41d4-a716-446655440000");
        for form in [
            "550E8400-E29B-41D4-A716-446655440000",
            "550e8400e29b41d4a716446655440000",
            "{550e8400-e29b-41d4-a716-446655440000}",
            "(550e8400-e29b-41d4-a716-446655440000)",
            "  550e8400-e29b-41d4-a716-446655440000\t",
        ] {
            let resolved = resolve(form).unwrap();
            assert_eq!(resolved.canonical_id, expected, "form {form}");
            assert_eq!(resolved.legacy_id, None);
        }
    }

    #[test]
    fn test_resolve_accepts_hex_braced_form() {
        let expected = uuid("550e8400-e29b-41d4-a716-446655440000");
        for form in [
            "{0x550e8400,0xe29b,0x41d4,{0xa7,0x16,0x44,0x66,0x55,0x44,0x00,0x00}}",
            "{0X550E8400, 0xE29B, 0x41D4, {0xA7, 0x16, 0x44, 0x66, 0x55, 0x44, 0x0, 0x0}}",
        ] {
            let resolved = resolve(form).unwrap();
            assert_eq!(resolved.canonical_id, expected, "form {form}");
            assert_eq!(resolved.legacy_id, None);
        }

        // Short components are zero-extended.
        assert_eq!(
            resolve("{0x1,0x2,0x3,{0x4,0x5,0x6,0x7,0x8,0x9,0xa,0xb}}").unwrap().canonical_id,
            uuid("00000001-0002-0003-0405-060708090a0b")
        );
    }

    #[test]
    fn test_resolve_rejects_malformed_hex_braced_form() {
        for form in [
            // missing 0x prefix
            "{550e8400,0xe29b,0x41d4,{0xa7,0x16,0x44,0x66,0x55,0x44,0x00,0x00}}",
            // too many digits in a byte
            "{0x550e8400,0xe29b,0x41d4,{0xa7,0x116,0x44,0x66,0x55,0x44,0x00,0x00}}",
            // seven bytes
            "{0x550e8400,0xe29b,0x41d4,{0xa7,0x16,0x44,0x66,0x55,0x44,0x00}}",
            // missing closing brace
            "{0x550e8400,0xe29b,0x41d4,{0xa7,0x16,0x44,0x66,0x55,0x44,0x00,0x00}",
            // non-hex digit
            "{0x550e840g,0xe29b,0x41d4,{0xa7,0x16,0x44,0x66,0x55,0x44,0x00,0x00}}",
        ] {
            assert!(
                matches!(resolve(form), Err(BranchIdError::Unrecognized(_))),
                "form {form}"
            );
        }
    }

    #[test]
    fn test_resolve_integer_allows_only_ascii_padding() {
        assert_eq!(resolve("\u{0B}42\u{0C}").unwrap().legacy_id, Some(42));
        for form in ["42\u{3000}", "\u{A0}42", "\u{2003}42"] {
            assert!(
                matches!(resolve(form), Err(BranchIdError::Unrecognized(_))),
                "input {form:?}"
            );
        }
        assert_eq!(resolve("\u{3000}\u{A0}"), Err(BranchIdError::Blank));
    }

    #[test]
    fn test_resolve_uuid_allows_unicode_padding() {
        let resolved = resolve("\u{A0}550e8400-e29b-41d4-a716-446655440000\u{3000}").unwrap();
        assert_eq!(resolved.canonical_id, uuid("550e8400-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn test_resolve_rejects_urn_and_partial_forms() {
        for form in [
            "urn:uuid:550e8400-e29b-41d4-a716-446655440000",
            "(550e8400e29b41d4a716446655440000)",
            "{550e8400-e29b-41d4-a716-446655440000",
            "550e8400-e29b-41d4-a716",
        ] {
            assert!(
                matches!(resolve(form), Err(BranchIdError::Unrecognized(_))),
                "form {form}"
            );
        }
    }

    #[test]
    fn test_resolve_legacy_integer() {
        let resolved = resolve("42").unwrap();
        assert_eq!(resolved.canonical_id, derive(42));
        assert_eq!(resolved.legacy_id, Some(42));
        assert!(resolved.is_legacy());

        for _ in 0..1000 {
            assert_eq!(resolve("42").unwrap(), resolved);
        }
    }

    #[test]
    fn test_resolve_integer_spellings() {
        let expected = resolve("42").unwrap();
        for form in ["  42  ", "+42", "042", "\n42"] {
            assert_eq!(resolve(form).unwrap(), expected, "form {form:?}");
        }

        let negative = resolve("-7").unwrap();
        assert_eq!(negative.legacy_id, Some(-7));
        assert_eq!(negative.canonical_id, derive(-7));
    }

    #[test]
    fn test_resolve_integer_range() {
        assert_eq!(resolve("2147483647").unwrap().legacy_id, Some(i32::MAX));
        assert_eq!(resolve("-2147483648").unwrap().legacy_id, Some(i32::MIN));
        assert!(matches!(
            resolve("2147483648"),
            Err(BranchIdError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_resolve_prefers_uuid_over_integer() {
        let all_digits = "12345678901234567890123456789012";
        let resolved = resolve(all_digits).unwrap();
        assert_eq!(resolved.canonical_id, uuid(all_digits));
        assert_eq!(resolved.legacy_id, None);
    }

    #[test]
    fn test_resolve_rejections() {
        assert_eq!(resolve(""), Err(BranchIdError::Blank));
        assert_eq!(resolve("   "), Err(BranchIdError::Blank));
        assert_eq!(
            resolve("not-a-branch"),
            Err(BranchIdError::Unrecognized("not-a-branch".into()))
        );
        for bad in ["4 2", "42.0", "0x2a", "branch:42", "-", "+"] {
            assert!(resolve(bad).is_err(), "input {bad:?}");
        }
    }

    #[test]
    fn test_resolve_with_layout_only_affects_legacy_ids() {
        let native = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(
            resolve_with_layout(native, GuidLayout::BigEndian).unwrap(),
            resolve(native).unwrap()
        );
        assert_eq!(
            resolve_with_layout("1", GuidLayout::BigEndian).unwrap().canonical_id,
            uuid("bbdfec9f-4c34-3953-b2f0-d738e8c3df0b")
        );
    }

    #[test]
    fn test_guid_layout_from_str() {
        assert_eq!("mixed-endian".parse::<GuidLayout>().unwrap(), GuidLayout::MixedEndian);
        assert_eq!("Big-Endian".parse::<GuidLayout>().unwrap(), GuidLayout::BigEndian);
        assert!(matches!(
            "little".parse::<GuidLayout>(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(GuidLayout::BigEndian.to_string(), "big-endian");
    }

    #[test]
    fn test_resolved_branch_serializes_camel_case() {
        let resolved = resolve("1").unwrap();
        let json = serde_json::to_value(resolved).unwrap();
        assert_eq!(json["canonicalId"], "9fecdfbb-344c-5339-b2f0-d738e8c3df0b");
        assert_eq!(json["legacyId"], 1);

        let native = resolve("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let json = serde_json::to_value(native).unwrap();
        assert!(json["legacyId"].is_null());
    }
}
