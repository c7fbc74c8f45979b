/// Seed used when a seed string hashes to zero.
pub const DEFAULT_SEED: u32 = 1337;

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over the UTF-16 units of the trimmed seed text.
/// Blank input hashes as `"default"`; a zero hash becomes [`DEFAULT_SEED`].
pub fn hash_seed(seed: &str) -> u32 {
    let trimmed = seed.trim();
    let text = if trimmed.is_empty() { "default" } else { trimmed };
    let h = text.encode_utf16().fold(FNV_OFFSET, |h, unit| {
        (h ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    });
    if h == 0 { DEFAULT_SEED } else { h }
}
