//! Score normalization and skin-tone adjustment.
//!
//! The raw score coming out of edge analysis is a float, nominally in
//! [0,100] but unbounded for extreme inputs. Everything reported to callers
//! goes through the single `normalize_score` clamp.

/// Lower bound of a reported wrinkle score.
pub const MIN_SCORE: u8 = 25;
/// Upper bound of a reported wrinkle score.
pub const MAX_SCORE: u8 = 100;

/// Clamps a score into the reported [25,100] range.
///
/// This is the only normalization policy in the system; the HTTP layer
/// calls it again as a defensive second clamp. Idempotent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn normalize_score(score: f64) -> u8 {
    score.clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
}

/// Skin tone on the 1-10 scale used for detection-sensitivity correction.
///
/// 1 is lightest, 10 is darkest. Out-of-range input is clamped on
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinTone(u8);

impl SkinTone {
    /// Creates a skin tone, clamping into [1,10].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value.clamp(1, 10) as u8)
    }

    /// Returns the tone value (1-10).
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Multiplicative correction factor applied to detected edge density.
    ///
    /// Darker tones get a larger factor since edge detection undercounts on
    /// lower-contrast skin: `1 + (10 - tone) * 0.05`.
    #[must_use]
    pub fn correction_factor(self) -> f64 {
        1.0 + f64::from(10 - self.0) * 0.05
    }
}

impl Default for SkinTone {
    fn default() -> Self {
        // Medium skin tone.
        Self(5)
    }
}

/// Applies the skin-tone correction to a raw score and clamps.
///
/// The factor scales the raw score's complement (the detected edge-density
/// percentage), so zero detected edges map to 100 and saturated edge maps
/// bottom out at 25 for every tone.
#[must_use]
pub fn adjust_for_skin_tone(raw_score: f64, tone: SkinTone) -> u8 {
    let corrected_density = (100.0 - raw_score) * tone.correction_factor();
    normalize_score(100.0 - corrected_density)
}
