//! Known compressor outputs, keyed by gain reduction.

/// Maps a compressor gain reduction to the sample sums known for it.
/// Keys and sums compare by exact `f64` equality.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceTable<'a> {
    entries: &'a [(f64, &'a [f64])],
}

impl<'a> ReferenceTable<'a> {
    pub const fn new(entries: &'a [(f64, &'a [f64])]) -> Self {
        Self { entries }
    }

    /// Sums recorded for `gain_reduction`; empty when the key is unknown.
    pub fn sums_for(&self, gain_reduction: f64) -> &'a [f64] {
        self.entries
            .iter()
            .find(|(key, _)| *key == gain_reduction)
            .map(|(_, sums)| *sums)
            .unwrap_or(&[])
    }

    pub fn matches(&self, gain_reduction: f64, sample_sum: f64) -> bool {
        self.sums_for(gain_reduction).contains(&sample_sum)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub const KNOWN_AUDIO: ReferenceTable<'static> = ReferenceTable::new(&[
    (
        -20.538286209106445,
        &[
            124.0434488439787,
            124.04344968475198,
            124.04347527516074,
            124.04347503720783,
            124.04347657808103,
        ],
    ),
    (
        -20.538288116455078,
        &[
            124.04347518575378,
            124.04347527516074,
            124.04344884395687,
            124.04344968475198,
            124.04347657808103,
            124.04347730590962,
            124.0434765110258,
            124.04347656317987,
            124.04375314689969,
            124.0434485301812,
            124.0434496849557,
            124.043453265891,
            124.04345734833623,
            124.04345808873768,
        ],
    ),
    (
        -20.535268783569336,
        &[
            124.080722568091,
            124.08072256811283,
            124.08072766105033,
            124.08072787802666,
            124.08072787804849,
            124.08074500028306,
            124.0807470110085,
            124.08075528279005,
            124.08075643483608,
        ],
    ),
    (-31.502187728881836, &[35.74996626004577]),
    (
        -31.502185821533203,
        &[35.74996031448245, 35.7499681673944, 35.749968223273754],
    ),
    (-31.50218963623047, &[35.74996031448245]),
    (-31.509262084960938, &[35.7383295930922, 35.73833402246237]),
    (-29.837873458862305, &[35.10892717540264, 35.10892752557993]),
    (-29.83786964416504, &[35.10893232002854, 35.10893253237009]),
]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_pair_matches() {
        assert!(KNOWN_AUDIO.matches(-20.538286209106445, 124.0434488439787));
        assert!(KNOWN_AUDIO.matches(-29.83786964416504, 35.10893253237009));
    }

    #[test]
    fn sum_under_other_key_does_not_match() {
        assert!(!KNOWN_AUDIO.matches(-31.50218963623047, 124.0434488439787));
        assert!(!KNOWN_AUDIO.matches(0.0, 124.0434488439787));
    }

    #[test]
    fn table_has_nine_keys() {
        assert_eq!(KNOWN_AUDIO.len(), 9);
        assert_eq!(KNOWN_AUDIO.sums_for(-20.538288116455078).len(), 14);
        assert!(KNOWN_AUDIO.sums_for(1.0).is_empty());
    }
}
