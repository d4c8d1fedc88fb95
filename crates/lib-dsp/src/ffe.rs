//! Tx feed-forward equalizer.

use lib_types::TapTuner;

/// FFE coefficients for a tuner list whose first entry is the pre-cursor.
///
/// Disabled tuners contribute 0. The main cursor is inserted at index 1
/// with value `1 - sum(|other taps|)`, so an empty list yields `[1.0]`.
pub fn ffe_taps(tuners: &[TapTuner]) -> Vec<f64> {
    let mut taps: Vec<f64> = tuners.iter().map(TapTuner::effective_value).collect();
    let main = 1.0 - taps.iter().map(|v| v.abs()).sum::<f64>();
    taps.insert(taps.len().min(1), main);
    taps
}

/// FFE impulse response: each tap followed by `nspui - 1` zeros.
pub fn ffe_impulse(tuners: &[TapTuner], nspui: usize) -> Vec<f64> {
    let nspui = nspui.max(1);
    let taps = ffe_taps(tuners);
    let mut h = vec![0.0; taps.len() * nspui];
    for (i, tap) in taps.into_iter().enumerate() {
        h[i * nspui] = tap;
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuners(values: &[(bool, f64)]) -> Vec<TapTuner> {
        values
            .iter()
            .enumerate()
            .map(|(i, &(enabled, value))| TapTuner {
                value,
                ..TapTuner::new(format!("tap{}", i), enabled, -1.0, 1.0)
            })
            .collect()
    }

    #[test]
    fn test_main_tap_absorbs_other_taps() {
        let taps = ffe_taps(&tuners(&[(true, -0.1), (true, -0.2), (false, 0.3), (true, 0.05)]));

        assert_eq!(taps.len(), 5);
        assert!((taps[1] - (1.0 - 0.35)).abs() < 1e-12);
        assert_eq!(taps[0], -0.1);
        assert_eq!(taps[2], -0.2);
        assert_eq!(taps[3], 0.0);
        assert_eq!(taps[4], 0.05);
    }

    #[test]
    fn test_all_disabled_gives_unit_main() {
        let taps = ffe_taps(&tuners(&[(false, 0.1), (false, 0.2)]));
        assert_eq!(taps, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_tuner_list() {
        assert_eq!(ffe_taps(&[]), vec![1.0]);
        assert_eq!(ffe_impulse(&[], 4), vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_impulse_expansion() {
        let h = ffe_impulse(&tuners(&[(true, -0.25)]), 3);
        assert_eq!(h, vec![-0.25, 0.0, 0.0, 0.75, 0.0, 0.0]);
    }
}
