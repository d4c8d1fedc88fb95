//! End-to-end response composition.

use crate::convolution::convolve;
use crate::error::DspResult;
use lib_types::ImpulseResponse;

/// Tx FFE -> channel -> Rx CTLE.
///
/// Returns `conv(ctle, conv(ffe, channel))` at the channel's sample period.
/// Nothing is trimmed; the result is `ffe + channel + ctle - 2` samples long.
pub fn compose(
    ffe: &ImpulseResponse,
    channel: &ImpulseResponse,
    ctle: &ImpulseResponse,
) -> DspResult<ImpulseResponse> {
    let tx_out = convolve(&ffe.samples, &channel.samples)?;
    let samples = convolve(&ctle.samples, &tx_out)?;

    Ok(ImpulseResponse {
        samples,
        dt: channel.dt,
        start_index: channel.start_index,
        group_delay: channel.group_delay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Seconds;

    #[test]
    fn test_compose_identity_stages() {
        let dt = Seconds::from_ps(1.0);
        let channel = ImpulseResponse::new(vec![0.1, 0.6, 0.3], dt);
        let unit = ImpulseResponse::new(vec![1.0], dt);

        let out = compose(&unit, &channel, &unit).unwrap();
        assert_eq!(out.samples, channel.samples);
    }

    #[test]
    fn test_compose_length_and_dc() {
        let dt = Seconds::from_ps(1.0);
        let ffe = ImpulseResponse::new(vec![-0.1, 0.0, 0.9, 0.0], dt);
        let channel = ImpulseResponse::new(vec![0.2, 0.5, 0.3], dt);
        let ctle = ImpulseResponse::new(vec![1.5, -0.5], dt);

        let out = compose(&ffe, &channel, &ctle).unwrap();
        assert_eq!(out.len(), 4 + 3 + 2 - 2);
        // DC gains multiply
        assert!((out.sum() - 0.8 * 1.0 * 1.0).abs() < 1e-12);
    }
}
