//! Loudness measures used as confidence weights and beat markers

/// Root-mean-square level of a sample window, 0 for an empty window
pub fn rms_volume(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    (window.iter().map(|x| x * x).sum::<f64>() / window.len() as f64).sqrt()
}

/// Sum of every bin of a spectrum
pub fn spectral_volume(spectrum: &[f64]) -> f64 {
    spectrum.iter().sum()
}

/// Sum of the bins below `cutoff_hz`
///
/// Bin `i` is counted while its upper edge `(i + 1) · ceil(frame_rate / len)`
/// is below the cutoff.
pub fn low_frequency_volume(spectrum: &[f64], frame_rate: f64, cutoff_hz: f64) -> f64 {
    if spectrum.is_empty() {
        return 0.0;
    }

    let bin_width = (frame_rate / spectrum.len() as f64).ceil().max(1.0);
    spectrum
        .iter()
        .enumerate()
        .take_while(|(i, _)| (*i as f64 + 1.0) * bin_width < cutoff_hz)
        .map(|(_, x)| x)
        .sum()
}
