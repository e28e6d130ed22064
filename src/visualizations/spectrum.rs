//! Frequency spectrum visualization.
//!
//! Maps the analyzer's amplitude curve onto display columns between a minimum and
//! maximum frequency, on a decibel scale relative to a reference level.

use crate::analysis::spectrum::bin_for_frequency;

/// Decibels between an empty column and a full column.
const DISPLAY_RANGE_DB: f32 = 60.0;

/// Full-scale amplitude of a 16-bit sample.
const FULL_SCALE: f32 = 32768.0;

/// Column heights for the spectrum view.
///
/// Each update fully replaces the previous columns; no history is retained.
pub struct SpectrumView {
    display_data: Vec<u64>,
    num_columns: usize,
    min_frequency_hz: f64,
    max_frequency_hz: f64,
    reference_level_db: i8,
}

impl SpectrumView {
    /// Creates an empty spectrum view.
    pub fn new(
        num_columns: usize,
        min_frequency_hz: f64,
        max_frequency_hz: f64,
        reference_level_db: i8,
    ) -> Self {
        Self {
            display_data: vec![0u64; num_columns],
            num_columns,
            min_frequency_hz,
            max_frequency_hz,
            reference_level_db,
        }
    }

    /// Replaces the columns with a new amplitude curve.
    ///
    /// `amplitudes` holds one value per bin up to Nyquist, so the window it came from
    /// was twice its length.
    pub fn update(&mut self, amplitudes: &[f32], sample_rate: u32) {
        self.display_data = map_to_columns(
            amplitudes,
            sample_rate,
            self.num_columns,
            self.min_frequency_hz,
            self.max_frequency_hz,
            self.reference_level_db,
        );
    }

    /// Resizes the view for a new terminal width. Columns are blank until the next update.
    pub fn resize(&mut self, new_width: usize) {
        self.num_columns = new_width;
        self.display_data = vec![0u64; new_width];
    }

    /// Returns the current display data.
    pub fn data(&self) -> &[u64] {
        &self.display_data
    }
}

/// Distributes amplitude bins across `num_columns` columns.
///
/// Each column shows the loudest bin in its frequency range, converted to dBFS and
/// scaled so `reference_level_db` is 100 and anything `DISPLAY_RANGE_DB` below it is 0.
fn map_to_columns(
    amplitudes: &[f32],
    sample_rate: u32,
    num_columns: usize,
    min_frequency_hz: f64,
    max_frequency_hz: f64,
    reference_level_db: i8,
) -> Vec<u64> {
    let mut result = vec![0u64; num_columns];
    if amplitudes.is_empty() || num_columns == 0 || sample_rate == 0 {
        return result;
    }

    let window_length = amplitudes.len() * 2;
    let min_bin = bin_for_frequency(min_frequency_hz, sample_rate, window_length)
        .min(amplitudes.len() - 1);
    let max_bin = bin_for_frequency(max_frequency_hz, sample_rate, window_length)
        .min(amplitudes.len())
        .max(min_bin + 1);

    let reference_db = reference_level_db as f32;
    let floor_db = reference_db - DISPLAY_RANGE_DB;
    let useful_bins = max_bin - min_bin;

    for (column, value) in result.iter_mut().enumerate() {
        let start_bin = min_bin + (column * useful_bins) / num_columns;
        let end_bin = (min_bin + ((column + 1) * useful_bins) / num_columns)
            .min(max_bin)
            .max(start_bin + 1);

        if start_bin >= max_bin {
            break;
        }

        let peak = amplitudes[start_bin..end_bin]
            .iter()
            .copied()
            .fold(0.0f32, f32::max);

        let db = if peak > 1e-10 {
            20.0 * (peak / FULL_SCALE).log10()
        } else {
            -200.0
        };

        if db > floor_db {
            *value = ((db - floor_db) / DISPLAY_RANGE_DB * 100.0)
                .round()
                .clamp(0.0, 100.0) as u64;
        }
    }

    result
}
