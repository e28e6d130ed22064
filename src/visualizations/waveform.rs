//! Time-domain waveform visualization.
//!
//! Displays raw sample amplitudes per channel as a scrolling strip starting at the
//! current playback frame.

use crate::playback::Waveform;

/// Per-channel column heights for the waveform view.
pub struct WaveformView {
    channels: Vec<Vec<u64>>,
    num_columns: usize,
    samples_per_frame: usize,
}

impl WaveformView {
    /// Creates an empty view drawing `samples_per_frame` frames across `num_columns`.
    pub fn new(num_columns: usize, samples_per_frame: usize) -> Self {
        Self {
            channels: Vec::new(),
            num_columns,
            samples_per_frame,
        }
    }

    /// Rebuilds the columns from the frames starting at `frame_position`.
    ///
    /// Each column holds the peak absolute amplitude of its frames, scaled to 0-100.
    /// Frames outside the waveform read as silence.
    pub fn update(&mut self, waveform: &Waveform, frame_position: i64) {
        let channel_count = waveform.channels() as usize;
        self.channels = (0..channel_count)
            .map(|channel| {
                column_peaks(
                    waveform,
                    channel,
                    frame_position,
                    self.samples_per_frame,
                    self.num_columns,
                )
            })
            .collect();
    }

    /// Resizes the view for a new terminal width. Columns are blank until the next update.
    pub fn resize(&mut self, new_width: usize) {
        self.num_columns = new_width;
        for columns in &mut self.channels {
            *columns = vec![0u64; new_width];
        }
    }

    /// Column heights for `channel`, or an empty slice before the first update.
    pub fn channel(&self, channel: usize) -> &[u64] {
        self.channels.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

fn column_peaks(
    waveform: &Waveform,
    channel: usize,
    frame_position: i64,
    samples_per_frame: usize,
    num_columns: usize,
) -> Vec<u64> {
    let stride = waveform.channels() as i64;
    let mut result = vec![0u64; num_columns];
    if num_columns == 0 {
        return result;
    }

    for (column, value) in result.iter_mut().enumerate() {
        let start = (column * samples_per_frame) / num_columns;
        let end = ((column + 1) * samples_per_frame / num_columns).max(start + 1);

        let peak = (start..end)
            .map(|offset| {
                let frame = frame_position.saturating_add(offset as i64);
                let index = frame.saturating_mul(stride).saturating_add(channel as i64);
                waveform.sample_at(index).unsigned_abs()
            })
            .max()
            .unwrap_or(0);

        *value = (peak as u64 * 100) / 32768;
    }

    result
}
