//! Sample-accurate linear gain-vector interpolation between successive
//! per-block gain targets (Rec. ITU-R BS.2127-0 sec. 7.4, `GainInterp`).

/// Cross-fades an accumulated output from one gain vector to the next over
/// a configurable number of samples. The very first call to
/// [`Self::set_gain_vector`] snaps directly to its target — there is no
/// audio before the first block to fade from.
pub struct GainInterpolator {
    num_channels: usize,
    gain_vec: Vec<f64>,
    target_gain_vec: Vec<f64>,
    interp_dur_in_samples: usize,
    i_interp_count: usize,
    is_first_call: bool,
}

impl GainInterpolator {
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels,
            gain_vec: vec![0.0; num_channels],
            target_gain_vec: vec![0.0; num_channels],
            interp_dur_in_samples: 0,
            i_interp_count: 0,
            is_first_call: true,
        }
    }

    pub fn set_gain_vector(&mut self, new_gain_vec: &[f64], interp_time_in_samples: usize) {
        debug_assert_eq!(new_gain_vec.len(), self.num_channels);
        if new_gain_vec == self.target_gain_vec.as_slice() {
            return;
        }

        if self.is_first_call {
            self.gain_vec = new_gain_vec.to_vec();
            self.target_gain_vec = new_gain_vec.to_vec();
            self.interp_dur_in_samples = 0;
            self.i_interp_count = 0;
        } else {
            self.gain_vec = self.target_gain_vec.clone();
            self.target_gain_vec = new_gain_vec.to_vec();
            self.interp_dur_in_samples = interp_time_in_samples;
            self.i_interp_count = 0;
        }
    }

    /// Accumulates (adds onto) `output[ch][sample]` the interpolated,
    /// per-channel-gained copy of `input`.
    pub fn process_accumul(&mut self, input: &[f64], output: &mut [Vec<f64>]) {
        let n_samples = input.len();
        let n_interp_samples = (self.interp_dur_in_samples.saturating_sub(self.i_interp_count)).min(n_samples);
        let delta: Vec<f64> = self
            .gain_vec
            .iter()
            .zip(self.target_gain_vec.iter())
            .map(|(g, t)| {
                if self.interp_dur_in_samples > 0 {
                    (t - g) / self.interp_dur_in_samples as f64
                } else {
                    0.0
                }
            })
            .collect();

        for s in 0..n_interp_samples {
            for ch in 0..self.num_channels {
                output[ch][s] += input[s] * (self.gain_vec[ch] + delta[ch] * (self.i_interp_count + s) as f64);
            }
        }
        for s in n_interp_samples..n_samples {
            for ch in 0..self.num_channels {
                output[ch][s] += input[s] * self.target_gain_vec[ch];
            }
        }

        self.i_interp_count += n_interp_samples;
        self.is_first_call = false;
    }

    pub fn reset(&mut self) {
        self.i_interp_count = self.interp_dur_in_samples;
        self.gain_vec = self.target_gain_vec.clone();
        self.is_first_call = true;
    }
}
