//! Renderer façade: frame scheduling, per-track gain-vector caching and
//! interpolation, decorrelation, and Ambisonic decode, tying together every
//! other module into the public per-block API (Rec. ITU-R BS.2127-0 sec. 5).

use std::collections::HashMap;

use crate::ambisonic::{AllRadDecoder, BinauralDecoder, HoaOrder, RotationOrder, Rotator, ShelfFilterBank};
use crate::decorrelate::Decorrelator;
use crate::error::{RenderError, RenderResult};
use crate::gain::{object_ambisonic::AmbisonicObjectGainCalculator, DirectSpeakerGainCalculator, GainInterpolator, ObjectGainCalculator};
use crate::hrtf::HrtfProvider;
use crate::layout::{Layout, Screen};
use crate::metadata::{BinauralMetadata, DirectSpeakerMetadata, HoaMetadata, HoaNormalization, ObjectMetadata};
use crate::tables;

/// Default cross-fade window applied to a head-orientation change
/// (SetHeadOrientation is edge-triggered but the transition itself is not
/// sample-accurate from the caller's point of view; this matches the
/// existing [`crate::decorrelate::Decorrelator`] compensation delay order of
/// magnitude).
const ORIENTATION_FADE_MS: f64 = 10.0;

/// The ADM content role a track was declared with in `streamInfo`; the
/// matching `AddX` call must agree or the block is dropped with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ContentRole {
    Object,
    DirectSpeaker,
    Hoa,
    Binaural,
}

/// Supported output targets.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum OutputLayout {
    /// One of the fixed loudspeaker beds, named by its ITU layout string
    /// (e.g. `"0+5+0"`).
    Speakers(String),
    Binaural,
}

/// Renderer configuration, supplied once to [`Renderer::configure`] — plain
/// `serde::Deserialize` so hosts may load it from JSON (SPEC_FULL.md §3.1),
/// mirroring the `Configure` parameter list in full except for the HRTF
/// provider itself, which is a runtime trait object passed alongside.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub output_layout: OutputLayout,
    pub hoa_order: u8,
    pub sample_rate: u32,
    pub max_block_size: usize,
    /// Declares, per track index, the content role that track's `AddX`
    /// calls must match.
    pub stream_info: Vec<ContentRole>,
    pub reproduction_screen: Option<Screen>,
    /// Halves the HRTF data a [`HrtfProvider`] must supply by mirroring the
    /// left ear's decode for the right (binaural output only).
    pub low_cpu_binaural: bool,
}

impl Config {
    /// Parses a [`Config`] from JSON (SPEC_FULL.md §3.1's host-loadable
    /// configuration requirement), matching the teacher's `serde_json`
    /// dependency rather than hand-rolling a parser.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).map_err(anyhow::Error::from)
    }

    /// Serialises back to JSON, e.g. for logging the active configuration.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).map_err(anyhow::Error::from)
    }
}

struct ObjectTrackState {
    direct_interp: GainInterpolator,
    diffuse_interp: GainInterpolator,
    last_metadata: Option<ObjectMetadata>,
}

impl ObjectTrackState {
    fn new(num_channels: usize) -> Self {
        Self {
            direct_interp: GainInterpolator::new(num_channels),
            diffuse_interp: GainInterpolator::new(num_channels),
            last_metadata: None,
        }
    }

    fn reset(&mut self) {
        self.direct_interp.reset();
        self.diffuse_interp.reset();
        self.last_metadata = None;
    }
}

struct SpeakerTarget {
    layout: Layout,
    object_gain_calc: ObjectGainCalculator,
    direct_speaker_calc: DirectSpeakerGainCalculator,
    hoa_decoder: AllRadDecoder,
    decorrelator: Decorrelator,
    direct_bed: Vec<Vec<f64>>,
    diffuse_bed: Vec<Vec<f64>>,
    hoa_bed: Vec<Vec<f64>>,
}

struct BinauralTarget {
    order: HoaOrder,
    object_gain_calc: AmbisonicObjectGainCalculator,
    shelf: ShelfFilterBank,
    rotator: Rotator,
    binaural_decoder: BinauralDecoder,
    decorrelator: Decorrelator,
    direct_bed: Vec<Vec<f64>>,
    diffuse_bed: Vec<Vec<f64>>,
    passthrough_left: Vec<f64>,
    passthrough_right: Vec<f64>,
    rotation_order: RotationOrder,
    last_orientation: Option<(f64, f64, f64)>,
    reproduction_screen: Option<Screen>,
}

enum Target {
    Speakers(SpeakerTarget),
    Binaural(BinauralTarget),
}

/// Drives the full rendering pipeline for one ADM programme: accepts
/// per-block metadata and audio for each declared track, and produces
/// rendered output for the configured target.
pub struct Renderer {
    sample_rate: u32,
    max_block_size: usize,
    stream_info: Vec<ContentRole>,
    target: Target,
    object_states: HashMap<usize, ObjectTrackState>,
}

fn block_channel_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ACN{i:02}")).collect()
}

fn warn_skip(track_index: usize, reason: &str) {
    log::warn!("skipping track {track_index}: {reason}");
}

impl Renderer {
    /// Validates `config`, builds the configured output target, and
    /// constructs an empty per-track state table.
    pub fn configure(config: Config, hrtf_provider: Option<Box<dyn HrtfProvider>>) -> RenderResult<Self> {
        if config.sample_rate == 0 {
            return Err(RenderError::InvalidSampleRate(config.sample_rate));
        }
        if config.max_block_size == 0 {
            return Err(RenderError::InvalidBlockSize(config.max_block_size));
        }
        let order = HoaOrder::new(config.hoa_order)?;

        let target = match &config.output_layout {
            OutputLayout::Speakers(name) => {
                let layout = tables::matching_layout(name).ok_or_else(|| RenderError::UnsupportedLayout(name.clone()))?;
                let mut layout = layout;
                layout.reproduction_screen = config.reproduction_screen;

                let object_gain_calc = ObjectGainCalculator::new(&layout);
                let direct_speaker_calc = DirectSpeakerGainCalculator::new(&layout);
                let hoa_decoder = AllRadDecoder::new(order, &layout, config.sample_rate as f64);
                let names = layout.channel_names();
                let decorrelator = Decorrelator::new(config.max_block_size, &names);
                let n_ch = layout.channels.len();

                Target::Speakers(SpeakerTarget {
                    layout,
                    object_gain_calc,
                    direct_speaker_calc,
                    hoa_decoder,
                    decorrelator,
                    direct_bed: vec![vec![0.0; config.max_block_size]; n_ch],
                    diffuse_bed: vec![vec![0.0; config.max_block_size]; n_ch],
                    hoa_bed: vec![vec![0.0; config.max_block_size]; order.channel_count()],
                })
            }
            OutputLayout::Binaural => {
                let provider = hrtf_provider.ok_or_else(|| RenderError::HrtfUnavailable("no HRTF provider supplied".to_string()))?;
                if provider.sample_rate() != config.sample_rate {
                    return Err(RenderError::InvalidSampleRate(provider.sample_rate()));
                }

                let object_gain_calc = AmbisonicObjectGainCalculator::new(order, config.reproduction_screen);
                let shelf = ShelfFilterBank::new(order, config.sample_rate as f64);
                let rotator = Rotator::new(order);
                let binaural_decoder = BinauralDecoder::new(order, provider.as_ref(), config.sample_rate as f64, config.max_block_size, config.low_cpu_binaural);
                let names = block_channel_names(order.channel_count());
                let decorrelator = Decorrelator::new(config.max_block_size, &names);
                let n_ch = order.channel_count();

                Target::Binaural(BinauralTarget {
                    order,
                    object_gain_calc,
                    shelf,
                    rotator,
                    binaural_decoder,
                    decorrelator,
                    direct_bed: vec![vec![0.0; config.max_block_size]; n_ch],
                    diffuse_bed: vec![vec![0.0; config.max_block_size]; n_ch],
                    passthrough_left: vec![0.0; config.max_block_size],
                    passthrough_right: vec![0.0; config.max_block_size],
                    rotation_order: RotationOrder::Ypr,
                    last_orientation: None,
                    reproduction_screen: config.reproduction_screen,
                })
            }
        };

        Ok(Self { sample_rate: config.sample_rate, max_block_size: config.max_block_size, stream_info: config.stream_info, target, object_states: HashMap::new() })
    }

    pub fn get_speaker_count(&self) -> usize {
        match &self.target {
            Target::Speakers(t) => t.layout.channels.len(),
            Target::Binaural(_) => 2,
        }
    }

    fn role_ok(&self, track_index: usize, expected: ContentRole) -> bool {
        match self.stream_info.get(track_index) {
            Some(&role) if role == expected => true,
            Some(_) => {
                warn_skip(track_index, "block's content type does not match the declared streamInfo role");
                false
            }
            None => {
                warn_skip(track_index, "track index out of range for the configured streamInfo");
                false
            }
        }
    }

    /// Clamps `(offset, input.len())` to the configured block size, logging
    /// and shortening on overrun.
    fn clamp_span(&self, track_index: usize, offset: usize, len: usize) -> Option<(usize, usize)> {
        if offset >= self.max_block_size {
            warn_skip(track_index, "offset beyond the configured maximum block size");
            return None;
        }
        let clamped = len.min(self.max_block_size - offset);
        if clamped < len {
            warn_skip(track_index, "block exceeds the configured maximum block size; truncating");
        }
        Some((offset, clamped))
    }

    fn interp_samples(metadata: &ObjectMetadata, block_len: usize) -> usize {
        if metadata.jump_position.flag {
            metadata.jump_position.interpolation_length
        } else if metadata.block_length > 0 {
            metadata.block_length
        } else {
            block_len
        }
    }

    /// Feeds one block of `Object`-type audio and metadata into the
    /// internal direct/diffuse beds at sample offset `offset`.
    pub fn add_object(&mut self, metadata: &ObjectMetadata, input: &[f64], offset: usize) {
        let track_index = metadata.track_index;
        if !self.role_ok(track_index, ContentRole::Object) {
            return;
        }
        let Some((offset, len)) = self.clamp_span(track_index, offset, input.len()) else { return };
        let input = &input[..len];

        let num_channels = match &self.target {
            Target::Speakers(t) => t.layout.channels.len(),
            Target::Binaural(t) => t.order.channel_count(),
        };
        let state = self.object_states.entry(track_index).or_insert_with(|| ObjectTrackState::new(num_channels));

        let recompute = state.last_metadata.as_ref() != Some(metadata);
        let interp_len = Self::interp_samples(metadata, len);

        if recompute {
            let (direct, diffuse) = match &self.target {
                Target::Speakers(t) => {
                    let g = t.object_gain_calc.calculate_gains(metadata);
                    (g.direct, g.diffuse)
                }
                Target::Binaural(t) => {
                    let g = t.object_gain_calc.calculate_gains(metadata);
                    (g.direct, g.diffuse)
                }
            };
            state.direct_interp.set_gain_vector(&direct, interp_len);
            state.diffuse_interp.set_gain_vector(&diffuse, interp_len);
        }

        let mut direct_tmp = vec![vec![0.0; len]; num_channels];
        state.direct_interp.process_accumul(input, &mut direct_tmp);
        let mut diffuse_tmp = vec![vec![0.0; len]; num_channels];
        state.diffuse_interp.process_accumul(input, &mut diffuse_tmp);

        let (direct_bed, diffuse_bed) = match &mut self.target {
            Target::Speakers(t) => (&mut t.direct_bed, &mut t.diffuse_bed),
            Target::Binaural(t) => (&mut t.direct_bed, &mut t.diffuse_bed),
        };
        for ch in 0..num_channels {
            for i in 0..len {
                direct_bed[ch][offset + i] += direct_tmp[ch][i];
                diffuse_bed[ch][offset + i] += diffuse_tmp[ch][i];
            }
        }
        state.last_metadata = Some(metadata.clone());
    }

    /// Resolves a `DirectSpeaker` block's direction for the binaural path,
    /// where no loudspeaker layout exists to route a nominal label to.
    fn direct_speaker_binaural_position(metadata: &DirectSpeakerMetadata) -> crate::coordinates::PolarPosition {
        use crate::layout::nominal_speaker_label;
        let label = nominal_speaker_label(&metadata.speaker_label);
        if let Some(p) = metadata.nominal_position {
            return p;
        }
        if let Some(p) = tables::bs2094_position(&label) {
            return p;
        }
        log::warn!("DirectSpeaker label {label:?} not found in BS.2094; defaulting to front");
        crate::coordinates::PolarPosition::new(0.0, 0.0, 1.0)
    }

    /// Feeds one block of `DirectSpeaker`-type audio. Routed straight into
    /// the direct bed at its full block gain; no interpolation is applied
    /// (BS.2127 does not specify a `DirectSpeaker` analogue of `jumpPosition`).
    pub fn add_direct_speaker(&mut self, metadata: &DirectSpeakerMetadata, input: &[f64], offset: usize) {
        let track_index = metadata.track_index;
        if !self.role_ok(track_index, ContentRole::DirectSpeaker) {
            return;
        }
        let Some((offset, len)) = self.clamp_span(track_index, offset, input.len()) else { return };
        let input = &input[..len];

        match &mut self.target {
            Target::Speakers(t) => {
                let gains = t.direct_speaker_calc.calculate_gains(metadata);
                for (ch, &g) in gains.iter().enumerate() {
                    if g == 0.0 {
                        continue;
                    }
                    for i in 0..len {
                        t.direct_bed[ch][offset + i] += g * input[i];
                    }
                }
            }
            Target::Binaural(t) => {
                use crate::ambisonic::sh;
                let position = Self::direct_speaker_binaural_position(metadata);
                let position = crate::gain::screen::handle_edge_lock(position, metadata.screen_edge_lock, t.reproduction_screen.as_ref());
                let dir = position.to_cartesian().unit().as_array();
                let coeffs = sh::encode_direction(t.order, dir[0], dir[1], dir[2]);
                for (ch, c) in coeffs.iter().enumerate() {
                    let g = metadata.gain * c;
                    if g == 0.0 {
                        continue;
                    }
                    for i in 0..len {
                        t.direct_bed[ch][offset + i] += g * input[i];
                    }
                }
            }
        }
    }

    /// Feeds one block of `HOA`-type (single ACN channel) audio, accumulated
    /// directly into the Ambisonic direct bed.
    pub fn add_hoa(&mut self, metadata: &HoaMetadata, input: &[f64], offset: usize) {
        let track_index = metadata.track_index;
        if !self.role_ok(track_index, ContentRole::Hoa) {
            return;
        }
        if metadata.normalization != HoaNormalization::Sn3d {
            warn_skip(track_index, "unsupported HOA normalisation (only SN3D is supported)");
            return;
        }
        let Some((offset, len)) = self.clamp_span(track_index, offset, input.len()) else { return };
        let input = &input[..len];

        let bed = match &mut self.target {
            Target::Speakers(t) => &mut t.hoa_bed,
            Target::Binaural(t) => &mut t.direct_bed,
        };
        let acn = metadata.acn_index as usize;
        if acn >= bed.len() {
            warn_skip(track_index, "ACN index exceeds the configured HOA order's channel count");
            return;
        }
        for i in 0..len {
            bed[acn][offset + i] += metadata.gain * input[i];
        }
    }

    /// Feeds one block of raw `Binaural`-type stereo audio, summed directly
    /// into the output with no panning. Only valid when the renderer is
    /// configured for binaural output.
    pub fn add_binaural(&mut self, metadata: &BinauralMetadata, left: &[f64], right: &[f64], offset: usize) {
        let track_index = metadata.track_index;
        if !self.role_ok(track_index, ContentRole::Binaural) {
            return;
        }
        let Target::Binaural(t) = &mut self.target else {
            warn_skip(track_index, "AddBinaural requires binaural output");
            return;
        };
        let len = left.len().min(right.len());
        let Some((offset, len)) = self.clamp_span(track_index, offset, len) else { return };
        for i in 0..len {
            t.passthrough_left[offset + i] += metadata.gain * left[i];
            t.passthrough_right[offset + i] += metadata.gain * right[i];
        }
    }

    /// Updates the listener's head orientation for binaural output. No-op
    /// (with a warning) for loudspeaker output.
    pub fn set_head_orientation(&mut self, yaw: f64, pitch: f64, roll: f64) {
        let Target::Binaural(t) = &mut self.target else {
            log::warn!("SetHeadOrientation has no effect on loudspeaker output");
            return;
        };
        if t.last_orientation == Some((yaw, pitch, roll)) {
            return;
        }
        let fade_samples = ((ORIENTATION_FADE_MS / 1000.0) * self.sample_rate as f64).round().max(1.0) as usize;
        t.rotator.set_orientation(yaw, pitch, roll, t.rotation_order, fade_samples);
        t.last_orientation = Some((yaw, pitch, roll));
    }

    /// Renders `n_samples` (<= the configured maximum block size) of output
    /// into `output`, one planar channel per entry — [`Self::get_speaker_count`]
    /// entries for loudspeaker output, or `[left, right]` for binaural.
    /// Clears the internal beds for the next block on return.
    pub fn get_rendered_audio(&mut self, output: &mut [&mut [f64]], n_samples: usize) -> RenderResult<()> {
        let n_samples = n_samples.min(self.max_block_size);

        match &mut self.target {
            Target::Speakers(t) => {
                if output.len() != t.layout.channels.len() {
                    return Err(RenderError::UnsupportedLayout(t.layout.name.clone()));
                }
                let hoa_decoded = t.hoa_decoder.decode(&t.hoa_bed);
                for ch in 0..t.layout.channels.len() {
                    let delayed = t.decorrelator.delay_direct(ch, &t.direct_bed[ch]);
                    let decorrelated = t.decorrelator.process_diffuse(ch, &t.diffuse_bed[ch]);
                    for i in 0..n_samples {
                        output[ch][i] = delayed[i] + decorrelated[i] + hoa_decoded[ch][i];
                    }
                }
                for row in &mut t.direct_bed {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
                for row in &mut t.diffuse_bed {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
                for row in &mut t.hoa_bed {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
            }
            Target::Binaural(t) => {
                if output.len() != 2 {
                    return Err(RenderError::UnsupportedLayout("binaural requires exactly 2 output channels".to_string()));
                }
                let n_ch = t.order.channel_count();
                let mut merged = vec![vec![0.0; self.max_block_size]; n_ch];
                for ch in 0..n_ch {
                    let delayed = t.decorrelator.delay_direct(ch, &t.direct_bed[ch]);
                    let decorrelated = t.decorrelator.process_diffuse(ch, &t.diffuse_bed[ch]);
                    for i in 0..self.max_block_size {
                        merged[ch][i] = delayed[i] + decorrelated[i];
                    }
                }
                t.shelf.process(&mut merged);
                let rotated = t.rotator.process(&merged);
                let (left, right) = t.binaural_decoder.decode(&rotated);
                for i in 0..n_samples {
                    output[0][i] = left[i] + t.passthrough_left[i];
                    output[1][i] = right[i] + t.passthrough_right[i];
                }

                for row in &mut t.direct_bed {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
                for row in &mut t.diffuse_bed {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
                t.passthrough_left.iter_mut().for_each(|v| *v = 0.0);
                t.passthrough_right.iter_mut().for_each(|v| *v = 0.0);
            }
        }
        Ok(())
    }

    /// Clears all per-track interpolator/cache state and internal beds,
    /// returning the renderer to its just-configured state (head
    /// orientation, if any, is preserved).
    pub fn reset(&mut self) {
        for state in self.object_states.values_mut() {
            state.reset();
        }
        match &mut self.target {
            Target::Speakers(t) => {
                t.decorrelator.reset();
                for row in t.direct_bed.iter_mut().chain(t.diffuse_bed.iter_mut()).chain(t.hoa_bed.iter_mut()) {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
            }
            Target::Binaural(t) => {
                t.decorrelator.reset();
                for row in t.direct_bed.iter_mut().chain(t.diffuse_bed.iter_mut()) {
                    row.iter_mut().for_each(|v| *v = 0.0);
                }
                t.passthrough_left.iter_mut().for_each(|v| *v = 0.0);
                t.passthrough_right.iter_mut().for_each(|v| *v = 0.0);
            }
        }
    }
}
