//! End-to-end scenarios and quantified invariants driven through the public
//! [`admrender::Renderer`] façade (Rec. ITU-R BS.2127-0 sec. 8).

use admrender::coordinates::PolarPosition;
use admrender::gain::object::ObjectGainCalculator;
use admrender::hrtf::SyntheticHrtfProvider;
use admrender::metadata::{ChannelLock, DirectSpeakerMetadata, ObjectMetadata, ObjectPosition, PolarBounds, ScreenEdgeLock};
use admrender::panner::point_source::PointSourcePannerGainCalc;
use admrender::panner::PolarExtentHandler;
use admrender::tables;
use admrender::{Config, ContentRole, OutputLayout, Renderer};

const SAMPLE_RATE: u32 = 48_000;
const BLOCK_SIZE: usize = 128;

fn impulse(n: usize) -> Vec<f64> {
    let mut v = vec![0.0; n];
    v[0] = 1.0;
    v
}

fn render_one_block(renderer: &mut Renderer) -> Vec<Vec<f64>> {
    let n = renderer.get_speaker_count();
    let mut bufs = vec![vec![0.0; BLOCK_SIZE]; n];
    {
        let mut refs: Vec<&mut [f64]> = bufs.iter_mut().map(|v| v.as_mut_slice()).collect();
        renderer.get_rendered_audio(&mut refs, BLOCK_SIZE).unwrap();
    }
    bufs
}

/// The decorrelator's 255-sample compensation delay (see
/// `src/decorrelate.rs`) means a single-block impulse does not appear at
/// `GetRenderedAudio`'s output until partway through the *following* block
/// (255 falls at local index `255 - BLOCK_SIZE` of the second render call,
/// since `COMPENSATION_DELAY = 255 > BLOCK_SIZE`). Every scenario test below
/// feeds its block once, discards the (silent) first render, and inspects
/// the second render at this fixed offset.
const DELAYED_INDEX: usize = 255 - BLOCK_SIZE;

fn render_past_compensation_delay(renderer: &mut Renderer) -> Vec<Vec<f64>> {
    let _ = render_one_block(renderer);
    render_one_block(renderer)
}

fn speakers_0_5_0(stream_info: Vec<ContentRole>) -> Config {
    Config {
        output_layout: OutputLayout::Speakers("0+5+0".to_string()),
        hoa_order: 1,
        sample_rate: SAMPLE_RATE,
        max_block_size: BLOCK_SIZE,
        stream_info,
        reproduction_screen: None,
        low_cpu_binaural: false,
    }
}

fn dominant_channel(bufs: &[Vec<f64>], at: usize) -> usize {
    bufs.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a[at].abs().partial_cmp(&b[at].abs()).unwrap())
        .map(|(i, _)| i)
        .unwrap()
}

// --- Scenario A: object at {30, 0, 1.0} excites M+030 alone ---

#[test]
fn scenario_a_object_on_axis_pans_fully_to_its_speaker() {
    let mut renderer = Renderer::configure(speakers_0_5_0(vec![ContentRole::Object]), None).unwrap();
    let metadata = ObjectMetadata {
        track_index: 0,
        position: ObjectPosition::Polar(PolarPosition::new(30.0, 0.0, 1.0)),
        block_length: BLOCK_SIZE,
        ..ObjectMetadata::default()
    };
    renderer.add_object(&metadata, &impulse(BLOCK_SIZE), 0);
    let bufs = render_past_compensation_delay(&mut renderer);

    let layout = tables::matching_layout("0+5+0").unwrap();
    let m030 = layout.matching_channel_index("M+030").unwrap();
    assert_eq!(dominant_channel(&bufs, DELAYED_INDEX), m030);
    for (ch, buf) in bufs.iter().enumerate() {
        if ch != m030 {
            assert!(buf[DELAYED_INDEX].abs() < 1e-6, "channel {ch} unexpectedly active: {}", buf[DELAYED_INDEX]);
        }
    }
    assert!((bufs[m030][DELAYED_INDEX] - 1.0).abs() < 1e-6);
}

// --- Scenario B: channel-lock snaps a near-centre object onto M+000 ---

#[test]
fn scenario_b_channel_lock_snaps_to_nearest_speaker() {
    let mut renderer = Renderer::configure(speakers_0_5_0(vec![ContentRole::Object]), None).unwrap();
    let metadata = ObjectMetadata {
        track_index: 0,
        position: ObjectPosition::Polar(PolarPosition::new(15.0, 0.0, 1.0)),
        channel_lock: Some(ChannelLock { max_distance: 1.0 }),
        block_length: BLOCK_SIZE,
        ..ObjectMetadata::default()
    };
    renderer.add_object(&metadata, &impulse(BLOCK_SIZE), 0);
    let bufs = render_past_compensation_delay(&mut renderer);

    let layout = tables::matching_layout("0+5+0").unwrap();
    let m000 = layout.matching_channel_index("M+000").unwrap();
    assert_eq!(dominant_channel(&bufs, DELAYED_INDEX), m000);
    assert!((bufs[m000][DELAYED_INDEX] - 1.0).abs() < 1e-6);
}

// --- Scenario C: channel-lock tie-break picks M-110 at 180 degrees ---

#[test]
fn scenario_c_channel_lock_tie_break_favours_m_minus_110() {
    let mut renderer = Renderer::configure(speakers_0_5_0(vec![ContentRole::Object]), None).unwrap();
    let metadata = ObjectMetadata {
        track_index: 0,
        position: ObjectPosition::Polar(PolarPosition::new(180.0, 0.0, 1.0)),
        channel_lock: Some(ChannelLock { max_distance: 2.0 }),
        block_length: BLOCK_SIZE,
        ..ObjectMetadata::default()
    };
    renderer.add_object(&metadata, &impulse(BLOCK_SIZE), 0);
    let bufs = render_past_compensation_delay(&mut renderer);

    let layout = tables::matching_layout("0+5+0").unwrap();
    let m_minus_110 = layout.matching_channel_index("M-110").unwrap();
    assert_eq!(dominant_channel(&bufs, DELAYED_INDEX), m_minus_110);
}

// --- Scenario D: empty speaker label falls back to bounds search ---

#[test]
fn scenario_d_direct_speaker_bounds_fallback_picks_m030() {
    let mut renderer = Renderer::configure(speakers_0_5_0(vec![ContentRole::DirectSpeaker]), None).unwrap();
    let metadata = DirectSpeakerMetadata {
        track_index: 0,
        speaker_label: String::new(),
        audio_pack_format_id: None,
        gain: 1.0,
        is_lfe: false,
        nominal_position: Some(PolarPosition::new(28.0, 5.0, 1.0)),
        bounds: Some(PolarBounds {
            min_azimuth: 25.0,
            max_azimuth: 35.0,
            min_elevation: -10.0,
            max_elevation: 10.0,
            min_distance: 0.9,
            max_distance: 1.1,
        }),
        screen_edge_lock: ScreenEdgeLock::default(),
    };
    renderer.add_direct_speaker(&metadata, &impulse(BLOCK_SIZE), 0);
    let bufs = render_past_compensation_delay(&mut renderer);

    let layout = tables::matching_layout("0+5+0").unwrap();
    let m030 = layout.matching_channel_index("M+030").unwrap();
    assert_eq!(dominant_channel(&bufs, DELAYED_INDEX), m030);
    assert!((bufs[m030][DELAYED_INDEX] - 1.0).abs() < 1e-6);
}

// --- Scenario E: U+180 on a 2+5+0 output folds down via the mapping rule ---

#[test]
fn scenario_e_mapping_rule_folds_u180_onto_upper_pair() {
    let config = Config {
        output_layout: OutputLayout::Speakers("2+5+0".to_string()),
        hoa_order: 1,
        sample_rate: SAMPLE_RATE,
        max_block_size: BLOCK_SIZE,
        stream_info: vec![ContentRole::DirectSpeaker],
        reproduction_screen: None,
        low_cpu_binaural: false,
    };
    let mut renderer = Renderer::configure(config, None).unwrap();
    let metadata = DirectSpeakerMetadata {
        track_index: 0,
        speaker_label: "U+180".to_string(),
        audio_pack_format_id: Some("AP_00010004".to_string()),
        gain: 1.0,
        is_lfe: false,
        nominal_position: None,
        bounds: None,
        screen_edge_lock: ScreenEdgeLock::default(),
    };
    renderer.add_direct_speaker(&metadata, &impulse(BLOCK_SIZE), 0);
    let bufs = render_past_compensation_delay(&mut renderer);

    let layout = tables::matching_layout("2+5+0").unwrap();
    let u_l = layout.matching_channel_index("U+030").unwrap();
    let u_r = layout.matching_channel_index("U-030").unwrap();
    assert!((bufs[u_l][DELAYED_INDEX] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    assert!((bufs[u_r][DELAYED_INDEX] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
}

// --- Scenario F: a low-pass DirectSpeaker block routes to LFE1 ---

#[test]
fn scenario_f_lfe_direct_speaker_routes_to_lfe1() {
    let mut renderer = Renderer::configure(speakers_0_5_0(vec![ContentRole::DirectSpeaker]), None).unwrap();
    let metadata = DirectSpeakerMetadata {
        track_index: 0,
        speaker_label: "anything".to_string(),
        audio_pack_format_id: None,
        gain: 1.0,
        is_lfe: true,
        nominal_position: None,
        bounds: None,
        screen_edge_lock: ScreenEdgeLock::default(),
    };
    renderer.add_direct_speaker(&metadata, &impulse(BLOCK_SIZE), 0);
    let bufs = render_past_compensation_delay(&mut renderer);

    let layout = tables::matching_layout("0+5+0").unwrap();
    let lfe = layout.matching_channel_index("LFE1").unwrap();
    assert_eq!(dominant_channel(&bufs, DELAYED_INDEX), lfe);
    assert!((bufs[lfe][DELAYED_INDEX] - 1.0).abs() < 1e-6);
}

// --- Scenario G: diffuse split gains direct/diffuse energy by sqrt(1-d)/sqrt(d) ---

#[test]
fn scenario_g_diffuse_split_matches_sqrt_law() {
    let layout = tables::matching_layout("0+5+0").unwrap();
    let calc = ObjectGainCalculator::new(&layout);
    let metadata = ObjectMetadata {
        track_index: 0,
        position: ObjectPosition::Polar(PolarPosition::new(0.0, 0.0, 1.0)),
        diffuse: 0.25,
        width: 0.0,
        height: 0.0,
        depth: 0.0,
        ..ObjectMetadata::default()
    };
    let point = PointSourcePannerGainCalc::new(&layout);
    let psp = point.calculate_gains(PolarPosition::new(0.0, 0.0, 1.0).to_cartesian().as_array());
    let gains = calc.calculate_gains(&metadata);

    for (d, p) in gains.direct.iter().zip(psp.iter()) {
        assert!((d - 0.75f64.sqrt() * p).abs() < 1e-9);
    }
    for (d, p) in gains.diffuse.iter().zip(psp.iter()) {
        assert!((d - 0.25f64.sqrt() * p).abs() < 1e-9);
    }
}

// --- Testable property 1: velocity-vector reconstruction on the horizontal plane ---

#[test]
fn invariant_1_velocity_vector_reconstructs_requested_direction() {
    let layout = tables::matching_layout("0+5+0").unwrap();
    let panner = PointSourcePannerGainCalc::new(&layout);

    for az_deg in (-175..=175).step_by(5) {
        let az = az_deg as f64;
        let polar = PolarPosition::new(az, 0.0, 1.0);
        let dir = polar.to_cartesian().as_array();
        let gains = panner.calculate_gains(dir);

        let sum_g: f64 = gains.iter().sum();
        if sum_g.abs() < 1e-6 {
            continue;
        }
        let positions: Vec<[f64; 3]> = layout.channels.iter().map(|c| c.polar_position_nominal.to_cartesian().as_array()).collect();
        let mut velocity = [0.0; 3];
        for (g, p) in gains.iter().zip(positions.iter()) {
            for k in 0..3 {
                velocity[k] += g * p[k];
            }
        }
        for v in &mut velocity {
            *v /= sum_g;
        }
        let recovered = admrender::coordinates::CartesianPosition::new(velocity[0], velocity[1], velocity[2]).to_polar();
        let diff = (recovered.azimuth - az).abs().min((recovered.azimuth - az + 360.0).abs()).min((recovered.azimuth - az - 360.0).abs());
        assert!(diff < 1.0, "az {az}: velocity-vector azimuth {} diverges", recovered.azimuth);
    }
}

// --- Testable property 3: identical metadata produces an identical gain vector ---

#[test]
fn invariant_3_repeated_metadata_yields_identical_gains() {
    let layout = tables::matching_layout("0+5+0").unwrap();
    let calc = ObjectGainCalculator::new(&layout);
    let metadata = ObjectMetadata {
        position: ObjectPosition::Polar(PolarPosition::new(42.0, -8.0, 1.0)),
        ..ObjectMetadata::default()
    };
    let a = calc.calculate_gains(&metadata);
    let b = calc.calculate_gains(&metadata);
    assert_eq!(a.direct, b.direct);
    assert_eq!(a.diffuse, b.diffuse);
}

// --- Testable property 5: diffuse split 2-norm scaling ---

#[test]
fn invariant_5_diffuse_split_preserves_norm_scaling() {
    let layout = tables::matching_layout("0+5+0").unwrap();
    let calc = ObjectGainCalculator::new(&layout);
    for &d in &[0.0, 0.3, 0.6, 1.0] {
        let metadata = ObjectMetadata {
            position: ObjectPosition::Polar(PolarPosition::new(10.0, 0.0, 1.0)),
            diffuse: d,
            ..ObjectMetadata::default()
        };
        let gains = calc.calculate_gains(&metadata);
        let direct_norm: f64 = gains.direct.iter().map(|g| g * g).sum::<f64>().sqrt();
        let diffuse_norm: f64 = gains.diffuse.iter().map(|g| g * g).sum::<f64>().sqrt();
        let point = PointSourcePannerGainCalc::new(&layout);
        let psp_norm: f64 = point
            .calculate_gains(PolarPosition::new(10.0, 0.0, 1.0).to_cartesian().as_array())
            .iter()
            .map(|g| g * g)
            .sum::<f64>()
            .sqrt();
        assert!((direct_norm - (1.0 - d).sqrt() * psp_norm).abs() < 1e-9);
        assert!((diffuse_norm - d.sqrt() * psp_norm).abs() < 1e-9);
    }
}

// --- Testable property 6: ADM polar -> Cartesian -> polar round trip ---

#[test]
fn invariant_6_adm_round_trip_recovers_position() {
    use admrender::coordinates::{adm_cartesian_to_polar, adm_polar_to_cartesian};
    for &(az, el) in &[(5.0, 2.0), (-60.0, 10.0), (150.0, -20.0), (-150.0, 50.0), (0.0, 0.0)] {
        let p = PolarPosition::new(az, el, 1.0);
        let back = adm_cartesian_to_polar(adm_polar_to_cartesian(p));
        assert!((back.azimuth - az).abs() < 1e-6, "azimuth round-trip failed for ({az}, {el})");
        assert!((back.elevation - el).abs() < 1e-6, "elevation round-trip failed for ({az}, {el})");
    }
}

// --- Testable property 7: zero extent equals the point-source panner exactly ---

#[test]
fn invariant_7_zero_extent_equals_point_source_exactly() {
    let layout = tables::matching_layout("0+5+0").unwrap();
    let extent = PolarExtentHandler::new(&layout);
    let point = PointSourcePannerGainCalc::new(&layout);

    let polar = PolarPosition::new(-60.0, 12.0, 1.0);
    let g_extent = extent.handle(polar, 0.0, 0.0, 0.0);
    let g_point = point.calculate_gains(polar.to_cartesian().as_array());
    for (a, b) in g_extent.iter().zip(g_point.iter()) {
        assert!((a - b).abs() < 1e-12);
    }
}

// --- Testable property 8: a repeated SetHeadOrientation performs no cross-fade restart ---

fn binaural_config() -> Config {
    Config {
        output_layout: OutputLayout::Binaural,
        hoa_order: 1,
        sample_rate: SAMPLE_RATE,
        max_block_size: BLOCK_SIZE,
        stream_info: vec![ContentRole::Object],
        reproduction_screen: None,
        low_cpu_binaural: false,
    }
}

#[test]
fn invariant_8_repeated_orientation_does_not_alter_subsequent_output() {
    let metadata = ObjectMetadata {
        position: ObjectPosition::Polar(PolarPosition::new(30.0, 0.0, 1.0)),
        block_length: BLOCK_SIZE,
        ..ObjectMetadata::default()
    };

    let mut once = Renderer::configure(binaural_config(), Some(Box::new(SyntheticHrtfProvider::new(SAMPLE_RATE)))).unwrap();
    once.set_head_orientation(0.5, 0.1, 0.0);

    let mut twice = Renderer::configure(binaural_config(), Some(Box::new(SyntheticHrtfProvider::new(SAMPLE_RATE)))).unwrap();
    twice.set_head_orientation(0.5, 0.1, 0.0);
    twice.set_head_orientation(0.5, 0.1, 0.0);

    for _ in 0..3 {
        once.add_object(&metadata, &impulse(BLOCK_SIZE), 0);
        twice.add_object(&metadata, &impulse(BLOCK_SIZE), 0);
        let a = render_one_block(&mut once);
        let b = render_one_block(&mut twice);
        for (x, y) in a.iter().zip(b.iter()) {
            for (p, q) in x.iter().zip(y.iter()) {
                assert!((p - q).abs() < 1e-12);
            }
        }
    }
}

// --- End-to-end: a reset clears per-track cache state and pending beds ---

#[test]
fn reset_produces_silence_on_the_next_block() {
    let mut renderer = Renderer::configure(speakers_0_5_0(vec![ContentRole::Object]), None).unwrap();
    let metadata = ObjectMetadata {
        position: ObjectPosition::Polar(PolarPosition::new(0.0, 0.0, 1.0)),
        block_length: BLOCK_SIZE,
        ..ObjectMetadata::default()
    };
    renderer.add_object(&metadata, &impulse(BLOCK_SIZE), 0);
    renderer.reset();
    let bufs = render_one_block(&mut renderer);
    for buf in &bufs {
        assert!(buf.iter().all(|&x| x.abs() < 1e-9));
    }
}
