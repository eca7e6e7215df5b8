//! Metadata-to-gain-vector calculators (Rec. ITU-R BS.2127-0 sec. 7).

pub mod channel_lock;
pub mod direct_speaker;
pub mod divergence;
pub mod interpolator;
pub mod object;
pub mod object_ambisonic;
pub mod screen;
pub mod zone_exclusion;

pub use direct_speaker::DirectSpeakerGainCalculator;
pub use interpolator::GainInterpolator;
pub use object::ObjectGainCalculator;
pub use object_ambisonic::AmbisonicObjectGainCalculator;
