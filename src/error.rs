//! Error types for the ADM renderer.

use thiserror::Error;

/// Errors that can occur while configuring or driving [`crate::renderer::Renderer`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The requested output layout is not one of the supported loudspeaker
    /// beds or `Binaural`.
    #[error("unsupported output layout: {0}")]
    UnsupportedLayout(String),

    /// HOA order outside the supported `{0,1,2,3}` range.
    #[error("unsupported HOA order: {0} (must be 0..=3)")]
    BadOrder(u8),

    /// Output is `Binaural` but no HRTF provider was supplied, or the
    /// provider failed to yield impulse responses.
    #[error("HRTF data unavailable: {0}")]
    HrtfUnavailable(String),

    /// Sample rate of zero, or a provider whose sample rate disagrees with
    /// the configured rate.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// `maxBlockSize` was zero.
    #[error("invalid max block size: {0}")]
    InvalidBlockSize(usize),
}

/// Convenience alias for configuration-time results.
pub type RenderResult<T> = Result<T, RenderError>;
