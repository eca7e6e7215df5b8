//! Rec. ITU-R BS.2127-conformant object-based spatial audio renderer.
//!
//! Renders ADM `Object`, `DirectSpeaker`, `HOA`, and `Binaural` content
//! types to either a fixed loudspeaker bed or two-channel binaural, via the
//! [`Renderer`] façade.

pub mod ambisonic;
pub mod coordinates;
pub mod decorrelate;
pub mod error;
pub mod gain;
pub mod hrtf;
pub mod layout;
pub mod metadata;
pub mod mt19937;
pub mod panner;
pub mod renderer;
pub mod tables;

pub use error::{RenderError, RenderResult};
pub use renderer::{Config, ContentRole, OutputLayout, Renderer};
