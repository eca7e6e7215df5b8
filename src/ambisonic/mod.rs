//! Ambisonic (HOA) encode/rotate/decode path, including the binaural
//! virtual-loudspeaker decode (Rec. ITU-R BS.2127-0 sec. 9).

pub mod binaural;
pub mod decode;
pub mod encode;
pub mod rotate;
pub mod sh;
pub mod shelf;

pub use binaural::BinauralDecoder;
pub use decode::AllRadDecoder;
pub use encode::{AmbisonicEncoder, AmbisonicExtentHandler};
pub use rotate::{RotationOrder, Rotator};
pub use sh::HoaOrder;
pub use shelf::ShelfFilterBank;
