//! Point-source and polar-extent panning (Rec. ITU-R BS.2127-0 sec. 6-7).

pub mod extent;
pub mod point_source;
pub mod region;

pub use extent::PolarExtentHandler;
pub use point_source::PointSourcePannerGainCalc;
