pub mod background;
pub mod consts;
pub mod detection;
pub mod error;
pub mod filters;
pub mod frame;
pub mod io;
pub mod night;
pub mod odc;
pub mod pipeline;
pub mod quality;
pub mod sky_model;
pub mod stats;
pub mod validation;
