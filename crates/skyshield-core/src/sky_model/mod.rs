pub mod ephemeris;
pub mod model;

pub use ephemeris::{sky_geometry, SkyGeometry};
pub use model::{predict_sky_brightness, SkyBrightness, SkyModelCache, SkyModelConfig, SkyPrediction};
