/// Version tag written to mask headers (`OSS_VER`) and reports.
pub const SKYSHIELD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Frames with fewer pixels than this are rejected as invalid input.
pub const DEFAULT_MIN_FRAME_PIXELS: usize = 64;

// ---------------------------------------------------------------------------
// Percentile detector
// ---------------------------------------------------------------------------

/// Default intensity percentile used as the candidate threshold.
pub const DEFAULT_PERCENTILE: f64 = 95.0;

/// Default Gaussian pre-smoothing sigma (pixels). 0 disables smoothing.
pub const DEFAULT_DETECTION_BLUR_SIGMA: f32 = 1.0;

/// Default minimum major/minor axis ratio for a component to count as a streak.
pub const DEFAULT_MIN_ASPECT_RATIO: f64 = 3.0;

/// Default minimum major axis length (pixels) for a streak.
pub const DEFAULT_MIN_STREAK_LENGTH: f64 = 30.0;

/// Default minimum component area (pixels); smaller blobs are noise.
pub const DEFAULT_MIN_COMPONENT_AREA: usize = 15;

// ---------------------------------------------------------------------------
// Legacy Hough detector
// ---------------------------------------------------------------------------

/// Edge threshold in standard deviations above the mean gradient magnitude.
pub const DEFAULT_HOUGH_EDGE_SIGMA: f64 = 5.0;

/// Half-width (pixels) of the band drawn around each detected line.
pub const DEFAULT_HOUGH_LINE_WIDTH: f64 = 3.0;

/// Accumulator peaks below this fraction of the global maximum are ignored.
pub const DEFAULT_HOUGH_PEAK_FRACTION: f64 = 0.3;

/// Number of discrete angles sampled over [0, pi).
pub const DEFAULT_HOUGH_ANGLE_STEPS: usize = 180;

/// Maximum number of lines reported per frame.
pub const DEFAULT_HOUGH_MAX_LINES: usize = 10;

/// Minimum accumulator votes for a line to be considered at all.
pub const DEFAULT_HOUGH_MIN_VOTES: usize = 30;

/// Non-maximum suppression half-window in the (rho, theta) accumulator.
pub const HOUGH_SUPPRESSION_RHO: usize = 10;
pub const HOUGH_SUPPRESSION_THETA: usize = 10;

// ---------------------------------------------------------------------------
// Quality scoring
// ---------------------------------------------------------------------------

/// Identifier of the severity formula. Bump when coefficients change.
pub const SEVERITY_MODEL_VERSION: &str = "severity-v1";

/// Area fraction at which the area term of the severity saturates.
pub const DEFAULT_AREA_SATURATION: f64 = 0.1;

/// Contrast (in robust sigmas) giving a contrast term of 1 - 1/e.
pub const DEFAULT_CONTRAST_SCALE: f64 = 10.0;

/// Weight of the contrast term in the severity combination.
pub const DEFAULT_CONTRAST_WEIGHT: f64 = 0.5;

/// Area fraction above which a frame is flagged `HIGH_CONTAMINATION`.
pub const DEFAULT_HIGH_CONTAMINATION_FRACTION: f64 = 0.05;

// ---------------------------------------------------------------------------
// Night aggregation
// ---------------------------------------------------------------------------

/// Number of equal-width severity histogram bins over [0, 1].
pub const DEFAULT_SEVERITY_BINS: usize = 5;

// ---------------------------------------------------------------------------
// Background / ODC
// ---------------------------------------------------------------------------

/// Sigma-clipping threshold for the background estimate.
pub const DEFAULT_CLIP_SIGMA: f64 = 3.0;

/// Maximum number of sigma-clipping iterations.
pub const DEFAULT_CLIP_ITERATIONS: usize = 5;

/// Frames with a larger masked fraction are excluded from night estimation.
pub const DEFAULT_MAX_MASKED_FRACTION: f64 = 0.25;

/// Percentile of the night's background levels used as the natural baseline.
pub const DEFAULT_BASELINE_PERCENTILE: f64 = 5.0;

/// Minimum number of usable frames for an `ok` ODC estimate.
pub const DEFAULT_MIN_ODC_FRAMES: usize = 3;

/// Default bootstrap resample count.
pub const DEFAULT_BOOTSTRAP_SAMPLES: usize = 1000;

/// Default bootstrap seed.
pub const DEFAULT_BOOTSTRAP_SEED: u64 = 42;

// ---------------------------------------------------------------------------
// Physical sky model
// ---------------------------------------------------------------------------

/// Natural dark-sky zenith brightness, V mag/arcsec^2 (Krisciunas & Schaefer).
pub const DEFAULT_DARK_SKY_MAG: f64 = 21.587;

/// V-band extinction coefficient, mag/airmass.
pub const DEFAULT_EXTINCTION: f64 = 0.25;

/// Sun altitude (degrees) below which twilight no longer contributes.
pub const DEFAULT_DARKNESS_THRESHOLD_DEG: f64 = -18.0;

/// Atmospheric scale height used to scale extinction with site altitude.
pub const ATMOSPHERE_SCALE_HEIGHT_M: f64 = 8000.0;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Fraction of a predicted component that must fall inside a ground-truth
/// box for that box to count as found.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.5;
