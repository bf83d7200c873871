pub mod error;
pub mod geometry;
pub mod model;

pub use error::{FormulaError, RecognitionError, Result};
pub use geometry::{BBox, MergePolicy};

/// Installs the fmt subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
