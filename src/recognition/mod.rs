pub mod bridge;
pub mod renderer;

pub use bridge::ScriptRecognizer;
pub use renderer::PdftoppmRasterizer;
