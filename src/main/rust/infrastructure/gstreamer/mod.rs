mod capture;
mod encoder;
mod pipeline_builder;

pub use capture::GStreamerCapture;
pub use encoder::{EncodedSample, EncoderKind, EncoderSettings, SampleEncoder};
pub use pipeline_builder::PipelineBuilder;
