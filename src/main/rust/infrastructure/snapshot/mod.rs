mod jpeg_encoder;

pub use jpeg_encoder::JpegSnapshotEncoder;
