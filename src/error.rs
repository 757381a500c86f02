//! Ошибки сглаживания и вспомогательного окружения (конфиг, превью)

pub type MouldResult<T> = Result<T, MouldError>;

#[derive(thiserror::Error, Debug)]
pub enum MouldError {
    /// Буфер высот меньше дополненной (padded) области
    #[error(
        "height buffer {buffer} is {width}×{height}, padded region needs at least {expected_width}×{expected_height}"
    )]
    BufferTooSmall {
        buffer: &'static str,
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error(
        "scratch mask is {width}×{height}, region is {expected_width}×{expected_height}"
    )]
    MaskSizeMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    /// Буферы A и B обязаны разделять одну систему координат
    #[error("height buffers differ in shape: A is {a_width}×{a_height}, B is {b_width}×{b_height}")]
    BufferShapeMismatch {
        a_width: usize,
        a_height: usize,
        b_width: usize,
        b_height: usize,
    },

    #[error("raycast offset must be finite, got {0}")]
    InvalidRaycastOffset(f32),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl MouldError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<toml::de::Error> for MouldError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
