mod conv_norm;
mod detection;
mod inverted_residual;
mod mobilenetv2;
mod segmentation;
mod utils;

pub use conv_norm::{ConvNormConfig, NormStyle};
pub use detection::{MobileDetNetV2, MobileDetNetV2Config};
pub use inverted_residual::InvertedResidualConfig;
pub use mobilenetv2::{
    BodyOutputs, ChannelRegistry, MobileNetV2, MobileNetV2BodyConfig, MobileNetV2Config,
};
pub use segmentation::{MobileSegNetV2, MobileSegNetV2Config};
pub use utils::{width_multiplier, width_multiplier8};
