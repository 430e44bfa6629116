use serde::{Deserialize, Serialize};

/// Weight initialization policy for (de)convolution layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightFiller {
    /// Variance-scaling initialization.
    Msra,
    /// Fixed bilinear interpolation kernel, used for upsampling layers.
    Bilinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolMethod {
    Max,
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EltwiseOp {
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionSpec {
    pub num_output: usize,
    pub kernel_size: usize,
    pub pad: usize,
    pub stride: usize,
    pub dilation: usize,
    pub group: usize,
    pub bias_term: bool,
    pub weight_filler: WeightFiller,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNormSpec {
    /// Fold the learnable scale and bias into the normalization layer
    /// instead of emitting a separate scale layer.
    pub scale_bias: bool,
    pub in_place: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    pub bias_term: bool,
    pub in_place: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReluSpec {
    pub in_place: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingSpec {
    pub method: PoolMethod,
    pub kernel_size: usize,
    pub stride: usize,
    pub pad: usize,
    pub global_pooling: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropoutSpec {
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EltwiseSpec {
    pub operation: EltwiseOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatSpec {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeconvolutionSpec {
    pub num_output: usize,
    pub kernel_size: usize,
    pub pad: usize,
    pub stride: usize,
    pub group: usize,
    pub bias_term: bool,
    pub weight_filler: WeightFiller,
    /// Zero learning rate and weight decay; the kernel stays at its
    /// initialized values.
    pub frozen: bool,
}

/// One operation of the emitted graph, tagged by type.
///
/// The parameters mirror what the consuming framework needs to materialize
/// the layer; no computation happens on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerSpec {
    Convolution(ConvolutionSpec),
    BatchNorm(BatchNormSpec),
    Scale(ScaleSpec),
    Relu(ReluSpec),
    Pooling(PoolingSpec),
    Dropout(DropoutSpec),
    Eltwise(EltwiseSpec),
    Concat(ConcatSpec),
    Deconvolution(DeconvolutionSpec),
}

impl LayerSpec {
    pub fn is_convolution(&self) -> bool {
        matches!(self, LayerSpec::Convolution(_))
    }

    pub fn is_eltwise(&self) -> bool {
        matches!(self, LayerSpec::Eltwise(_))
    }

    pub fn is_deconvolution(&self) -> bool {
        matches!(self, LayerSpec::Deconvolution(_))
    }
}
