use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{
    BatchNormSpec, ConvolutionSpec, LayerSpec, NetSpec, ReluSpec, ScaleSpec, WeightFiller,
};

/// How batch normalization is emitted after a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormStyle {
    /// A normalization layer followed by a separate affine scale layer
    /// with a learnable bias.
    Unfused,
    /// A single normalization layer with scale and bias folded in.
    Fused,
}

/// A Conv -> BatchNorm -> optional ReLU block, emitted as named layers.
#[derive(Config, Debug)]
pub struct ConvNormConfig {
    pub num_output: usize,

    #[config(default = "3")]
    pub kernel_size: usize,

    #[config(default = "0")]
    pub pad: usize,

    #[config(default = "1")]
    pub stride: usize,

    #[config(default = "1")]
    pub dilation: usize,

    #[config(default = "1")]
    pub group: usize,

    #[config(default = true)]
    pub relu: bool,

    #[config(default = "NormStyle::Unfused")]
    pub norm_style: NormStyle,

    #[config(default = true)]
    pub norm_in_place: bool,
}

impl ConvNormConfig {
    /// Emit the block into `net`, reading from `from` and naming the
    /// convolution `name`. Returns the name of the last layer inserted,
    /// which the caller wires as the next block's input.
    pub fn build(&self, net: &mut NetSpec, from: &str, name: &str) -> Result<String> {
        net.add(
            name,
            &[from],
            LayerSpec::Convolution(ConvolutionSpec {
                num_output: self.num_output,
                kernel_size: self.kernel_size,
                pad: self.pad * self.dilation,
                stride: self.stride,
                dilation: self.dilation,
                group: self.group,
                bias_term: false,
                weight_filler: WeightFiller::Msra,
            }),
        )?;
        let mut out = name.to_string();

        let bn_name = format!("{name}/bn");
        match self.norm_style {
            NormStyle::Unfused => {
                net.add(
                    &bn_name,
                    &[&out],
                    LayerSpec::BatchNorm(BatchNormSpec {
                        scale_bias: false,
                        in_place: self.norm_in_place,
                    }),
                )?;
                let scale_name = format!("{name}/scale");
                net.add(
                    &scale_name,
                    &[&bn_name],
                    LayerSpec::Scale(ScaleSpec {
                        bias_term: true,
                        in_place: true,
                    }),
                )?;
                out = scale_name;
            }
            NormStyle::Fused => {
                net.add(
                    &bn_name,
                    &[&out],
                    LayerSpec::BatchNorm(BatchNormSpec {
                        scale_bias: true,
                        in_place: self.norm_in_place,
                    }),
                )?;
                out = bn_name;
            }
        }

        if self.relu {
            let relu_name = format!("{name}/relu");
            net.add(&relu_name, &[&out], LayerSpec::Relu(ReluSpec { in_place: true }))?;
            out = relu_name;
        }

        Ok(out)
    }
}
