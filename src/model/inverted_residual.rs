use burn::config::Config;

use super::conv_norm::{ConvNormConfig, NormStyle};
use crate::error::Result;
use crate::graph::{EltwiseOp, EltwiseSpec, LayerSpec, NetSpec};

/// [Inverted residual block](https://paperswithcode.com/method/inverted-residual-block)
/// with a linear bottleneck: 1x1 expand -> 3x3 depthwise -> 1x1 project
/// (no activation), plus an identity shortcut when shapes match.
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    pub num_input: usize,
    pub num_output: usize,

    #[config(default = "1")]
    pub stride: usize,

    #[config(default = "1")]
    pub dilation: usize,

    #[config(default = "1")]
    pub group: usize,

    #[config(default = "6")]
    pub expansion: usize,

    #[config(default = "NormStyle::Unfused")]
    pub norm_style: NormStyle,
}

impl InvertedResidualConfig {
    /// Emit the block into `net`. Sub-layers are named `{name}/expand`,
    /// `{name}/dwise`, `{name}/linear` and, when the shortcut applies,
    /// `{name}/eltwise`. Returns the block's output layer name.
    ///
    /// An expansion of 1 still emits the expand step at identity width;
    /// detection and segmentation context blocks rely on that.
    pub fn build(&self, net: &mut NetSpec, from: &str, name: &str) -> Result<String> {
        let input_layer = from.to_string();
        let expanded = self.num_input * self.expansion;

        let out = ConvNormConfig::new(expanded)
            .with_kernel_size(1)
            .with_group(self.group)
            .with_norm_style(self.norm_style)
            .build(net, from, &format!("{name}/expand"))?;

        let out = ConvNormConfig::new(expanded)
            .with_kernel_size(3)
            .with_pad(1)
            .with_stride(self.stride)
            .with_dilation(self.dilation)
            .with_group(expanded)
            .with_norm_style(self.norm_style)
            .build(net, &out, &format!("{name}/dwise"))?;

        let out = ConvNormConfig::new(self.num_output)
            .with_kernel_size(1)
            .with_group(self.group)
            .with_relu(false)
            .with_norm_style(self.norm_style)
            .build(net, &out, &format!("{name}/linear"))?;

        if self.stride == 1 && self.num_input == self.num_output {
            let eltwise_name = format!("{name}/eltwise");
            net.add(
                &eltwise_name,
                &[&out, &input_layer],
                LayerSpec::Eltwise(EltwiseSpec {
                    operation: EltwiseOp::Sum,
                }),
            )?;
            return Ok(eltwise_name);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_when_stride_one_and_channels_match() {
        let mut net = NetSpec::with_input("x");
        let out = InvertedResidualConfig::new(32, 32)
            .build(&mut net, "x", "block")
            .unwrap();
        assert_eq!(out, "block/eltwise");
        let eltwise = net.get("block/eltwise").unwrap();
        assert_eq!(eltwise.inputs, vec!["block/linear/scale", "x"]);
    }

    #[test]
    fn no_shortcut_on_stride_two() {
        let mut net = NetSpec::with_input("x");
        let out = InvertedResidualConfig::new(32, 32)
            .with_stride(2)
            .build(&mut net, "x", "block")
            .unwrap();
        assert_eq!(out, "block/linear/scale");
        assert!(!net.contains("block/eltwise"));
    }

    #[test]
    fn no_shortcut_on_channel_change() {
        let mut net = NetSpec::with_input("x");
        let out = InvertedResidualConfig::new(32, 64)
            .build(&mut net, "x", "block")
            .unwrap();
        assert_eq!(out, "block/linear/scale");
        assert!(!net.contains("block/eltwise"));
    }

    #[test]
    fn expansion_widens_the_depthwise_stage() {
        let mut net = NetSpec::with_input("x");
        InvertedResidualConfig::new(16, 24)
            .with_stride(2)
            .build(&mut net, "x", "block")
            .unwrap();
        match &net.get("block/dwise").unwrap().spec {
            LayerSpec::Convolution(conv) => {
                assert_eq!(conv.num_output, 96);
                // true depthwise: one group per channel
                assert_eq!(conv.group, 96);
                assert_eq!(conv.stride, 2);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn expansion_one_keeps_identity_width() {
        let mut net = NetSpec::with_input("x");
        InvertedResidualConfig::new(64, 128)
            .with_expansion(1)
            .build(&mut net, "x", "block")
            .unwrap();
        match &net.get("block/expand").unwrap().spec {
            LayerSpec::Convolution(conv) => assert_eq!(conv.num_output, 64),
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn linear_bottleneck_has_no_activation() {
        let mut net = NetSpec::with_input("x");
        InvertedResidualConfig::new(32, 64)
            .build(&mut net, "x", "block")
            .unwrap();
        assert!(net.contains("block/expand/relu"));
        assert!(net.contains("block/dwise/relu"));
        assert!(!net.contains("block/linear/relu"));
    }
}
