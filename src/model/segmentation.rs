use burn::config::Config;

use super::conv_norm::{ConvNormConfig, NormStyle};
use super::inverted_residual::InvertedResidualConfig;
use super::mobilenetv2::MobileNetV2BodyConfig;
use crate::error::{GraphError, Result};
use crate::graph::{
    ConcatSpec, ConvolutionSpec, DeconvolutionSpec, LayerSpec, NetSpec, WeightFiller,
};

/// A built segmentation network; `output` is the full-resolution class map.
#[derive(Debug, Clone)]
pub struct MobileSegNetV2 {
    pub net: NetSpec,
    pub output: String,
}

/// MobileNetV2 semantic segmentation: dilated backbone, bilinear
/// upsampling chain, a stride-4 skip connection, and two context
/// refinement blocks before the per-pixel classifier.
#[derive(Config, Debug)]
pub struct MobileSegNetV2Config {
    #[config(default = "20")]
    pub num_output: usize,

    #[config(default = "1.0")]
    pub wide_factor: f64,

    #[config(default = "256")]
    pub num_intermediate: usize,

    #[config(default = "6")]
    pub expansion: usize,

    #[config(default = "32")]
    pub output_stride: usize,

    /// ASPP context aggregation is declared but not implemented; selecting
    /// it fails with [`GraphError::AsppNotSupported`].
    #[config(default = false)]
    pub use_aspp: bool,

    #[config(default = "NormStyle::Fused")]
    pub norm_style: NormStyle,

    #[config(default = "Vec::new()")]
    pub freeze_layers: Vec<String>,
}

impl MobileSegNetV2Config {
    /// A grouped 4x4 stride-2 transposed convolution with a frozen
    /// bilinear kernel: doubles spatial resolution per channel.
    fn upsample2x(num_output: usize) -> LayerSpec {
        LayerSpec::Deconvolution(DeconvolutionSpec {
            num_output,
            kernel_size: 4,
            pad: 1,
            stride: 2,
            group: num_output,
            bias_term: false,
            weight_filler: WeightFiller::Bilinear,
            frozen: true,
        })
    }

    /// Build the segmentation graph reading from the external input named
    /// `input`.
    pub fn build(&self, input: &str) -> Result<MobileSegNetV2> {
        let mut net = NetSpec::with_input(input);
        let body = MobileNetV2BodyConfig::new()
            .with_num_output(self.num_output)
            .with_wide_factor(self.wide_factor)
            .with_expansion(self.expansion)
            .with_output_stride(self.output_stride)
            .with_enable_fc(false)
            .with_norm_style(self.norm_style)
            .with_freeze_layers(self.freeze_layers.clone())
            .build(&mut net, input)?;

        if self.use_aspp {
            return Err(GraphError::AsppNotSupported);
        }

        // Channel reduction before upsampling.
        let from = ConvNormConfig::new(self.num_intermediate)
            .with_kernel_size(1)
            .with_norm_style(self.norm_style)
            .build(&mut net, &body.output, &format!("{}/conv_down", body.output))?;

        // Upsample back to stride 4; output stride 32 needs one extra stage.
        let mut from = from;
        let factors: &[usize] = if self.output_stride > 16 {
            &[2, 4, 8]
        } else {
            &[2, 4]
        };
        for factor in factors {
            let name = format!("{from}/up{factor}");
            net.add(&name, &[&from], Self::upsample2x(self.num_intermediate))?;
            from = name;
        }

        // Skip connection from the stride-4 point, reduced to a quarter of
        // the intermediate width.
        let stride4 = body
            .stride4_tap
            .clone()
            .ok_or(GraphError::MissingTap("stride-4"))?;
        let shortcut = ConvNormConfig::new(self.num_intermediate / 4)
            .with_kernel_size(1)
            .with_norm_style(self.norm_style)
            .build(&mut net, &stride4, &format!("{stride4}/conv_shortcut"))?;

        net.add(
            "cat_block",
            &[&from, &shortcut],
            LayerSpec::Concat(ConcatSpec {}),
        )?;
        let mut from = "cat_block".to_string();
        let concat_channels = self.num_intermediate + self.num_intermediate / 4;

        // Channel-preserving context blocks; their identity shortcut fires
        // by construction.
        for name in ["ctx_block1", "ctx_block2"] {
            from = InvertedResidualConfig::new(concat_channels, concat_channels)
                .with_expansion(1)
                .with_norm_style(self.norm_style)
                .build(&mut net, &from, name)?;
        }

        net.add(
            "ctx_final",
            &[&from],
            LayerSpec::Convolution(ConvolutionSpec {
                num_output: self.num_output,
                kernel_size: 1,
                pad: 0,
                stride: 1,
                dilation: 1,
                group: 1,
                bias_term: true,
                weight_filler: WeightFiller::Msra,
            }),
        )?;

        // Two more upsamplings recover the input resolution.
        let penultimate = if self.output_stride > 16 {
            "ctx_final/up16"
        } else {
            "ctx_final/up8"
        };
        net.add(penultimate, &["ctx_final"], Self::upsample2x(self.num_output))?;
        net.add("ctx_output", &[penultimate], Self::upsample2x(self.num_output))?;

        Ok(MobileSegNetV2 {
            net,
            output: "ctx_output".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsample_names(model: &MobileSegNetV2) -> Vec<String> {
        model
            .net
            .iter()
            .filter(|l| l.spec.is_deconvolution())
            .map(|l| l.name.clone())
            .collect()
    }

    #[test]
    fn output_stride_32_upsamples_three_times_before_classifier() {
        let model = MobileSegNetV2Config::new().build("data").unwrap();
        let ups = upsample_names(&model);
        assert_eq!(ups.len(), 5);
        assert!(ups[0].ends_with("/up2"));
        assert!(ups[1].ends_with("/up4"));
        assert!(ups[2].ends_with("/up8"));
        assert_eq!(ups[3], "ctx_final/up16");
        assert_eq!(ups[4], "ctx_output");
        assert_eq!(model.output, "ctx_output");
    }

    #[test]
    fn output_stride_16_upsamples_twice_before_classifier() {
        let model = MobileSegNetV2Config::new()
            .with_output_stride(16)
            .build("data")
            .unwrap();
        let ups = upsample_names(&model);
        assert_eq!(ups.len(), 4);
        assert!(ups[0].ends_with("/up2"));
        assert!(ups[1].ends_with("/up4"));
        assert_eq!(ups[2], "ctx_final/up8");
        assert_eq!(ups[3], "ctx_output");
    }

    #[test]
    fn aspp_is_rejected() {
        let err = MobileSegNetV2Config::new()
            .with_use_aspp(true)
            .build("data")
            .unwrap_err();
        assert_eq!(err, GraphError::AsppNotSupported);
    }

    #[test]
    fn upsampling_layers_are_frozen_bilinear_and_grouped() {
        let model = MobileSegNetV2Config::new().build("data").unwrap();
        for layer in model.net.iter().filter(|l| l.spec.is_deconvolution()) {
            match &layer.spec {
                LayerSpec::Deconvolution(deconv) => {
                    assert_eq!(deconv.weight_filler, WeightFiller::Bilinear);
                    assert_eq!(deconv.group, deconv.num_output);
                    assert_eq!(deconv.kernel_size, 4);
                    assert_eq!(deconv.stride, 2);
                    assert!(deconv.frozen);
                    assert!(!deconv.bias_term);
                }
                other => panic!("unexpected spec: {other:?}"),
            }
        }
    }

    #[test]
    fn shortcut_concat_and_context_blocks() {
        let model = MobileSegNetV2Config::new().build("data").unwrap();
        let cat = model.net.get("cat_block").unwrap();
        assert_eq!(cat.inputs.len(), 2);
        assert!(cat.inputs[0].ends_with("/up8"));
        assert!(cat.inputs[1].contains("/conv_shortcut"));

        // 256 + 64 concatenated channels flow through both context blocks
        match &model.net.get("ctx_block1/linear").unwrap().spec {
            LayerSpec::Convolution(conv) => assert_eq!(conv.num_output, 320),
            other => panic!("unexpected spec: {other:?}"),
        }
        // channel-preserving at stride 1, so the shortcut must fire
        assert!(model.net.contains("ctx_block1/eltwise"));
        assert!(model.net.contains("ctx_block2/eltwise"));

        // quarter-width shortcut projection
        let shortcut_name = model
            .net
            .iter()
            .find(|l| l.name.ends_with("/conv_shortcut"))
            .map(|l| l.name.clone())
            .unwrap();
        match &model.net.get(&shortcut_name).unwrap().spec {
            LayerSpec::Convolution(conv) => assert_eq!(conv.num_output, 64),
            other => panic!("unexpected spec: {other:?}"),
        }
    }
}
