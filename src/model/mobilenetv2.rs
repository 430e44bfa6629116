use std::collections::HashMap;

use burn::config::Config;

use super::conv_norm::{ConvNormConfig, NormStyle};
use super::inverted_residual::InvertedResidualConfig;
use super::utils::width_multiplier8;
use crate::error::{GraphError, Result};
use crate::graph::{
    ConvolutionSpec, DropoutSpec, LayerSpec, NetSpec, PoolMethod, PoolingSpec, WeightFiller,
};

/// Per-stage base channel counts from
/// [`MobileNetV2: Inverted Residuals and Linear Bottlenecks`](https://arxiv.org/abs/1801.04381).
const STAGE_CHANNELS: [usize; 9] = [32, 16, 24, 32, 64, 96, 160, 320, 1280];
/// Block repeats per stage.
const STAGE_REPEATS: [usize; 9] = [1, 1, 2, 3, 4, 3, 3, 1, 1];

/// Canonical paper stride schedules.
const STRIDES_OS32: [usize; 9] = [2, 1, 2, 2, 2, 1, 2, 1, 1];
const STRIDES_OS16: [usize; 9] = [2, 1, 2, 2, 2, 1, 1, 1, 1];
/// Denser alternative schedule (higher MMAC count), kept for parity with
/// the shicai/MobileNet-Caffe layout.
const STRIDES_OS32_DENSE: [usize; 9] = [2, 1, 2, 2, 1, 2, 2, 1, 1];
const STRIDES_OS16_DENSE: [usize; 9] = [2, 1, 2, 2, 1, 2, 1, 1, 1];

/// Output channel count keyed by inverted-residual block output name.
pub type ChannelRegistry = HashMap<String, usize>;

/// What the backbone hands back to a head assembler: the output layer,
/// its width, the block channel registry, and the two tap points heads
/// wire shortcuts from. Taps are explicit here so heads never have to
/// reconstruct backbone-internal names.
#[derive(Debug, Clone)]
pub struct BodyOutputs {
    pub output: String,
    pub output_channels: usize,
    pub channels: ChannelRegistry,
    /// First block output where the cumulative spatial stride reaches 4.
    pub stride4_tap: Option<String>,
    /// Last block output at cumulative spatial stride 16.
    pub stride16_tap: Option<String>,
}

/// MobileNetV2 feature extractor: stem convolution, seven inverted
/// residual stages, and a 1x1 head convolution, with an optional global
/// pool + classifier on top.
#[derive(Config, Debug)]
pub struct MobileNetV2BodyConfig {
    #[config(default = "1000")]
    pub num_output: usize,

    #[config(default = "1.0")]
    pub wide_factor: f64,

    #[config(default = "6")]
    pub expansion: usize,

    #[config(default = "32")]
    pub output_stride: usize,

    /// Use the paper's stride schedule; `false` selects the denser
    /// alternative tables.
    #[config(default = true)]
    pub default_strides: bool,

    #[config(default = true)]
    pub enable_fc: bool,

    #[config(default = false)]
    pub dropout: bool,

    #[config(default = "NormStyle::Unfused")]
    pub norm_style: NormStyle,

    /// Accepted for interface parity with training configs; the graph
    /// builder itself does not act on it.
    #[config(default = "Vec::new()")]
    pub freeze_layers: Vec<String>,
}

impl MobileNetV2BodyConfig {
    fn validate(&self) -> Result<()> {
        if self.output_stride != 16 && self.output_stride != 32 {
            return Err(GraphError::UnsupportedOutputStride(self.output_stride));
        }
        if !(self.wide_factor > 0.0) {
            return Err(GraphError::UnsupportedConfig(format!(
                "wide_factor must be positive, got {}",
                self.wide_factor
            )));
        }
        if self.expansion == 0 {
            return Err(GraphError::UnsupportedConfig(
                "expansion factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn strides(&self) -> [usize; 9] {
        match (self.output_stride, self.default_strides) {
            (32, true) => STRIDES_OS32,
            (_, true) => STRIDES_OS16,
            (32, false) => STRIDES_OS32_DENSE,
            (_, false) => STRIDES_OS16_DENSE,
        }
    }

    /// Scaled and quantized per-stage channel widths. The stem never grows
    /// above its base width and the head never shrinks below its base width.
    pub fn channels(&self) -> [usize; 9] {
        let mut channels = [0usize; 9];
        for (c, base) in channels.iter_mut().zip(STAGE_CHANNELS) {
            *c = width_multiplier8(base as f64 * self.wide_factor);
        }
        channels[0] = channels[0].min(STAGE_CHANNELS[0]);
        channels[8] = channels[8].max(STAGE_CHANNELS[8]);
        channels
    }

    /// Emit the backbone into `net`, reading from `from`.
    pub fn build(&self, net: &mut NetSpec, from: &str) -> Result<BodyOutputs> {
        self.validate()?;

        let strides = self.strides();
        let channels = self.channels();
        let num_stages = channels.len();

        let mut out = ConvNormConfig::new(channels[0])
            .with_kernel_size(3)
            .with_pad(1)
            .with_stride(strides[0])
            .with_norm_style(self.norm_style)
            .build(net, from, "conv1")?;
        let mut num_input = channels[0];

        let mut cumulative_stride = strides[0];
        let mut stride4_tap = None;
        let mut stride16_tap = None;
        let mut registry = ChannelRegistry::new();

        for stg_idx in 1..num_stages - 1 {
            for n in 0..STAGE_REPEATS[stg_idx] {
                let expansion = if stg_idx < 2 { 1 } else { self.expansion };
                let stride = if n == 0 { strides[stg_idx] } else { 1 };
                // Past stage 5 at output stride 16, downsampling is traded
                // for dilation to keep feature resolution.
                let dilation = if self.output_stride == 16 && stg_idx > 5 {
                    2
                } else {
                    1
                };
                let name = format!("conv{}_{}", stg_idx + 1, n + 1);
                out = InvertedResidualConfig::new(num_input, channels[stg_idx])
                    .with_stride(stride)
                    .with_dilation(dilation)
                    .with_expansion(expansion)
                    .with_norm_style(self.norm_style)
                    .build(net, &out, &name)?;
                num_input = channels[stg_idx];
                registry.insert(out.clone(), channels[stg_idx]);

                cumulative_stride *= stride;
                if cumulative_stride == 4 && stride4_tap.is_none() {
                    stride4_tap = Some(out.clone());
                }
                if cumulative_stride == 16 {
                    stride16_tap = Some(out.clone());
                }
            }
        }

        out = ConvNormConfig::new(channels[num_stages - 1])
            .with_kernel_size(1)
            .with_stride(strides[num_stages - 1])
            .with_norm_style(self.norm_style)
            .build(net, &out, &format!("conv{}_1", num_stages))?;
        let mut output_channels = channels[num_stages - 1];

        if self.enable_fc {
            let pool_name = format!("pool{num_stages}");
            net.add(
                &pool_name,
                &[&out],
                LayerSpec::Pooling(PoolingSpec {
                    method: PoolMethod::Average,
                    kernel_size: 0,
                    stride: 1,
                    pad: 0,
                    global_pooling: true,
                }),
            )?;
            out = pool_name;

            if self.dropout {
                let drop_name = format!("drop{num_stages}");
                net.add(&drop_name, &[&out], LayerSpec::Dropout(DropoutSpec { ratio: 0.5 }))?;
                out = drop_name;
            }

            let fc_name = format!("fc{}", num_stages + 1);
            net.add(
                &fc_name,
                &[&out],
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
            out = fc_name;
            output_channels = self.num_output;
        }

        Ok(BodyOutputs {
            output: out,
            output_channels,
            channels: registry,
            stride4_tap,
            stride16_tap,
        })
    }
}

/// A built classification network: the layer graph plus its output layer.
#[derive(Debug, Clone)]
pub struct MobileNetV2 {
    pub net: NetSpec,
    pub output: String,
}

/// MobileNetV2 image classifier at output stride 32.
#[derive(Config, Debug)]
pub struct MobileNetV2Config {
    #[config(default = "1000")]
    pub num_output: usize,

    #[config(default = "1.0")]
    pub wide_factor: f64,

    #[config(default = "6")]
    pub expansion: usize,

    #[config(default = false)]
    pub dropout: bool,

    #[config(default = "NormStyle::Fused")]
    pub norm_style: NormStyle,

    #[config(default = "Vec::new()")]
    pub freeze_layers: Vec<String>,
}

impl MobileNetV2Config {
    /// Build the classification graph reading from the external input
    /// named `input`.
    pub fn build(&self, input: &str) -> Result<MobileNetV2> {
        let mut net = NetSpec::with_input(input);
        let body = MobileNetV2BodyConfig::new()
            .with_num_output(self.num_output)
            .with_wide_factor(self.wide_factor)
            .with_expansion(self.expansion)
            .with_output_stride(32)
            .with_enable_fc(true)
            .with_dropout(self.dropout)
            .with_norm_style(self.norm_style)
            .with_freeze_layers(self.freeze_layers.clone())
            .build(&mut net, input)?;

        Ok(MobileNetV2 {
            net,
            output: body.output,
        })
    }
}
