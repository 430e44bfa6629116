use burn::config::Config;

use super::conv_norm::NormStyle;
use super::inverted_residual::InvertedResidualConfig;
use super::mobilenetv2::MobileNetV2BodyConfig;
use crate::error::{GraphError, Result};
use crate::graph::{LayerSpec, NetSpec, PoolMethod, PoolingSpec};

/// A built detection-feature network. `taps` lists the five context
/// outputs, shallowest first, for the detector to consume as a feature
/// pyramid.
#[derive(Debug, Clone)]
pub struct MobileDetNetV2 {
    pub net: NetSpec,
    pub output: String,
    pub taps: Vec<String>,
}

/// MobileNetV2 backbone trimmed for detection: no classifier, a max-pool
/// pyramid past the backbone, and five `ctx_output` feature taps at a
/// common channel width.
#[derive(Config, Debug)]
pub struct MobileDetNetV2Config {
    #[config(default = "1000")]
    pub num_output: usize,

    #[config(default = "1.0")]
    pub wide_factor: f64,

    #[config(default = "512")]
    pub num_intermediate: usize,

    #[config(default = "6")]
    pub expansion: usize,

    #[config(default = "NormStyle::Fused")]
    pub norm_style: NormStyle,

    #[config(default = "Vec::new()")]
    pub freeze_layers: Vec<String>,
}

impl MobileDetNetV2Config {
    /// Build the detection-feature graph reading from the external input
    /// named `input`.
    pub fn build(&self, input: &str) -> Result<MobileDetNetV2> {
        let mut net = NetSpec::with_input(input);
        let body = MobileNetV2BodyConfig::new()
            .with_num_output(self.num_output)
            .with_wide_factor(self.wide_factor)
            .with_expansion(self.expansion)
            .with_output_stride(32)
            .with_enable_fc(false)
            .with_norm_style(self.norm_style)
            .with_freeze_layers(self.freeze_layers.clone())
            .build(&mut net, input)?;

        // Pooling pyramid past the stride-32 features.
        let mut from = body.output.clone();
        let mut pools = Vec::with_capacity(3);
        for idx in 6..9 {
            let name = format!("pool{idx}");
            net.add(
                &name,
                &[&from],
                LayerSpec::Pooling(PoolingSpec {
                    method: PoolMethod::Max,
                    kernel_size: 2,
                    stride: 2,
                    pad: 0,
                    global_pooling: false,
                }),
            )?;
            pools.push(name.clone());
            from = name;
        }

        let stride16 = body
            .stride16_tap
            .clone()
            .ok_or(GraphError::MissingTap("stride-16"))?;
        let stride16_channels = *body
            .channels
            .get(&stride16)
            .ok_or(GraphError::MissingTap("stride-16"))?;

        // Tap sources: the last stride-16 block, the backbone output, and
        // the three pyramid pools. Pooling preserves channel count.
        let sources: [(&str, usize); 5] = [
            (stride16.as_str(), stride16_channels),
            (body.output.as_str(), body.output_channels),
            (pools[0].as_str(), body.output_channels),
            (pools[1].as_str(), body.output_channels),
            (pools[2].as_str(), body.output_channels),
        ];

        let mut taps = Vec::with_capacity(sources.len());
        for (idx, (source, channels)) in sources.into_iter().enumerate() {
            let out = InvertedResidualConfig::new(channels, self.num_intermediate)
                .with_expansion(1)
                .with_norm_style(self.norm_style)
                .build(&mut net, source, &format!("ctx_output{}", idx + 1))?;
            taps.push(out);
        }
        let output = taps.last().cloned().unwrap_or(body.output);

        Ok(MobileDetNetV2 { net, output, taps })
    }
}
