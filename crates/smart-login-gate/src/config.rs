use serde::{Deserialize, Serialize};

/// Configuration for the aggregation controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateConfig {
    /// Capacity of the channel sources report into (default: 256)
    #[serde(default = "default_signal_buffer")]
    pub signal_buffer: usize,
    /// Capacity of the presentation update broadcast (default: 1024)
    #[serde(default = "default_update_buffer")]
    pub update_buffer: usize,
}

fn default_signal_buffer() -> usize {
    256
}

fn default_update_buffer() -> usize {
    1024
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            signal_buffer: default_signal_buffer(),
            update_buffer: default_update_buffer(),
        }
    }
}
