use crate::constants::DEFAULT_POOL_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Connections the channel keeps open or opening.
    pub pool_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}
