use crate::{constants::DEFAULT_INITIAL_WINDOW_SIZE, metadata::Metadata};

/// Per-call settings used when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    /// RPC method path, e.g. `/routeguide.RouteGuide/GetFeature`.
    pub method: String,

    /// Request header sent right after the `Call` frame.
    pub metadata: Option<Metadata>,

    /// Receive credit granted to the peer (and assumed for sending) when the
    /// stream opens. Defaults to [`DEFAULT_INITIAL_WINDOW_SIZE`].
    pub initial_window_size: Option<u32>,
}

impl CallOptions {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            metadata: None,
            initial_window_size: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_initial_window_size(mut self, size: u32) -> Self {
        self.initial_window_size = Some(size);
        self
    }

    pub fn window_size(&self) -> u32 {
        self.initial_window_size
            .unwrap_or(DEFAULT_INITIAL_WINDOW_SIZE)
    }
}
