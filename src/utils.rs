mod lock;

pub use lock::lock;
