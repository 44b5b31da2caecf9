// Adapters layer: concrete implementations of the domain ports (store clients, progress reporting).

pub mod reporter;
pub mod sink;
