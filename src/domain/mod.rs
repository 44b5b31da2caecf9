// Domain layer: layer specs, per-layer results and the ports the pipeline talks through.

pub mod model;
pub mod ports;
