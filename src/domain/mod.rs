// Domain layer: core models and ports shared by the config, core and
// transform layers.

pub mod model;
pub mod ports;
