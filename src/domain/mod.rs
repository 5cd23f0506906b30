// Domain layer: the node tree, file entries and the block store port.

pub mod model;
pub mod ports;
