mod config;
mod dataset;
mod driver;
mod error;
mod layers;
mod model;
mod net;
mod split;
mod trainer;
mod utils;
mod vol;

pub use config::*;
pub use dataset::*;
pub use driver::*;
pub use error::*;
pub use layers::*;
pub use model::*;
pub use net::*;
pub use split::*;
pub use trainer::*;
pub use utils::*;
pub use vol::*;

pub type Float = f32;
