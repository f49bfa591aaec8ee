pub mod risk;
pub mod symbology;

pub use risk::*;
pub use symbology::*;
