pub mod errors;
pub mod model;
pub mod space;
pub mod trial;

pub use errors::*;
pub use model::*;
pub use space::*;
pub use trial::*;
