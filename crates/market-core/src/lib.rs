pub mod analysis;
pub mod artifact;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use analysis::*;
pub use config::*;
pub use error::*;
pub use traits::*;
pub use types::*;
