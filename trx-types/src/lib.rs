pub mod config;
pub mod error;
pub mod interface;
pub mod io;
pub mod timestamp;

pub use config::*;
pub use error::*;
pub use interface::*;
pub use io::*;
pub use timestamp::*;
