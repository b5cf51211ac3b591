pub mod arch;
pub mod container;
pub mod decompiler;
pub mod error;
pub mod extract;
mod header;
pub mod replace;
pub mod report;

pub use arch::*;
pub use container::*;
pub use decompiler::*;
pub use error::*;
pub use extract::*;
pub use header::FatMagic;
pub use report::*;
