use anyhow::Error;

#[macro_use]
mod macros;

pub mod asr;
pub mod io;
pub mod mutations;
pub mod placement;
pub mod tree;

type Result<T> = std::result::Result<T, Error>;
