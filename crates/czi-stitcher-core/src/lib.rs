pub mod consts;
pub mod error;
pub mod external;
pub mod io;
pub mod ome;
pub mod pipeline;
pub mod process;
pub mod scratch;
