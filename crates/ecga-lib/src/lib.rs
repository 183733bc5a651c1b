pub mod format;
pub mod io;
pub mod progress;
pub mod record;
pub mod result;
pub mod state;
pub mod table;

pub use format::format_eta;
pub use progress::*;
pub use record::*;
pub use result::*;
pub use table::*;
