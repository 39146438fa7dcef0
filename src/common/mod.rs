pub mod logging;
pub mod output;
pub mod progress;
pub mod types;
pub mod utils;

pub use logging::*;
pub use output::write_entries_jsonl;
pub use progress::create_count_progress_bar;
pub use types::*;
pub use utils::*;
