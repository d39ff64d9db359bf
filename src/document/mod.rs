pub mod extract;

pub use extract::{extract_all, Blocks, CodeFragment, ExtractedBlock};
