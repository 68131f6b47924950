//! # Mirror Module
//!
//! Walk di un albero sorgente con le sue responsabilità separate:
//! - `tree_mirror`: Driver del walk e tabella delle decisioni per file
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod path_resolver;
pub mod tree_mirror;

pub use path_resolver::PathResolver;
pub use tree_mirror::{FileTask, TreeMirror};
