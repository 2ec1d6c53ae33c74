// cognitive-common: error taxonomy and logging setup shared by the
// observability crates

pub mod error;
pub mod logging;
