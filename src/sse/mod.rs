pub mod models;
pub use models::*;

mod sse_broadcaster;
pub use sse_broadcaster::*;

mod results_sse;

pub use results_sse::results_stream;
