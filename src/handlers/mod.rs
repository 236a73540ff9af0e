pub mod current_location;
pub mod extract;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use current_location::*;
pub use extract::*;
pub use health::*;
pub use metrics::*;
pub use middleware::*;
