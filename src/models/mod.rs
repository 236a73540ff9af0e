// Re-export all model types
pub use self::enums::*;
pub use self::errors::*;
pub use self::location::*;
pub use self::member::*;
pub use self::validation::*;

mod enums;
mod errors;
mod location;
mod member;
mod validation;
