//! Response types for HTTP handlers.

mod dashboard;
mod errors;
mod health;
mod relay;
mod streaks;
mod success;
mod users;

pub use dashboard::*;
pub use errors::*;
pub use health::*;
pub use relay::*;
pub use streaks::*;
pub use success::*;
pub use users::*;
