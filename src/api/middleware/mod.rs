pub mod auth;
pub mod rate_limit;

pub use auth::{AuthenticatedUser, OptionalUser};
pub use rate_limit::{ChatKeyExtractor, ChatRateLimit, chat_rate_limit};
