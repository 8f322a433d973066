pub mod keyed_lock;
pub mod telegram_auth;
pub mod time;
