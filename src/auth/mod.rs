pub mod handlers;
pub mod oauth;
pub mod oauth_state;
pub mod password;
pub mod session;
