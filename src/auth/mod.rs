pub mod captcha;
pub mod extract;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod tokens;
