pub mod blocks;
pub mod dashboard;
pub mod openid_login;
pub mod openid_redirect;
pub mod register;
pub mod rooms;
pub mod session;
