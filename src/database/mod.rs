pub mod question;
pub mod store;
