pub mod admin;
pub mod redirect;
pub mod urls;
