pub mod rest;
pub mod session;
