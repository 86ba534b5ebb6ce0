pub mod dashboard;
pub mod delivery;
pub mod driver;
pub mod history;
pub mod incident;
pub mod notification;
pub mod pricing;
pub mod typing;
