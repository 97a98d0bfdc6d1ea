pub mod branches;
pub mod feedback;
pub mod menu;
pub mod orders;
pub mod pricing;
pub mod promo;
pub mod service;
