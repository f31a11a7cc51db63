pub mod favicon;
pub mod health;
