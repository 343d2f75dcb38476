pub mod follows;
pub mod health;
pub mod internal;
pub mod notifications;
pub mod profile;
pub mod verification;
