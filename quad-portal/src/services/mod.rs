pub mod follows;
pub mod notifications;
pub mod otp;
pub mod profile;
