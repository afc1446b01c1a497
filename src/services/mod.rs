pub mod attachments;
pub mod converter;
pub mod media_store;
pub mod seed;
pub mod uploads;
