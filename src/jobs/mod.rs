// Jobs module - Scheduled background work

pub mod daily_notifications;
pub mod scheduler;
