//! A set of helpers for testing

mod alert;
mod job;
mod mailer;

pub use alert::AlertBuilder;
pub use job::JobBuilder;
pub use mailer::RecordingMailer;
