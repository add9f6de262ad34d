pub mod app;
pub mod auth;
pub mod config;
pub mod courses;
pub mod error;
pub mod mailer;
pub mod media;
pub mod playlist;
pub mod state;
pub mod stats;
pub mod upload;

#[cfg(test)]
mod test_support;
