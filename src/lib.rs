//! # Run Club Bot
//!
//! Telegram bot and HTTP backend for a running club.
//!
//! ## Features
//! - Member profiles completed through a short conversation
//! - Trainings with distances, capacity limits and GPX route maps
//! - Registration from the bot and the web API
//! - Post-training rating surveys and comments
//! - Scheduled posts, birthday greetings and weather forecasts
//! - Monobank card payment notices through webhooks
//! - Persistent storage with SQLite

/// Bot commands, conversations and callback handling
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Background jobs and external integrations
pub mod services;
/// Utility functions for datetime, validation, and formatting
pub mod utils;
/// HTTP routes: health checks, bank webhook and trainings API
pub mod web;
