//! Cache module for Redis-backed session state
//!
//! This module provides the Redis connection with startup retry, per-command
//! deadlines and the handful of commands the session store needs.

pub mod redis_client;


pub use redis_client::RedisClient;

// Re-export commonly used types
pub use ig_shared::config::cache::CacheConfig;
