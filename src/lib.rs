// Dynamic value model and wire codec
pub mod value;

// Hosts, services and their comments/downtimes
pub mod checkable;

// Action registry, dispatcher and handlers
pub mod action;

// Event model and producer
pub mod event;

// Named event queues and subscribers
pub mod subscription;

// HTTP APIs
pub mod api;

// Bearer tokens and API user permissions
pub mod auth;

// File configuration and runtime flags
pub mod config;

// Shutdown and restart requests
pub mod process;
