pub mod oauth;
pub mod proc_loader;
pub mod proc_validator;
pub mod service;
pub mod settings;
