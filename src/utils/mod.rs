//! # Utility Modules
//!
//! ## Available Utilities
//!
//! - **Constants** (`constant`) - Fixed application-wide settings
//! - **Token** (`token`) - Verification token generation
//! - **Validators** (`validator`) - Identity validation and domain allow-list

pub mod constant;
pub mod token;
pub mod validator;
