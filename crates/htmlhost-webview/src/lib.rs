//! # HtmlHost WebView
//!
//! WebView2 backend for `htmlhost-core`, built on wry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use htmlhost_core::BrowserHost;
//! use htmlhost_webview::{window_handle_of, WebViewProvider};
//!
//! let parent = window_handle_of(&window).ok_or(HostError::InvalidParent)?;
//! let host = BrowserHost::create(&WebViewProvider::new(), parent, callback)?;
//! ```
//!
//! The crate is empty on platforms other than Windows.

#![cfg(target_os = "windows")]

mod capture;
mod engine;
mod window;

pub use engine::{WebViewEngine, WebViewProvider, STATUS_NOT_FOUND};
pub use window::{window_handle_of, ParentWindow};
