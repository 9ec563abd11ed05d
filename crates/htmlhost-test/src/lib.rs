//! # HtmlHost Test
//!
//! Harness for exercising `htmlhost-core` without a real browser control.
//!
//! ## Pieces
//!
//! 1. **ScriptedEngine**: implements the whole engine interface set in
//!    memory and plays queued loads on [`ScriptedEngine::pump`]
//! 2. **RecordingCallback**: records every host callback in order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use htmlhost_test::{test_parent, RecordingCallback, ScriptedProvider};
//!
//! let provider = ScriptedProvider::new();
//! let callback = RecordingCallback::new();
//! let host = BrowserHost::create(&provider, test_parent(), callback.clone())?;
//! host.navigate_to_url("https://example.com/");
//! provider.engine().pump();
//! assert_eq!(callback.completed_urls(), vec!["https://example.com/"]);
//! ```

use std::rc::Rc;

use htmlhost_core::{BrowserHost, HostCallback, HostResult, WindowHandle};
use tracing_subscriber::EnvFilter;

pub mod callback;
pub mod engine;

pub use callback::{HostEvent, RecordingCallback};
pub use engine::{EngineCall, ScriptedEngine, ScriptedProvider, STATUS_NO_DATA};

/// Install a test-friendly subscriber. Honors `RUST_LOG`; safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A parent window handle for hosts under test.
pub fn test_parent() -> WindowHandle {
    WindowHandle::new(0x10).expect("non-null window handle")
}

/// Everything a typical test needs. [`Fixture::new`] has already played the
/// placeholder load.
pub struct Fixture {
    pub provider: ScriptedProvider,
    pub engine: Rc<ScriptedEngine>,
    pub callback: Rc<RecordingCallback>,
    pub host: BrowserHost,
}

impl Fixture {
    pub fn new() -> HostResult<Self> {
        let fx = Self::before_placeholder()?;
        fx.engine.pump();
        Ok(fx)
    }

    /// A freshly created host whose placeholder load is still queued.
    pub fn before_placeholder() -> HostResult<Self> {
        init_tracing();
        let provider = ScriptedProvider::new();
        let engine = provider.engine();
        let callback = RecordingCallback::new();
        let host = BrowserHost::create(
            &provider,
            test_parent(),
            Rc::clone(&callback) as Rc<dyn HostCallback>,
        )?;
        Ok(Self {
            provider,
            engine,
            callback,
            host,
        })
    }
}
