//! The interface through which the embedding host observes and steers
//! a [`BrowserHost`](crate::BrowserHost).

use std::path::PathBuf;

/// Implemented by the embedding application.
///
/// All methods are called on the UI thread, synchronously from inside
/// engine event delivery. Implementations may call back into the
/// `BrowserHost` that invoked them.
pub trait HostCallback {
    /// Called before the control shows `url`. Returning `false` stops the
    /// navigation before anything is fetched.
    ///
    /// `new_window` is set when the page asked for a new top-level window.
    fn on_before_navigate(&self, url: &str, new_window: bool) -> bool;

    /// Called once the document for `url` has been completely loaded.
    fn on_document_complete(&self, url: &str);

    /// Supplies content for a synthetic URL.
    ///
    /// The callee allocates the buffer and hands ownership to the caller,
    /// which releases it once the engine has consumed it. `None` means no
    /// data is available and the navigation fails.
    fn get_data_for_url(&self, url: &str) -> Option<Vec<u8>>;

    /// Called when the left mouse button is pressed inside the control.
    /// The control steals keyboard focus on click; hosts use this to
    /// restore it.
    fn on_lbutton_down(&self);

    /// Called when files are dropped onto the control.
    fn on_files_dropped(&self, paths: Vec<PathBuf>) {
        let _ = paths;
    }
}
