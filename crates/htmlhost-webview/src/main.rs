//! Minimal viewer: hosts a WebView2 control in a tao window.
//!
//! ```text
//! htmlhost-viewer [--config host.json] [URL | FILE.html]
//! ```

#[cfg(target_os = "windows")]
fn main() {
    if let Err(e) = viewer::run() {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("htmlhost-viewer requires Windows");
    std::process::exit(1);
}

/// Resolve the path part of a synthetic URL under `root`. Only plain
/// relative paths resolve; rooted, drive-prefixed and parent-escaping
/// paths give `None`.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn page_path(root: &std::path::Path, url: &str) -> Option<std::path::PathBuf> {
    use std::path::{Component, Path};

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let mut resolved = root.to_path_buf();
    let mut any = false;
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                let part_str = part.to_str()?;
                if part_str.contains([':', '\\']) {
                    return None;
                }
                resolved.push(part);
                any = true;
            }
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => return None,
        }
    }
    any.then_some(resolved)
}

#[cfg(target_os = "windows")]
mod viewer {
    use std::error::Error;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    use htmlhost_core::{BrowserHost, HostCallback, HostConfig, HostError, Size};
    use htmlhost_webview::{window_handle_of, WebViewProvider};
    use tao::dpi::LogicalSize;
    use tao::event::{Event, WindowEvent};
    use tao::event_loop::{ControlFlow, EventLoop};
    use tao::window::WindowBuilder;
    use tracing::{debug, info, warn, Level};
    use tracing_subscriber::FmtSubscriber;

    struct Args {
        config: Option<PathBuf>,
        target: Option<String>,
    }

    impl Args {
        fn parse() -> Self {
            let mut args = std::env::args().skip(1);
            let mut config = None;
            let mut target = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--config" => config = args.next().map(PathBuf::from),
                    _ => target = Some(arg),
                }
            }
            Self { config, target }
        }
    }

    /// Allows everything and serves synthetic paths from `root`.
    struct ViewerCallback {
        root: PathBuf,
    }

    impl HostCallback for ViewerCallback {
        fn on_before_navigate(&self, url: &str, new_window: bool) -> bool {
            info!(url, new_window, "Navigating");
            !new_window
        }

        fn on_document_complete(&self, url: &str) {
            info!(url, "Document complete");
        }

        fn get_data_for_url(&self, url: &str) -> Option<Vec<u8>> {
            let Some(file) = crate::page_path(&self.root, url) else {
                warn!(url, "Refusing page path outside the viewer root");
                return None;
            };
            debug!(path = %file.display(), "Reading page data");
            std::fs::read(file).ok()
        }

        fn on_lbutton_down(&self) {
            debug!("Left button down");
        }

        fn on_files_dropped(&self, paths: Vec<PathBuf>) {
            for path in paths {
                info!(path = %path.display(), "File dropped");
            }
        }
    }

    pub fn run() -> Result<(), Box<dyn Error>> {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;

        let args = Args::parse();
        let config = match &args.config {
            Some(path) => HostConfig::load(path)?,
            None => HostConfig::default(),
        };

        let local = args
            .target
            .as_deref()
            .map(Path::new)
            .filter(|p| p.is_file())
            .map(Path::to_path_buf);
        let root = local
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let event_loop = EventLoop::new();
        let window = WindowBuilder::new()
            .with_title("HtmlHost Viewer")
            .with_inner_size(LogicalSize::new(1024.0, 768.0))
            .build(&event_loop)?;

        let parent = window_handle_of(&window).ok_or(HostError::InvalidParent)?;
        let callback: Rc<dyn HostCallback> = Rc::new(ViewerCallback { root });
        let host = BrowserHost::create_with_config(&WebViewProvider::new(), parent, callback, config)?;

        let inner = window.inner_size();
        host.on_size(Size::new(inner.width, inner.height));

        match (&local, &args.target) {
            (Some(file), _) => {
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("index.html");
                host.navigate_to_data_url(name);
            }
            (None, Some(url)) => host.navigate_to_url(url),
            (None, None) => host.set_html(b"<h1>HtmlHost</h1><p>Pass a URL or an HTML file.</p>"),
        }

        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Wait;
            let _window = &window;

            match event {
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => *control_flow = ControlFlow::Exit,
                Event::WindowEvent {
                    event: WindowEvent::Resized(size),
                    ..
                } => host.on_size(Size::new(size.width, size.height)),
                _ => {}
            }
        });
    }
}
