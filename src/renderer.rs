//! Async renderer handle backed by a dedicated worker thread.
//!
//! Rendering backends are synchronous and not `Send`, so each [`Renderer`]
//! owns a thread that constructs the backend in place and services commands
//! sent from async tasks. Replies travel over oneshot channels; every async
//! call is bounded by the caller's render timeout. There is no cancellation:
//! once a command is in flight the worker finishes it, and a timed-out
//! caller simply stops waiting.
//!
//! Dropping the handle without [`Renderer::close`] ends the worker thread
//! when the command channel closes; the backend's own drop handling cleans
//! up whatever it launched.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::{CaptureParams, Error, Result};

/// A headless rendering engine: navigate to a document, wait for it to
/// settle, capture a bitmap.
pub trait RenderBackend {
    /// Load `url` and block until the document has settled.
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Capture the current document as an encoded bitmap.
    fn capture(&mut self, params: &CaptureParams) -> Result<Vec<u8>>;

    /// Shut the engine down.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Constructor invoked on the worker thread to build a backend instance.
pub type BackendFactory = Arc<dyn Fn() -> Result<Box<dyn RenderBackend>> + Send + Sync>;

enum Command {
    Navigate(String, oneshot::Sender<Result<()>>),
    Capture(CaptureParams, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// Async handle over a backend running on its own thread.
#[derive(Debug)]
pub struct Renderer {
    cmd_tx: Sender<Command>,
}

impl Renderer {
    /// Spawn a worker thread, construct the backend there, and wait for the
    /// construction to succeed.
    pub async fn launch(factory: BackendFactory) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            let mut backend = match factory() {
                Ok(backend) => backend,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Navigate(url, resp) => {
                        let _ = resp.send(backend.navigate(&url));
                    }
                    Command::Capture(params, resp) => {
                        let _ = resp.send(backend.capture(&params));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(backend.close());
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Init(format!("Renderer worker canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Navigate to `url`, failing with [`Error::RenderTimeout`] when the
    /// document does not settle within `timeout_ms`.
    pub async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Navigate(url.to_string(), tx));
        await_reply(rx, timeout_ms, "Navigate").await
    }

    /// Capture the settled document with the fixed output parameters.
    pub async fn capture(&self, params: &CaptureParams, timeout_ms: u64) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Capture(*params, tx));
        await_reply(rx, timeout_ms, "Capture").await
    }

    /// Shut the backend down and end the worker thread.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::RenderFailure(format!("Close canceled: {}", e)))?
    }
}

async fn await_reply<T>(
    rx: oneshot::Receiver<Result<T>>,
    timeout_ms: u64,
    what: &str,
) -> Result<T> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
        Err(_) => Err(Error::RenderTimeout(timeout_ms)),
        Ok(Err(e)) => Err(Error::RenderFailure(format!("{} canceled: {}", what, e))),
        Ok(Ok(result)) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBackend {
        navigate_delay: Duration,
        closed: bool,
    }

    impl RenderBackend for StubBackend {
        fn navigate(&mut self, _url: &str) -> Result<()> {
            std::thread::sleep(self.navigate_delay);
            Ok(())
        }

        fn capture(&mut self, params: &CaptureParams) -> Result<Vec<u8>> {
            Ok(format!("{}x{}", params.viewport.width, params.viewport.height).into_bytes())
        }

        fn close(mut self: Box<Self>) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn stub_factory(navigate_delay: Duration) -> BackendFactory {
        Arc::new(move || {
            Ok(Box::new(StubBackend {
                navigate_delay,
                closed: false,
            }) as Box<dyn RenderBackend>)
        })
    }

    #[tokio::test]
    async fn test_navigate_and_capture() {
        let renderer = Renderer::launch(stub_factory(Duration::ZERO)).await.unwrap();
        renderer.navigate("http://localhost/view/1-A", 1000).await.unwrap();

        let bytes = renderer
            .capture(&CaptureParams::default(), 1000)
            .await
            .unwrap();
        assert_eq!(bytes, b"1632x854");

        renderer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_navigate_timeout() {
        let renderer = Renderer::launch(stub_factory(Duration::from_millis(500)))
            .await
            .unwrap();

        let err = renderer
            .navigate("http://localhost/view/1-A", 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RenderTimeout(20)));
    }

    #[tokio::test]
    async fn test_failed_factory_surfaces_on_launch() {
        let factory: BackendFactory =
            Arc::new(|| Err(Error::Init("no engine available".to_string())));

        let err = Renderer::launch(factory).await.unwrap_err();
        assert!(matches!(err, Error::Init(_)));
    }
}
