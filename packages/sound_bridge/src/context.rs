//! The per-connection handle through which every operation is issued.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::native::{Backend, NativeContext};
use crate::session::Session;
use crate::{Error, ErrorCode, EventLoop, LoopGuard, LoopHandle, OperationFuture, Result};

mod cards;
mod clients;
mod modules;
mod server;
mod sinks;
mod sources;
mod streams;

const DEFAULT_NAME: &str = "sound-bridge";

/// Connection state of a [`Context`].
///
/// A connection moves forward through the intermediate states until it either becomes `Ready`
/// or ends in `Failed` or `Terminated`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirrors the connection state machine of the native library"
)]
pub enum ContextState {
    /// The connection has not been started.
    Unconnected,

    /// The connection is being established.
    Connecting,

    /// The client is authorizing itself to the server.
    Authorizing,

    /// The client is passing its application name to the server.
    SettingName,

    /// The connection is established and operations can be issued.
    Ready,

    /// The connection failed or was lost.
    Failed,

    /// The connection was closed cleanly.
    Terminated,
}

impl ContextState {
    /// Whether the state is final. A context in a final state must reconnect before use.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(self, Self::Failed | Self::Terminated)
    }

    /// Whether a connection attempt is in progress.
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::Connecting | Self::Authorizing | Self::SettingName)
    }
}

/// Options for establishing a connection.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ContextFlags {
    no_autospawn: bool,
    no_fail: bool,
}

impl ContextFlags {
    /// No special behavior.
    pub const NONE: Self = Self {
        no_autospawn: false,
        no_fail: false,
    };

    /// Do not start a server if none is running.
    #[must_use]
    pub const fn no_autospawn(self) -> Self {
        Self {
            no_autospawn: true,
            ..self
        }
    }

    /// Wait for a server to appear instead of failing when none is reachable.
    #[must_use]
    pub const fn no_fail(self) -> Self {
        Self {
            no_fail: true,
            ..self
        }
    }

    /// Whether autospawning a server is disabled.
    #[must_use]
    pub const fn is_no_autospawn(self) -> bool {
        self.no_autospawn
    }

    /// Whether the connection waits for a server instead of failing.
    #[must_use]
    pub const fn is_no_fail(self) -> bool {
        self.no_fail
    }
}

struct ContextInner {
    // `None` once the context has been closed.
    native: Option<Box<dyn NativeContext>>,

    // Set when an operation timed out. A late callback may still arrive for that operation, so
    // the connection must not carry any further operations.
    abandoned: bool,
}

impl fmt::Debug for ContextInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("open", &self.native.is_some())
            .field("abandoned", &self.abandoned)
            .finish()
    }
}

#[derive(Debug)]
struct ContextShared {
    name: String,
    flags: ContextFlags,
    operation_timeout: Option<Duration>,
    loop_handle: LoopHandle,
    backend: Arc<dyn Backend>,

    // The context lock. Always taken before the loop lock.
    inner: Mutex<ContextInner>,
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        if let Some(native) = self.inner.get_mut().native.take() {
            release_native(&self.loop_handle, native);
        }
    }
}

/// A connection to a sound server.
///
/// Every operation blocks the calling thread until the server has answered, and can be called
/// from any thread except the event loop thread. Operations on one context are serialized: a
/// second caller waits until the first operation has finished. Separate contexts on the same
/// [`EventLoop`] do not wait for each other.
///
/// `Context` is a cheaply cloneable handle. The connection is closed when [`close()`][Self::close]
/// is called or when the last clone is dropped.
///
/// # Example
///
/// ```rust
/// use sound_bridge::fake::FakeServer;
/// use sound_bridge::{Context, EventLoop};
///
/// let event_loop = EventLoop::new();
/// let server = FakeServer::builder().sink("speakers").build();
///
/// let context = Context::builder(&event_loop, server).name("example").build();
/// context.connect(None)?;
///
/// let info = context.server_info()?;
/// assert_eq!(info.default_sink_name, "speakers");
///
/// context.close();
/// # Ok::<(), sound_bridge::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Context {
    shared: Arc<ContextShared>,
}

impl Context {
    /// Creates a builder for a context driven by `event_loop` that talks to the server through
    /// `backend`.
    #[must_use]
    pub fn builder<B>(event_loop: &EventLoop, backend: B) -> ContextBuilder
    where
        B: Backend,
    {
        ContextBuilder::new(event_loop.handle(), Arc::new(backend))
    }

    /// Connects to `server`, or to the default server if `None`, and blocks until the
    /// connection is ready or has failed.
    ///
    /// A context whose previous connection failed or was terminated reconnects with a fresh
    /// native handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyConnected`] if the context is connected or connecting, and
    /// [`Error::ConnectionFailed`] if the connection ends in a final state instead of becoming
    /// ready.
    pub fn connect(&self, server: Option<&str>) -> Result<()> {
        let mut inner = self.shared.inner.lock();

        if inner.abandoned {
            return Err(Error::Abandoned);
        }

        let mut guard = self.shared.loop_handle.lock();

        if guard.is_stopped() {
            return Err(Error::LoopStopped);
        }

        let native = {
            let Some(native) = inner.native.as_deref() else {
                return Err(Error::Closed);
            };

            let state = native.state(&guard);

            if state == ContextState::Ready || state.is_connecting() {
                return Err(Error::AlreadyConnected);
            }

            if state.is_final() {
                debug!(name = %self.shared.name, ?state, "replacing native context to reconnect");

                let fresh = self.shared.backend.new_context(&mut guard, &self.shared.name);

                if let Some(stale) = inner.native.replace(fresh) {
                    // Released with the loop lock held.
                    drop(stale);
                }
            }

            inner
                .native
                .as_deref()
                .expect("we just verified or replaced the native context")
        };

        let result = self.establish(native, &mut guard, server);

        if matches!(result, Err(Error::TimedOut)) {
            inner.abandoned = true;
        }

        result
    }

    /// Connects on a helper thread. See [`connect()`][Self::connect].
    #[must_use]
    pub fn connect_async(&self, server: Option<String>) -> OperationFuture<Result<()>> {
        self.spawn(move |context| context.connect(server.as_deref()))
    }

    fn establish(
        &self,
        native: &dyn NativeContext,
        guard: &mut LoopGuard<'_>,
        server: Option<&str>,
    ) -> Result<()> {
        // Written only by the state callback, read only by us while we hold the loop lock.
        let observed = Arc::new(Mutex::new(ContextState::Unconnected));

        let observed_clone = Arc::clone(&observed);
        native.set_state_callback(
            guard,
            Some(Box::new(move |guard, state| {
                *observed_clone.lock() = state;
                guard.signal(false);
            })),
        );

        if let Err(code) = native.connect(guard, server, self.shared.flags) {
            native.set_state_callback(guard, None);

            debug!(name = %self.shared.name, %code, "connection attempt rejected");
            return Err(Error::ConnectionFailed {
                state: native.state(guard),
                code,
            });
        }

        let deadline = self
            .shared
            .operation_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        let result = loop {
            let state = *observed.lock();
            trace!(name = %self.shared.name, ?state, "connection state observed");

            if state == ContextState::Ready {
                break Ok(());
            }

            if state.is_final() {
                break Err(Error::ConnectionFailed {
                    state,
                    code: native.last_error(guard),
                });
            }

            if guard.is_stopped() {
                break Err(Error::LoopStopped);
            }

            match deadline {
                None => guard.wait(),
                Some(deadline) => {
                    if guard.wait_until(deadline) && *observed.lock() == state {
                        warn!(name = %self.shared.name, "connection attempt timed out");
                        break Err(Error::TimedOut);
                    }
                }
            }
        };

        // Nobody is waiting for further state changes.
        native.set_state_callback(guard, None);

        match &result {
            Ok(()) => debug!(name = %self.shared.name, ?server, "connected"),
            Err(error) => debug!(name = %self.shared.name, ?server, %error, "connection failed"),
        }

        result
    }

    /// Closes the connection. The context can be connected again afterwards.
    ///
    /// Harmless when not connected.
    pub fn disconnect(&self) {
        let inner = self.shared.inner.lock();

        let Some(native) = inner.native.as_deref() else {
            return;
        };

        let mut guard = self.shared.loop_handle.lock();

        if native.state(&guard) == ContextState::Unconnected {
            return;
        }

        native.disconnect(&mut guard);
        debug!(name = %self.shared.name, "disconnected");
    }

    /// Disconnects and releases the native connection handle.
    ///
    /// Waits for an operation in flight on another thread to finish first. Every operation on a
    /// closed context fails with [`Error::Closed`]. Closing more than once is harmless, and the
    /// last dropped clone closes the context automatically.
    pub fn close(&self) {
        let native = self.shared.inner.lock().native.take();

        if let Some(native) = native {
            release_native(&self.shared.loop_handle, native);
            debug!(name = %self.shared.name, "closed");
        }
    }

    /// The current connection state. A closed context reports [`ContextState::Terminated`].
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.query(|native, guard| native.state(guard))
            .unwrap_or(ContextState::Terminated)
    }

    /// Whether the connection is ready for operations.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ContextState::Ready
    }

    /// The name of the server the context is connected to, if connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the context has been closed.
    pub fn server_name(&self) -> Result<Option<String>> {
        self.query(|native, guard| native.server_name(guard))
    }

    /// The protocol version implemented by the client library.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the context has been closed.
    pub fn protocol_version(&self) -> Result<u32> {
        self.query(|native, guard| native.protocol_version(guard))
    }

    /// The protocol version implemented by the server, if connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the context has been closed.
    pub fn server_protocol_version(&self) -> Result<Option<u32>> {
        self.query(|native, guard| native.server_protocol_version(guard))
    }

    /// The index the server assigned to this client, if connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the context has been closed.
    pub fn index(&self) -> Result<Option<u32>> {
        self.query(|native, guard| native.index(guard))
    }

    /// The error recorded by the most recent failure on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the context has been closed.
    pub fn last_error(&self) -> Result<ErrorCode> {
        self.query(|native, guard| native.last_error(guard))
    }

    /// The client name this context announces to the server.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Runs `operation` on a new thread and returns a future for its result.
    ///
    /// Every call starts its own OS thread, which exits when `operation` returns. Awaiting many
    /// operations at once costs one thread each; put related calls in one closure to share it.
    ///
    /// This is the awaitable form of every blocking operation:
    ///
    /// ```rust
    /// # use sound_bridge::fake::FakeServer;
    /// # use sound_bridge::{Context, EventLoop};
    /// # let event_loop = EventLoop::new();
    /// # let context = Context::builder(&event_loop, FakeServer::new()).build();
    /// # context.connect(None)?;
    /// let sinks = futures::executor::block_on(context.spawn(|context| context.sink_info_list()))?;
    /// # Ok::<(), sound_bridge::Error>(())
    /// ```
    #[must_use]
    pub fn spawn<F, T>(&self, operation: F) -> OperationFuture<T>
    where
        F: FnOnce(&Self) -> T + Send + 'static,
        T: Send + 'static,
    {
        let context = self.clone();

        OperationFuture::spawn(format!("{}-operation", self.shared.name), move || {
            operation(&context)
        })
    }

    fn query<T>(&self, f: impl FnOnce(&dyn NativeContext, &LoopGuard<'_>) -> T) -> Result<T> {
        let inner = self.shared.inner.lock();

        let Some(native) = inner.native.as_deref() else {
            return Err(Error::Closed);
        };

        let guard = self.shared.loop_handle.lock();
        Ok(f(native, &guard))
    }

    /// Runs one bridged operation with exclusive access to the connection.
    ///
    /// Takes the context lock and then the loop lock, and verifies that the connection can carry
    /// an operation before handing out the session.
    fn with_session<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Session<'_, '_>) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.shared.inner.lock();

        if inner.abandoned {
            return Err(Error::Abandoned);
        }

        let Some(native) = inner.native.as_deref() else {
            return Err(Error::Closed);
        };

        let mut guard = self.shared.loop_handle.lock();

        if guard.is_stopped() {
            return Err(Error::LoopStopped);
        }

        let state = native.state(&guard);

        if state != ContextState::Ready {
            return Err(Error::NotConnected { state });
        }

        let mut session = Session::new(
            native,
            &mut guard,
            operation,
            self.shared.operation_timeout,
        );

        let result = f(&mut session);

        if session.timed_out() {
            inner.abandoned = true;
        }

        result
    }
}

fn release_native(loop_handle: &LoopHandle, native: Box<dyn NativeContext>) {
    let mut guard = loop_handle.lock();

    native.set_state_callback(&mut guard, None);
    native.disconnect(&mut guard);

    // The native handle is released with the loop lock held.
    drop(native);
}

/// Builder for configuring a [`Context`].
#[derive(Debug)]
pub struct ContextBuilder {
    loop_handle: LoopHandle,
    backend: Arc<dyn Backend>,
    name: String,
    flags: ContextFlags,
    operation_timeout: Option<Duration>,
}

impl ContextBuilder {
    fn new(loop_handle: LoopHandle, backend: Arc<dyn Backend>) -> Self {
        Self {
            loop_handle,
            backend,
            name: DEFAULT_NAME.to_string(),
            flags: ContextFlags::NONE,
            operation_timeout: None,
        }
    }

    /// Sets the client name announced to the server.
    ///
    /// Default is `sound-bridge`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the connection flags.
    ///
    /// Default is [`ContextFlags::NONE`].
    #[must_use]
    pub fn flags(mut self, flags: ContextFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Bounds how long a single operation (including connecting) may wait for the server.
    ///
    /// When the bound is exceeded, the operation fails with [`Error::TimedOut`] and the context
    /// is abandoned: every later operation fails with [`Error::Abandoned`]. Close the context and
    /// create a new one to continue.
    ///
    /// Default is no timeout.
    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Creates the context. The context is not connected yet.
    ///
    /// # Panics
    ///
    /// Panics if called from the event loop thread.
    #[must_use]
    pub fn build(self) -> Context {
        let native = {
            let mut guard = self.loop_handle.lock();
            self.backend.new_context(&mut guard, &self.name)
        };

        trace!(name = %self.name, "context created");

        Context {
            shared: Arc::new(ContextShared {
                name: self.name,
                flags: self.flags,
                operation_timeout: self.operation_timeout,
                loop_handle: self.loop_handle,
                backend: self.backend,
                inner: Mutex::new(ContextInner {
                    native: Some(native),
                    abandoned: false,
                }),
            }),
        }
    }
}
