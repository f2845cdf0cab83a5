/// Headset mute-gesture listener backed by the system notification bus
/// (`notify(3)`).
///
/// The subscription is made on a dedicated OS thread that blocks in `poll(2)`
/// on the descriptor libnotify writes to for every delivery, so notifications
/// reach this thread whatever the main thread is doing.  Each delivery only
/// raises a [`MuteSignal`]; the poller on the main thread observes and clears
/// it.  [`ListenerHandle::stop`] wakes the thread through a pipe, after which it
/// cancels its registration and exits.
///
/// On non-macOS platforms [`start`] returns [`ListenError::Unsupported`].
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ListenError;

/// Notification posted by `audioaccessoryd` when the headset stem is pressed
/// to toggle mute.
pub const DEFAULT_NOTIFICATION: &str = "com.apple.audioaccessoryd.MuteState";

/// Single-slot "event pending" flag shared between the listener thread
/// (producer) and the poller (consumer).
///
/// Any number of [`raise`](Self::raise) calls between two
/// [`take`](Self::take) calls collapse into one pending event.
#[derive(Debug, Clone, Default)]
pub struct MuteSignal(Arc<AtomicBool>);

impl MuteSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an event as pending.  Safe to call from any thread.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the flag and returns whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ── Public handle ─────────────────────────────────────────────────────────────

/// A handle to the running listener thread.
pub struct ListenerHandle {
    notification: String,
    #[cfg(target_os = "macos")]
    thread: std::thread::JoinHandle<()>,
    /// Write end of the wake pipe; the thread exits once it becomes readable.
    #[cfg(target_os = "macos")]
    wake: std::fs::File,
}

impl ListenerHandle {
    /// Name of the notification this listener is subscribed to.
    pub fn notification_name(&self) -> &str {
        &self.notification
    }

    /// Signals the listener thread to stop and blocks until it has cancelled
    /// its registration and exited.
    pub fn stop(self) {
        #[cfg(target_os = "macos")]
        {
            use std::io::Write;

            let mut wake = self.wake;
            // Closing the write end alone is not enough if a child process
            // inherited it, so send a byte as well.
            if let Err(e) = wake.write_all(&[1]) {
                tracing::debug!(error = %e, "wake write failed; relying on close");
            }
            drop(wake);
            if self.thread.join().is_err() {
                tracing::error!("listener thread panicked");
            }
        }
        tracing::debug!(name = %self.notification, "listener stopped");
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

/// Subscribes to `notification` on a dedicated thread and returns a
/// [`ListenerHandle`] once the registration is in place.
///
/// Every delivery raises `signal`.  Blocks until the thread confirms the
/// subscription or reports why it could not subscribe.
pub fn start(notification: &str, signal: MuteSignal) -> Result<ListenerHandle, ListenError> {
    #[cfg(target_os = "macos")]
    {
        let (wake_rx, wake) = imp::wake_pipe()?;
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let thread = {
            let name = notification.to_string();
            std::thread::Builder::new()
                .name("mute-listener".into())
                .spawn(move || imp::run_listener(&name, signal, wake_rx, ready_tx))?
        };
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(ListenError::ThreadDied);
            }
        }
        tracing::info!(name = notification, "listening for headset mute gestures");
        Ok(ListenerHandle {
            notification: notification.to_string(),
            thread,
            wake,
        })
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = (notification, signal);
        Err(ListenError::Unsupported)
    }
}

/// Posts `notification` on the system bus, exactly as the headset does.
pub fn post(notification: &str) -> Result<(), ListenError> {
    #[cfg(target_os = "macos")]
    {
        imp::post(notification)
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = notification;
        Err(ListenError::Unsupported)
    }
}

// ── macOS implementation ──────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
mod imp {
    use std::ffi::{c_char, c_int, CString};
    use std::fs::File;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd};
    use std::sync::mpsc::SyncSender;

    use super::MuteSignal;
    use crate::error::ListenError;

    const NOTIFY_STATUS_OK: u32 = 0;

    // libnotify ships in libSystem; neither `libc` nor the CoreFoundation
    // bindings expose it.
    extern "C" {
        fn notify_register_file_descriptor(
            name: *const c_char,
            notify_fd: *mut c_int,
            flags: c_int,
            out_token: *mut c_int,
        ) -> u32;
        fn notify_cancel(token: c_int) -> u32;
        fn notify_post(name: *const c_char) -> u32;
    }

    fn c_name(name: &str) -> Result<CString, ListenError> {
        CString::new(name).map_err(|_| ListenError::InvalidName(name.to_string()))
    }

    pub fn post(name: &str) -> Result<(), ListenError> {
        let c_name = c_name(name)?;
        let status = unsafe { notify_post(c_name.as_ptr()) };
        if status != NOTIFY_STATUS_OK {
            return Err(ListenError::Notify { name: name.to_string(), status });
        }
        Ok(())
    }

    /// Creates the `(read, write)` wake pipe.  Both ends are close-on-exec so
    /// spawned `osascript`/`afplay` children do not hold them open.
    pub fn wake_pipe() -> io::Result<(File, File)> {
        let mut fds = [0 as c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let (rx, tx) = unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) };
        for fd in [rx.as_raw_fd(), tx.as_raw_fd()] {
            if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok((rx, tx))
    }

    /// Registers for `name`, reports the outcome on `ready_tx`, then raises
    /// `signal` for every delivery until `wake_rx` becomes readable.  Cancels
    /// the registration (which closes its descriptor) before returning.
    pub fn run_listener(
        name: &str,
        signal: MuteSignal,
        wake_rx: File,
        ready_tx: SyncSender<Result<(), ListenError>>,
    ) {
        let c_name = match c_name(name) {
            Ok(c) => c,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let mut notify_fd: c_int = -1;
        let mut token: c_int = 0;
        let status =
            unsafe { notify_register_file_descriptor(c_name.as_ptr(), &mut notify_fd, 0, &mut token) };
        if status != NOTIFY_STATUS_OK {
            let _ = ready_tx.send(Err(ListenError::Notify { name: name.to_string(), status }));
            return;
        }
        if unsafe { libc::fcntl(notify_fd, libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
            tracing::debug!(error = %io::Error::last_os_error(), "could not mark notify descriptor close-on-exec");
        }
        let _ = ready_tx.send(Ok(()));
        drop(ready_tx);

        pump(name, notify_fd, &wake_rx, &signal);

        unsafe { notify_cancel(token) };
        tracing::debug!("listener thread exited");
    }

    fn pump(name: &str, notify_fd: c_int, wake_rx: &File, signal: &MuteSignal) {
        let mut fds = [
            libc::pollfd { fd: notify_fd, events: libc::POLLIN, revents: 0 },
            libc::pollfd { fd: wake_rx.as_raw_fd(), events: libc::POLLIN, revents: 0 },
        ];
        loop {
            for p in fds.iter_mut() {
                p.revents = 0;
            }
            let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::error!(name, error = %err, "poll failed; listener exiting");
                return;
            }

            // Any activity on the wake pipe (a byte, or the write end closing) means stop.
            if fds[1].revents != 0 {
                return;
            }

            let revents = fds[0].revents;
            if revents & libc::POLLIN != 0 {
                // Each delivery writes the 4-byte registration token.
                let mut token = [0u8; 4];
                let read = unsafe { libc::read(notify_fd, token.as_mut_ptr().cast(), token.len()) };
                if read <= 0 {
                    tracing::error!(name, error = %io::Error::last_os_error(), "notify read failed; listener exiting");
                    return;
                }
                signal.raise();
            } else if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                tracing::error!(name, revents, "notify descriptor closed; listener exiting");
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
