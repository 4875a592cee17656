//! The raw-packet transmitter: a dedicated OS thread owning an
//! `IP_HDRINCL` raw socket, fed by a mutex-guarded request queue and woken
//! by a one-byte write on a notification socket pair — the same shape as
//! the broker's decoder threads (§4.5), minus the async runtime.

use super::frame::{craft_frame, PayloadTable, UdpRequest};
use crate::error::{EngineError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// Handle returned to the rest of the process: queue a request, or signal
/// the transmitter thread to shut down.
pub struct Transmitter {
    queue: Arc<Mutex<Vec<UdpRequest>>>,
    notify_write: RawFd,
    done: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Transmitter {
    /// Spawns the transmitter thread. `table` is the per-destination-port
    /// payload table consulted when crafting each frame.
    pub fn spawn(table: PayloadTable) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(libc::IPPROTO_RAW)))
            .map_err(|err| EngineError::Socket(format!("raw socket: {err}")))?;
        socket
            .set_header_included_v4(true)
            .map_err(|err| EngineError::Socket(format!("IP_HDRINCL: {err}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|err| EngineError::Socket(format!("set_nonblocking: {err}")))?;

        let mut fds = [0 as RawFd; 2];
        // SAFETY: `fds` is a valid 2-element out-array for socketpair(2);
        // the call either fills both slots or returns an error we check.
        let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(EngineError::Socket(format!(
                "socketpair: {}",
                std::io::Error::last_os_error()
            )));
        }
        let (notify_read, notify_write) = (fds[0], fds[1]);

        let queue = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(Mutex::new(false));

        let worker_queue = Arc::clone(&queue);
        let worker_done = Arc::clone(&done);
        let handle = std::thread::Builder::new()
            .name("raw-transmitter".into())
            .spawn(move || event_loop(socket, table, worker_queue, worker_done, notify_read))
            .map_err(|err| EngineError::Socket(format!("spawn transmitter thread: {err}")))?;

        Ok(Transmitter {
            queue,
            notify_write,
            done,
            handle: Some(handle),
        })
    }

    /// Queues `req` for transmission and wakes the worker thread.
    pub fn send(&self, req: UdpRequest) {
        self.queue.lock().expect("transmitter queue poisoned").push(req);
        self.wake();
    }

    /// Signals shutdown and wakes the worker thread so it can observe it.
    pub fn shutdown(&mut self) {
        *self.done.lock().expect("transmitter done flag poisoned") = true;
        self.wake();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn wake(&self) {
        let byte = [0u8];
        // SAFETY: `notify_write` is a valid, owned socketpair endpoint for
        // the lifetime of `self`; a short write of one byte cannot fail in
        // a way we need to act on beyond logging.
        let n = unsafe { libc::write(self.notify_write, byte.as_ptr() as *const _, 1) };
        if n < 0 {
            warn!(err = %std::io::Error::last_os_error(), "failed to wake transmitter thread");
        }
    }
}

impl Drop for Transmitter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
        // SAFETY: `notify_write` is owned by this struct and not used
        // after this point.
        unsafe {
            libc::close(self.notify_write);
        }
    }
}

fn event_loop(
    socket: Socket,
    table: PayloadTable,
    queue: Arc<Mutex<Vec<UdpRequest>>>,
    done: Arc<Mutex<bool>>,
    notify_read: RawFd,
) {
    let socket_fd = socket.as_raw_fd();
    let mut pollfds = [
        libc::pollfd {
            fd: notify_read,
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    loop {
        if *done.lock().expect("transmitter done flag poisoned") {
            break;
        }

        // SAFETY: `pollfds` is a valid array of the given length; poll(2)
        // only reads/writes within it.
        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, 1000) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            error!(%err, "transmitter poll failed");
            break;
        }
        if pollfds[0].revents & libc::POLLIN != 0 {
            let mut drain = [0u8; 64];
            // SAFETY: reads at most `drain.len()` bytes into a live buffer.
            unsafe {
                libc::read(notify_read, drain.as_mut_ptr() as *mut _, drain.len());
            }
        }

        let pending: Vec<UdpRequest> = std::mem::take(&mut *queue.lock().expect("transmitter queue poisoned"));
        for req in pending {
            let frame = craft_frame(&req, &table);
            let dest = std::net::SocketAddrV4::new(req.daddr, 0);
            match socket.send_to(&frame, &dest.into()) {
                Ok(_) => debug!(saddr = %req.saddr, daddr = %req.daddr, dport = req.dport, "raw UDP probe sent"),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    warn!(daddr = %req.daddr, "raw socket would block, dropping probe");
                }
                Err(err) => error!(%err, daddr = %req.daddr, "raw UDP send failed"),
            }
        }
    }

    let _ = socket_fd;
}
