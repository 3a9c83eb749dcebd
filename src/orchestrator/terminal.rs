use nix::sys::termios::{self, SetArg, Termios};
use std::os::fd::{AsFd, AsRawFd};

nix::ioctl_read_bad!(tiocgwinsz, nix::libc::TIOCGWINSZ, nix::libc::winsize);

/// Puts the host terminal into raw mode until dropped
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    pub fn enable() -> nix::Result<Self> {
        let stdin = std::io::stdin();
        let original = termios::tcgetattr(stdin.as_fd())?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)?;

        Ok(Self { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        if let Err(e) = termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.original) {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}

/// Rows and columns of the terminal on stdout
pub fn size() -> Option<(u16, u16)> {
    let mut ws = nix::libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let fd = std::io::stdout().as_raw_fd();

    // SAFETY: TIOCGWINSZ only writes a winsize into the buffer we own
    unsafe { tiocgwinsz(fd, &mut ws) }.ok()?;

    if ws.ws_row == 0 || ws.ws_col == 0 {
        None
    } else {
        Some((ws.ws_row, ws.ws_col))
    }
}
