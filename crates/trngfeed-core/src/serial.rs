//! Serial TRNG source in fully transparent raw mode.
//!
//! The line discipline must not alter or swallow a single byte: no echo, no
//! canonical processing, no CR/NL translation, no parity stripping, no
//! software or hardware flow control, 8 data bits. Reads block until at least
//! one byte is available (`VMIN = 1`, `VTIME = 0`).

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::device::{device_path, validate_baud};
use crate::error::{FeedError, Result};

/// How to open and configure the serial source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub device: PathBuf,
    pub baud: u32,
    /// Ignore modem control lines (`CLOCAL`). Off by default, so a carrier
    /// drop is noticed.
    pub local_line: bool,
}

impl SerialConfig {
    /// Validate a device name and rate into a config.
    pub fn new(device_name: &str, baud: u32) -> Result<Self> {
        let device = device_path(device_name)?;
        let baud = validate_baud(baud)?;
        speed_constant(baud).ok_or_else(|| {
            FeedError::config(format!("speed {baud} is not supported on this platform"))
        })?;
        Ok(Self {
            device,
            baud,
            local_line: false,
        })
    }

    pub fn with_local_line(mut self, local_line: bool) -> Self {
        self.local_line = local_line;
        self
    }
}

/// An opened, raw-mode serial device.
#[derive(Debug)]
pub struct SerialSource {
    file: File,
    device: PathBuf,
}

impl SerialSource {
    /// Open the device and put it into transparent raw mode.
    ///
    /// Any failure here is a [`FeedError::Source`]; the pipeline never starts
    /// with a half-configured line.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&config.device)
            .map_err(|e| FeedError::source_failure("open tty", e))?;
        let fd = file.as_raw_fd();

        // SAFETY: fd is a valid open descriptor owned by `file`.
        if unsafe { libc::isatty(fd) } != 1 {
            return Err(FeedError::source_failure(
                "input not a tty",
                io::Error::last_os_error(),
            ));
        }

        // SAFETY: TIOCEXCL takes no argument; fd is valid.
        if unsafe { libc::ioctl(fd, libc::TIOCEXCL) } == -1 {
            return Err(FeedError::source_failure(
                "ioctl(TIOCEXCL)",
                io::Error::last_os_error(),
            ));
        }

        configure(fd, config)?;
        log::info!(
            "configured {} raw at {} bps{}",
            config.device.display(),
            config.baud,
            if config.local_line { " (local line)" } else { "" }
        );

        Ok(Self {
            file,
            device: config.device.clone(),
        })
    }

    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl Read for SerialSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

fn configure(fd: RawFd, config: &SerialConfig) -> Result<()> {
    let speed = speed_constant(config.baud).ok_or_else(|| {
        FeedError::config(format!("speed {} is not supported on this platform", config.baud))
    })?;

    // SAFETY: termios is plain old data; tcgetattr fully initialises it.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: fd is valid and tio points to a live termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } == -1 {
        return Err(FeedError::source_failure(
            "tcgetattr",
            io::Error::last_os_error(),
        ));
    }

    apply_raw_mode(&mut tio, config.local_line);

    // SAFETY: tio is a valid termios obtained from tcgetattr.
    let speed_ok = unsafe {
        libc::cfsetispeed(&mut tio, speed) == 0 && libc::cfsetospeed(&mut tio, speed) == 0
    };
    if !speed_ok {
        return Err(FeedError::source_failure(
            "cfsetspeed",
            io::Error::last_os_error(),
        ));
    }

    // SAFETY: fd is valid and tio is fully initialised.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } == -1 {
        return Err(FeedError::source_failure(
            "tcsetattr for raw mode",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

/// Clear every flag that could alter the byte stream and set 8N1 raw input.
pub fn apply_raw_mode(tio: &mut libc::termios, local_line: bool) {
    tio.c_iflag &= !(libc::IMAXBEL
        | libc::IXOFF
        | libc::INPCK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IGNPAR);
    tio.c_iflag |= libc::IGNBRK;

    tio.c_oflag &= !libc::OPOST;

    tio.c_lflag &= !(libc::ECHO
        | libc::ECHOE
        | libc::ECHOK
        | libc::ECHOKE
        | libc::ECHOCTL
        | libc::ECHONL
        | libc::ICANON
        | libc::ISIG
        | libc::IEXTEN
        | libc::NOFLSH
        | libc::TOSTOP
        | libc::PENDIN);

    tio.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::CRTSCTS);
    tio.c_cflag |= libc::CS8 | libc::CREAD;
    if local_line {
        tio.c_cflag |= libc::CLOCAL;
    } else {
        tio.c_cflag &= !libc::CLOCAL;
    }

    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;
}

/// Map a numeric rate to the platform's `speed_t`.
///
/// Linux encodes speeds as symbolic `Bnnn` constants, so only the standard
/// rates are available there.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn speed_constant(baud: u32) -> Option<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        460_800 => libc::B460800,
        500_000 => libc::B500000,
        576_000 => libc::B576000,
        921_600 => libc::B921600,
        1_000_000 => libc::B1000000,
        _ => return None,
    };
    Some(speed)
}

/// Map a numeric rate to the platform's `speed_t`.
///
/// BSD-family termios takes the rate in bits per second directly.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn speed_constant(baud: u32) -> Option<libc::speed_t> {
    Some(baud as libc::speed_t)
}
