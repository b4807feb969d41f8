//! Inbound notifications from the window manager
//!
//! The window procedure hands every message to [`Notification::decode`],
//! which turns the raw `(msg, wparam, lparam)` triple into an explicit
//! notification for the dispatcher. Anything not recognized comes back as
//! [`Notification::Other`] and is passed through untouched.

pub const WM_ACTIVATE: u32 = 0x0006;
pub const WM_WINDOWPOSCHANGED: u32 = 0x0047;
pub const WM_DISPLAYCHANGE: u32 = 0x007E;
pub const WM_DPICHANGED: u32 = 0x02E0;

/// AppBar callback codes (the wparam of the registered callback message)
pub const ABN_STATECHANGE: usize = 0;
pub const ABN_POSCHANGED: usize = 1;
pub const ABN_FULLSCREENAPP: usize = 2;
pub const ABN_WINDOWARRANGE: usize = 3;

/// Raw window message as delivered to the window procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    pub msg: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl RawMessage {
    pub fn new(msg: u32, wparam: usize, lparam: isize) -> Self {
        Self { msg, wparam, lparam }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrangePhase {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Another AppBar or the taskbar changed size or position
    PosChanged,
    /// A full-screen application opened (`entering`) or closed
    FullScreenApp { entering: bool },
    /// The shell is about to tile/cascade windows, or has finished
    WindowArrange(ArrangePhase),
    Activate,
    WindowPosChanged,
    /// New DPI for the bar's monitor
    DpiChanged { dpi: u32 },
    /// New display resolution in device pixels
    DisplayChange { width: u32, height: u32 },
    /// Anything else, to be passed through unconsumed
    Other(RawMessage),
}

/// Whether the bar claimed a message or left it for the default handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Consumed,
    PassThrough,
}

impl Notification {
    /// Decode a window message. `appbar_message` is the callback id the bar
    /// registered with the shell, if any.
    pub fn decode(appbar_message: Option<u32>, raw: RawMessage) -> Notification {
        if appbar_message == Some(raw.msg) {
            return match raw.wparam {
                ABN_POSCHANGED => Notification::PosChanged,
                ABN_FULLSCREENAPP => Notification::FullScreenApp {
                    entering: raw.lparam != 0,
                },
                ABN_WINDOWARRANGE => Notification::WindowArrange(if raw.lparam != 0 {
                    ArrangePhase::Before
                } else {
                    ArrangePhase::After
                }),
                _ => Notification::Other(raw),
            };
        }

        match raw.msg {
            WM_ACTIVATE => Notification::Activate,
            WM_WINDOWPOSCHANGED => Notification::WindowPosChanged,
            WM_DPICHANGED => Notification::DpiChanged {
                dpi: (raw.wparam & 0xFFFF) as u32,
            },
            WM_DISPLAYCHANGE => {
                let packed = raw.lparam as usize;
                Notification::DisplayChange {
                    width: (packed & 0xFFFF) as u32,
                    height: ((packed >> 16) & 0xFFFF) as u32,
                }
            }
            _ => Notification::Other(raw),
        }
    }
}
