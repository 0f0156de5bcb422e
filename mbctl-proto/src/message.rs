//! Protocol message types for client↔daemon communication.
//!
//! Every RPC exchange is one [`RequestEnvelope`] answered by one
//! [`ResponseEnvelope`]. The envelope tag selects the payload variant; the
//! payload itself is a postcard-encoded struct.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the daemon socket in the abstract Unix namespace.
pub const SOCKET_NAME: &str = "mbtool.daemon";

/// Interface version this client speaks.
pub const INTERFACE_VERSION: i32 = 3;

/// Sent by the daemon when the client passed its signature check.
pub const TOKEN_ALLOW: &str = "ALLOW";
/// Sent by the daemon when the client failed its signature check.
pub const TOKEN_DENY: &str = "DENY";
/// Sent by the daemon when it accepts the requested interface version.
pub const TOKEN_OK: &str = "OK";
/// Sent by the daemon when it does not implement the requested interface.
pub const TOKEN_UNSUPPORTED: &str = "UNSUPPORTED";

/// Discriminant of a [`RequestEnvelope`].
///
/// Each tag shares its numeric value with the [`ResponseType`] that answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
#[repr(u8)]
pub enum RequestType {
    /// [`PathChmodRequest`].
    PathChmod = 12,
    /// [`PathCopyRequest`].
    PathCopy = 13,
    /// [`PathSELinuxGetLabelRequest`].
    PathSELinuxGetLabel = 14,
    /// [`PathSELinuxSetLabelRequest`].
    PathSELinuxSetLabel = 15,
    /// [`GetVersionRequest`].
    GetVersion = 16,
    /// [`GetInstalledRomsRequest`].
    GetInstalledRoms = 17,
    /// [`GetBootedRomIdRequest`].
    GetBootedRomId = 18,
    /// [`SwitchRomRequest`].
    SwitchRom = 19,
    /// [`SetKernelRequest`].
    SetKernel = 20,
    /// [`WipeRomRequest`].
    WipeRom = 21,
    /// [`RebootRequest`].
    Reboot = 22,
}

impl RequestType {
    /// Every request tag, in wire order.
    pub const ALL: [Self; 11] = [
        Self::PathChmod,
        Self::PathCopy,
        Self::PathSELinuxGetLabel,
        Self::PathSELinuxSetLabel,
        Self::GetVersion,
        Self::GetInstalledRoms,
        Self::GetBootedRomId,
        Self::SwitchRom,
        Self::SetKernel,
        Self::WipeRom,
        Self::Reboot,
    ];

    /// The only response tag that may answer this request.
    pub const fn response_type(self) -> ResponseType {
        match self {
            Self::PathChmod => ResponseType::PathChmod,
            Self::PathCopy => ResponseType::PathCopy,
            Self::PathSELinuxGetLabel => ResponseType::PathSELinuxGetLabel,
            Self::PathSELinuxSetLabel => ResponseType::PathSELinuxSetLabel,
            Self::GetVersion => ResponseType::GetVersion,
            Self::GetInstalledRoms => ResponseType::GetInstalledRoms,
            Self::GetBootedRomId => ResponseType::GetBootedRomId,
            Self::SwitchRom => ResponseType::SwitchRom,
            Self::SetKernel => ResponseType::SetKernel,
            Self::WipeRom => ResponseType::WipeRom,
            Self::Reboot => ResponseType::Reboot,
        }
    }
}

impl TryFrom<u8> for RequestType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        Self::ALL.into_iter().find(|t| *t as u8 == tag).ok_or(tag)
    }
}

/// Discriminant of a [`ResponseEnvelope`].
///
/// Closed set, versioned with [`INTERFACE_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
#[repr(u8)]
pub enum ResponseType {
    /// The daemon does not know the request tag.
    Unsupported = 1,
    /// The daemon could not parse the request payload.
    Invalid = 2,
    /// Legacy fd-based chmod.
    FileChmod = 3,
    /// Legacy fd close.
    FileClose = 4,
    /// Legacy fd open.
    FileOpen = 5,
    /// Legacy fd read.
    FileRead = 6,
    /// Legacy fd seek.
    FileSeek = 7,
    /// Legacy fd stat.
    FileStat = 8,
    /// Legacy fd write.
    FileWrite = 9,
    /// Legacy fd SELinux label read.
    FileSELinuxGetLabel = 10,
    /// Legacy fd SELinux label write.
    FileSELinuxSetLabel = 11,
    /// Answer to [`RequestType::PathChmod`].
    PathChmod = 12,
    /// Answer to [`RequestType::PathCopy`].
    PathCopy = 13,
    /// Answer to [`RequestType::PathSELinuxGetLabel`].
    PathSELinuxGetLabel = 14,
    /// Answer to [`RequestType::PathSELinuxSetLabel`].
    PathSELinuxSetLabel = 15,
    /// Answer to [`RequestType::GetVersion`].
    GetVersion = 16,
    /// Answer to [`RequestType::GetInstalledRoms`].
    GetInstalledRoms = 17,
    /// Answer to [`RequestType::GetBootedRomId`].
    GetBootedRomId = 18,
    /// Answer to [`RequestType::SwitchRom`].
    SwitchRom = 19,
    /// Answer to [`RequestType::SetKernel`].
    SetKernel = 20,
    /// Answer to [`RequestType::WipeRom`].
    WipeRom = 21,
    /// Answer to [`RequestType::Reboot`].
    Reboot = 22,
}

impl ResponseType {
    /// Every response tag, in wire order.
    pub const ALL: [Self; 22] = [
        Self::Unsupported,
        Self::Invalid,
        Self::FileChmod,
        Self::FileClose,
        Self::FileOpen,
        Self::FileRead,
        Self::FileSeek,
        Self::FileStat,
        Self::FileWrite,
        Self::FileSELinuxGetLabel,
        Self::FileSELinuxSetLabel,
        Self::PathChmod,
        Self::PathCopy,
        Self::PathSELinuxGetLabel,
        Self::PathSELinuxSetLabel,
        Self::GetVersion,
        Self::GetInstalledRoms,
        Self::GetBootedRomId,
        Self::SwitchRom,
        Self::SetKernel,
        Self::WipeRom,
        Self::Reboot,
    ];

    /// Returns `true` for the payload-less `Unsupported`/`Invalid` tags.
    pub const fn is_sentinel(self) -> bool {
        matches!(self, Self::Unsupported | Self::Invalid)
    }
}

impl TryFrom<u8> for ResponseType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        Self::ALL.into_iter().find(|t| *t as u8 == tag).ok_or(tag)
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks for the daemon's software version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionRequest;

/// Asks for the list of installed ROMs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInstalledRomsRequest;

/// Asks for the ID of the currently booted ROM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBootedRomIdRequest;

/// Switches the boot partition to another ROM's kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRomRequest {
    /// Target ROM ID.
    pub rom_id: String,
    /// Boot partition block device.
    pub boot_blockdev: String,
    /// Directories searched when resolving block devices by name.
    pub blockdev_base_dirs: Vec<String>,
    /// Recompute the kernel checksum instead of validating it.
    pub force_update_checksums: bool,
}

/// Saves the current boot image as a ROM's kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetKernelRequest {
    /// Target ROM ID.
    pub rom_id: String,
    /// Boot partition block device.
    pub boot_blockdev: String,
}

/// Reboots the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootRequest {
    /// Reboot argument (`recovery`, `bootloader`, ...); empty for a normal reboot.
    pub arg: String,
}

/// Copies a path as root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCopyRequest {
    /// Absolute source path.
    pub source: String,
    /// Absolute target path.
    pub target: String,
}

/// Changes a path's permission bits as root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathChmodRequest {
    /// Absolute path.
    pub path: String,
    /// Mode bits; the daemon masks them with `0o777`.
    pub mode: u32,
}

/// Wipes parts of a ROM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeRomRequest {
    /// Target ROM ID.
    pub rom_id: String,
    /// [`WipeTarget`] codes.
    pub targets: Vec<i16>,
}

/// Reads a path's SELinux label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSELinuxGetLabelRequest {
    /// Absolute path.
    pub path: String,
    /// Resolve symlinks before reading.
    pub follow_symlinks: bool,
}

/// Sets a path's SELinux label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSELinuxSetLabelRequest {
    /// Absolute path.
    pub path: String,
    /// New label.
    pub label: String,
    /// Resolve symlinks before writing.
    pub follow_symlinks: bool,
}

/// A request sent from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum Request {
    /// See [`PathChmodRequest`].
    PathChmod(PathChmodRequest),
    /// See [`PathCopyRequest`].
    PathCopy(PathCopyRequest),
    /// See [`PathSELinuxGetLabelRequest`].
    PathSELinuxGetLabel(PathSELinuxGetLabelRequest),
    /// See [`PathSELinuxSetLabelRequest`].
    PathSELinuxSetLabel(PathSELinuxSetLabelRequest),
    /// See [`GetVersionRequest`].
    GetVersion(GetVersionRequest),
    /// See [`GetInstalledRomsRequest`].
    GetInstalledRoms(GetInstalledRomsRequest),
    /// See [`GetBootedRomIdRequest`].
    GetBootedRomId(GetBootedRomIdRequest),
    /// See [`SwitchRomRequest`].
    SwitchRom(SwitchRomRequest),
    /// See [`SetKernelRequest`].
    SetKernel(SetKernelRequest),
    /// See [`WipeRomRequest`].
    WipeRom(WipeRomRequest),
    /// See [`RebootRequest`].
    Reboot(RebootRequest),
}

impl Request {
    /// Tag carried by this request's envelope.
    pub const fn request_type(&self) -> RequestType {
        match self {
            Self::PathChmod(_) => RequestType::PathChmod,
            Self::PathCopy(_) => RequestType::PathCopy,
            Self::PathSELinuxGetLabel(_) => RequestType::PathSELinuxGetLabel,
            Self::PathSELinuxSetLabel(_) => RequestType::PathSELinuxSetLabel,
            Self::GetVersion(_) => RequestType::GetVersion,
            Self::GetInstalledRoms(_) => RequestType::GetInstalledRoms,
            Self::GetBootedRomId(_) => RequestType::GetBootedRomId,
            Self::SwitchRom(_) => RequestType::SwitchRom,
            Self::SetKernel(_) => RequestType::SetKernel,
            Self::WipeRom(_) => RequestType::WipeRom,
            Self::Reboot(_) => RequestType::Reboot,
        }
    }

    /// Serializes the payload and wraps it in a tagged envelope.
    pub fn to_envelope(&self) -> Result<RequestEnvelope, postcard::Error> {
        let payload = match self {
            Self::PathChmod(r) => postcard::to_allocvec(r),
            Self::PathCopy(r) => postcard::to_allocvec(r),
            Self::PathSELinuxGetLabel(r) => postcard::to_allocvec(r),
            Self::PathSELinuxSetLabel(r) => postcard::to_allocvec(r),
            Self::GetVersion(r) => postcard::to_allocvec(r),
            Self::GetInstalledRoms(r) => postcard::to_allocvec(r),
            Self::GetBootedRomId(r) => postcard::to_allocvec(r),
            Self::SwitchRom(r) => postcard::to_allocvec(r),
            Self::SetKernel(r) => postcard::to_allocvec(r),
            Self::WipeRom(r) => postcard::to_allocvec(r),
            Self::Reboot(r) => postcard::to_allocvec(r),
        }?;
        Ok(RequestEnvelope {
            tag: self.request_type() as u8,
            payload,
        })
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Generic outcome carried by most path and file responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the daemon completed the operation.
    pub success: bool,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
}

/// Outcome of a label read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelResponse {
    /// Whether the label was read.
    pub success: bool,
    /// The label, when `success` is set.
    pub label: Option<String>,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
}

/// Legacy: result of opening a daemon-side file descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOpenResponse {
    /// Whether the file was opened.
    pub success: bool,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
    /// Daemon-side descriptor ID.
    pub id: i32,
}

/// Legacy: result of reading from a daemon-side file descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReadResponse {
    /// Whether the read succeeded.
    pub success: bool,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
    /// Bytes read.
    pub data: Vec<u8>,
}

/// Legacy: result of seeking a daemon-side file descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSeekResponse {
    /// Whether the seek succeeded.
    pub success: bool,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
    /// Resulting offset.
    pub offset: i64,
}

/// Legacy: result of `fstat` on a daemon-side file descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatResponse {
    /// Whether the stat succeeded.
    pub success: bool,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
    /// `st_mode`.
    pub mode: u32,
    /// `st_size`.
    pub size: u64,
}

/// Legacy: result of writing to a daemon-side file descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWriteResponse {
    /// Whether the write succeeded.
    pub success: bool,
    /// Daemon-side description of the failure.
    pub error_msg: Option<String>,
    /// Bytes written.
    pub bytes_written: u64,
}

/// Daemon software version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionResponse {
    /// Version string, e.g. `9.2.0.r15.g1a2b3c4`.
    pub version: Option<String>,
}

/// One installed ROM as reported by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomEntry {
    /// ROM ID (`primary`, `dual`, `data-slot-…`).
    pub id: String,
    /// Path of the ROM's `/system`.
    pub system_path: Option<String>,
    /// Path of the ROM's `/cache`.
    pub cache_path: Option<String>,
    /// Path of the ROM's `/data`.
    pub data_path: Option<String>,
    /// Android version string.
    pub version: Option<String>,
    /// Build ID.
    pub build: Option<String>,
}

/// Installed ROMs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetInstalledRomsResponse {
    /// ROMs in daemon order.
    pub roms: Vec<RomEntry>,
}

/// Currently booted ROM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBootedRomIdResponse {
    /// ROM ID, absent if it could not be determined.
    pub rom_id: Option<String>,
}

/// Outcome of a ROM switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRomResponse {
    /// A [`SwitchRomCode`] value.
    pub result: i16,
}

/// Outcome of saving a kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetKernelResponse {
    /// Whether the kernel was saved.
    pub success: bool,
}

/// Outcome of a wipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeRomResponse {
    /// [`WipeTarget`] codes that were wiped.
    pub succeeded: Vec<i16>,
    /// [`WipeTarget`] codes that could not be wiped.
    pub failed: Vec<i16>,
}

/// Outcome of a reboot request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootResponse {
    /// Whether init accepted the reboot.
    pub success: bool,
}

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum Response {
    /// Legacy, see [`ResponseType::FileChmod`].
    FileChmod(StatusResponse),
    /// Legacy, see [`ResponseType::FileClose`].
    FileClose(StatusResponse),
    /// Legacy, see [`ResponseType::FileOpen`].
    FileOpen(FileOpenResponse),
    /// Legacy, see [`ResponseType::FileRead`].
    FileRead(FileReadResponse),
    /// Legacy, see [`ResponseType::FileSeek`].
    FileSeek(FileSeekResponse),
    /// Legacy, see [`ResponseType::FileStat`].
    FileStat(FileStatResponse),
    /// Legacy, see [`ResponseType::FileWrite`].
    FileWrite(FileWriteResponse),
    /// Legacy, see [`ResponseType::FileSELinuxGetLabel`].
    FileSELinuxGetLabel(LabelResponse),
    /// Legacy, see [`ResponseType::FileSELinuxSetLabel`].
    FileSELinuxSetLabel(StatusResponse),
    /// Reply to [`Request::PathChmod`].
    PathChmod(StatusResponse),
    /// Reply to [`Request::PathCopy`].
    PathCopy(StatusResponse),
    /// Reply to [`Request::PathSELinuxGetLabel`].
    PathSELinuxGetLabel(LabelResponse),
    /// Reply to [`Request::PathSELinuxSetLabel`].
    PathSELinuxSetLabel(StatusResponse),
    /// Reply to [`Request::GetVersion`].
    GetVersion(GetVersionResponse),
    /// Reply to [`Request::GetInstalledRoms`].
    GetInstalledRoms(GetInstalledRomsResponse),
    /// Reply to [`Request::GetBootedRomId`].
    GetBootedRomId(GetBootedRomIdResponse),
    /// Reply to [`Request::SwitchRom`].
    SwitchRom(SwitchRomResponse),
    /// Reply to [`Request::SetKernel`].
    SetKernel(SetKernelResponse),
    /// Reply to [`Request::WipeRom`].
    WipeRom(WipeRomResponse),
    /// Reply to [`Request::Reboot`].
    Reboot(RebootResponse),
}

impl Response {
    /// Tag carried by this response's envelope.
    pub const fn response_type(&self) -> ResponseType {
        match self {
            Self::FileChmod(_) => ResponseType::FileChmod,
            Self::FileClose(_) => ResponseType::FileClose,
            Self::FileOpen(_) => ResponseType::FileOpen,
            Self::FileRead(_) => ResponseType::FileRead,
            Self::FileSeek(_) => ResponseType::FileSeek,
            Self::FileStat(_) => ResponseType::FileStat,
            Self::FileWrite(_) => ResponseType::FileWrite,
            Self::FileSELinuxGetLabel(_) => ResponseType::FileSELinuxGetLabel,
            Self::FileSELinuxSetLabel(_) => ResponseType::FileSELinuxSetLabel,
            Self::PathChmod(_) => ResponseType::PathChmod,
            Self::PathCopy(_) => ResponseType::PathCopy,
            Self::PathSELinuxGetLabel(_) => ResponseType::PathSELinuxGetLabel,
            Self::PathSELinuxSetLabel(_) => ResponseType::PathSELinuxSetLabel,
            Self::GetVersion(_) => ResponseType::GetVersion,
            Self::GetInstalledRoms(_) => ResponseType::GetInstalledRoms,
            Self::GetBootedRomId(_) => ResponseType::GetBootedRomId,
            Self::SwitchRom(_) => ResponseType::SwitchRom,
            Self::SetKernel(_) => ResponseType::SetKernel,
            Self::WipeRom(_) => ResponseType::WipeRom,
            Self::Reboot(_) => ResponseType::Reboot,
        }
    }

    /// Serializes the payload and wraps it in a tagged envelope.
    pub fn to_envelope(&self) -> Result<ResponseEnvelope, postcard::Error> {
        let payload = match self {
            Self::FileChmod(r)
            | Self::FileClose(r)
            | Self::FileSELinuxSetLabel(r)
            | Self::PathChmod(r)
            | Self::PathCopy(r)
            | Self::PathSELinuxSetLabel(r) => postcard::to_allocvec(r),
            Self::FileSELinuxGetLabel(r) | Self::PathSELinuxGetLabel(r) => postcard::to_allocvec(r),
            Self::FileOpen(r) => postcard::to_allocvec(r),
            Self::FileRead(r) => postcard::to_allocvec(r),
            Self::FileSeek(r) => postcard::to_allocvec(r),
            Self::FileStat(r) => postcard::to_allocvec(r),
            Self::FileWrite(r) => postcard::to_allocvec(r),
            Self::GetVersion(r) => postcard::to_allocvec(r),
            Self::GetInstalledRoms(r) => postcard::to_allocvec(r),
            Self::GetBootedRomId(r) => postcard::to_allocvec(r),
            Self::SwitchRom(r) => postcard::to_allocvec(r),
            Self::SetKernel(r) => postcard::to_allocvec(r),
            Self::WipeRom(r) => postcard::to_allocvec(r),
            Self::Reboot(r) => postcard::to_allocvec(r),
        }?;
        Ok(ResponseEnvelope {
            tag: self.response_type() as u8,
            payload: Some(payload),
        })
    }
}

// ---------------------------------------------------------------------------
// Envelopes and the decoder table
// ---------------------------------------------------------------------------

/// Wire form of a request: tag plus postcard payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// A [`RequestType`] discriminant.
    pub tag: u8,
    /// Postcard-encoded request payload.
    pub payload: Vec<u8>,
}

/// Wire form of a response: tag plus optional postcard payload.
///
/// Sentinel tags carry no payload. A non-sentinel tag without a payload is
/// malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// A [`ResponseType`] discriminant.
    pub tag: u8,
    /// Postcard-encoded response payload.
    pub payload: Option<Vec<u8>>,
}

impl ResponseEnvelope {
    /// Builds a payload-less envelope (`Unsupported` / `Invalid`).
    pub const fn sentinel(ty: ResponseType) -> Self {
        Self {
            tag: ty as u8,
            payload: None,
        }
    }
}

/// Decodes a request payload for `ty`.
pub fn decode_request(ty: RequestType, payload: &[u8]) -> Result<Request, postcard::Error> {
    Ok(match ty {
        RequestType::PathChmod => Request::PathChmod(postcard::from_bytes(payload)?),
        RequestType::PathCopy => Request::PathCopy(postcard::from_bytes(payload)?),
        RequestType::PathSELinuxGetLabel => {
            Request::PathSELinuxGetLabel(postcard::from_bytes(payload)?)
        }
        RequestType::PathSELinuxSetLabel => {
            Request::PathSELinuxSetLabel(postcard::from_bytes(payload)?)
        }
        RequestType::GetVersion => Request::GetVersion(postcard::from_bytes(payload)?),
        RequestType::GetInstalledRoms => Request::GetInstalledRoms(postcard::from_bytes(payload)?),
        RequestType::GetBootedRomId => Request::GetBootedRomId(postcard::from_bytes(payload)?),
        RequestType::SwitchRom => Request::SwitchRom(postcard::from_bytes(payload)?),
        RequestType::SetKernel => Request::SetKernel(postcard::from_bytes(payload)?),
        RequestType::WipeRom => Request::WipeRom(postcard::from_bytes(payload)?),
        RequestType::Reboot => Request::Reboot(postcard::from_bytes(payload)?),
    })
}

/// Decodes a response payload for `ty`.
///
/// This is the single tag→decoder table. Sentinel tags have no payload and
/// decode to `None`.
pub fn decode_response(ty: ResponseType, payload: &[u8]) -> Result<Option<Response>, postcard::Error> {
    let resp = match ty {
        ResponseType::Unsupported | ResponseType::Invalid => return Ok(None),
        ResponseType::FileChmod => Response::FileChmod(postcard::from_bytes(payload)?),
        ResponseType::FileClose => Response::FileClose(postcard::from_bytes(payload)?),
        ResponseType::FileOpen => Response::FileOpen(postcard::from_bytes(payload)?),
        ResponseType::FileRead => Response::FileRead(postcard::from_bytes(payload)?),
        ResponseType::FileSeek => Response::FileSeek(postcard::from_bytes(payload)?),
        ResponseType::FileStat => Response::FileStat(postcard::from_bytes(payload)?),
        ResponseType::FileWrite => Response::FileWrite(postcard::from_bytes(payload)?),
        ResponseType::FileSELinuxGetLabel => {
            Response::FileSELinuxGetLabel(postcard::from_bytes(payload)?)
        }
        ResponseType::FileSELinuxSetLabel => {
            Response::FileSELinuxSetLabel(postcard::from_bytes(payload)?)
        }
        ResponseType::PathChmod => Response::PathChmod(postcard::from_bytes(payload)?),
        ResponseType::PathCopy => Response::PathCopy(postcard::from_bytes(payload)?),
        ResponseType::PathSELinuxGetLabel => {
            Response::PathSELinuxGetLabel(postcard::from_bytes(payload)?)
        }
        ResponseType::PathSELinuxSetLabel => {
            Response::PathSELinuxSetLabel(postcard::from_bytes(payload)?)
        }
        ResponseType::GetVersion => Response::GetVersion(postcard::from_bytes(payload)?),
        ResponseType::GetInstalledRoms => Response::GetInstalledRoms(postcard::from_bytes(payload)?),
        ResponseType::GetBootedRomId => Response::GetBootedRomId(postcard::from_bytes(payload)?),
        ResponseType::SwitchRom => Response::SwitchRom(postcard::from_bytes(payload)?),
        ResponseType::SetKernel => Response::SetKernel(postcard::from_bytes(payload)?),
        ResponseType::WipeRom => Response::WipeRom(postcard::from_bytes(payload)?),
        ResponseType::Reboot => Response::Reboot(postcard::from_bytes(payload)?),
    };
    Ok(Some(resp))
}

// ---------------------------------------------------------------------------
// Domain codes
// ---------------------------------------------------------------------------

/// Wire codes carried in [`SwitchRomResponse::result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
#[repr(i16)]
pub enum SwitchRomCode {
    /// The ROM's kernel was flashed.
    Succeeded = 0,
    /// The daemon failed; details only in its log.
    Failed = 1,
    /// The stored kernel does not match its checksum.
    ChecksumInvalid = 2,
    /// No checksum is recorded for the ROM's kernel.
    ChecksumNotFound = 3,
}

impl TryFrom<i16> for SwitchRomCode {
    type Error = i16;

    fn try_from(code: i16) -> Result<Self, i16> {
        match code {
            0 => Ok(Self::Succeeded),
            1 => Ok(Self::Failed),
            2 => Ok(Self::ChecksumInvalid),
            3 => Ok(Self::ChecksumNotFound),
            other => Err(other),
        }
    }
}

/// Parts of a ROM that [`WipeRomRequest`] can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::exhaustive_enums)]
#[repr(i16)]
pub enum WipeTarget {
    /// `/system`.
    System = 1,
    /// `/cache`.
    Cache = 2,
    /// `/data`, excluding internal storage.
    Data = 3,
    /// `/data/dalvik-cache`.
    DalvikCache = 4,
    /// Multiboot metadata.
    Multiboot = 5,
}

impl WipeTarget {
    /// Wire code.
    pub const fn code(self) -> i16 {
        self as i16
    }

    /// Human-readable name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Cache => "cache",
            Self::Data => "data",
            Self::DalvikCache => "dalvik-cache",
            Self::Multiboot => "multiboot",
        }
    }
}

impl fmt::Display for WipeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WipeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "cache" => Ok(Self::Cache),
            "data" => Ok(Self::Data),
            "dalvik-cache" => Ok(Self::DalvikCache),
            "multiboot" => Ok(Self::Multiboot),
            _ => Err(format!("unknown wipe target: {s}")),
        }
    }
}

impl TryFrom<i16> for WipeTarget {
    type Error = i16;

    fn try_from(code: i16) -> Result<Self, i16> {
        match code {
            1 => Ok(Self::System),
            2 => Ok(Self::Cache),
            3 => Ok(Self::Data),
            4 => Ok(Self::DalvikCache),
            5 => Ok(Self::Multiboot),
            other => Err(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// One sample payload for every non-sentinel response tag.
    fn samples() -> Vec<Response> {
        let status = StatusResponse {
            success: true,
            error_msg: None,
        };
        let label = LabelResponse {
            success: true,
            label: Some("u:object_r:system_file:s0".into()),
            error_msg: None,
        };
        vec![
            Response::FileChmod(status.clone()),
            Response::FileClose(status.clone()),
            Response::FileOpen(FileOpenResponse {
                success: true,
                error_msg: None,
                id: 4,
            }),
            Response::FileRead(FileReadResponse {
                success: true,
                error_msg: None,
                data: b"abc".to_vec(),
            }),
            Response::FileSeek(FileSeekResponse::default()),
            Response::FileStat(FileStatResponse::default()),
            Response::FileWrite(FileWriteResponse::default()),
            Response::FileSELinuxGetLabel(label.clone()),
            Response::FileSELinuxSetLabel(status.clone()),
            Response::PathChmod(status.clone()),
            Response::PathCopy(status.clone()),
            Response::PathSELinuxGetLabel(label),
            Response::PathSELinuxSetLabel(status),
            Response::GetVersion(GetVersionResponse {
                version: Some("9.2.0".into()),
            }),
            Response::GetInstalledRoms(GetInstalledRomsResponse {
                roms: vec![RomEntry {
                    id: "primary".into(),
                    ..RomEntry::default()
                }],
            }),
            Response::GetBootedRomId(GetBootedRomIdResponse {
                rom_id: Some("dual".into()),
            }),
            Response::SwitchRom(SwitchRomResponse { result: 2 }),
            Response::SetKernel(SetKernelResponse { success: true }),
            Response::WipeRom(WipeRomResponse {
                succeeded: vec![1, 2],
                failed: vec![3],
            }),
            Response::Reboot(RebootResponse { success: false }),
        ]
    }

    #[test]
    fn decoder_table_covers_every_payload_tag() {
        let samples = samples();
        let payload_tags = ResponseType::ALL.iter().filter(|t| !t.is_sentinel()).count();
        assert_eq!(samples.len(), payload_tags);

        for resp in samples {
            let env = resp.to_envelope().unwrap();
            let ty = ResponseType::try_from(env.tag).unwrap();
            assert_eq!(ty, resp.response_type());
            let decoded = decode_response(ty, env.payload.as_deref().unwrap()).unwrap();
            assert_eq!(decoded, Some(resp));
        }
    }

    #[test]
    fn sentinels_have_no_payload() {
        for ty in [ResponseType::Unsupported, ResponseType::Invalid] {
            let env = ResponseEnvelope::sentinel(ty);
            assert!(env.payload.is_none());
            assert_eq!(decode_response(ty, &[]).unwrap(), None);
        }
    }

    #[test]
    fn every_request_pairs_with_its_own_response_tag() {
        for ty in RequestType::ALL {
            let resp = ty.response_type();
            assert!(!resp.is_sentinel());
            assert_eq!(ty as u8, resp as u8);
        }
    }

    #[test]
    fn request_envelope_decodes_back() {
        let req = Request::SwitchRom(SwitchRomRequest {
            rom_id: "dual".into(),
            boot_blockdev: "/dev/block/bootdevice/by-name/boot".into(),
            blockdev_base_dirs: vec!["/dev/block/bootdevice/by-name".into()],
            force_update_checksums: true,
        });
        let env = req.to_envelope().unwrap();
        let ty = RequestType::try_from(env.tag).unwrap();
        assert_eq!(decode_request(ty, &env.payload).unwrap(), req);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert_eq!(ResponseType::try_from(0), Err(0));
        assert_eq!(ResponseType::try_from(200), Err(200));
        assert_eq!(RequestType::try_from(3), Err(3));
    }

    #[test]
    fn truncated_payload_fails_to_decode() {
        let env = Response::PathCopy(StatusResponse {
            success: false,
            error_msg: Some("ENOENT".into()),
        })
        .to_envelope()
        .unwrap();
        let payload = env.payload.unwrap();
        assert!(decode_response(ResponseType::PathCopy, &payload[..2]).is_err());
    }

    #[test]
    fn domain_codes() {
        assert_eq!(SwitchRomCode::try_from(2), Ok(SwitchRomCode::ChecksumInvalid));
        assert_eq!(SwitchRomCode::try_from(9), Err(9));
        assert_eq!("Dalvik-Cache".parse::<WipeTarget>(), Ok(WipeTarget::DalvikCache));
        assert_eq!(WipeTarget::try_from(WipeTarget::Multiboot.code()), Ok(WipeTarget::Multiboot));
        assert!("boot".parse::<WipeTarget>().is_err());
    }
}
