//! Wire protocol for talking to the mbtool daemon.
//!
//! The daemon listens on an abstract Unix socket. After a short text-token
//! handshake, every call is a postcard-encoded [`RequestEnvelope`] answered
//! by one [`ResponseEnvelope`], each carried in a 4-byte big-endian
//! length-prefixed frame.

mod codec;
mod message;

pub use codec::{MAX_FRAME, read_frame, read_i32, read_token, recv, send, write_frame, write_i32, write_token};
pub use message::{
    FileOpenResponse, FileReadResponse, FileSeekResponse, FileStatResponse, FileWriteResponse,
    GetBootedRomIdRequest, GetBootedRomIdResponse, GetInstalledRomsRequest,
    GetInstalledRomsResponse, GetVersionRequest, GetVersionResponse, INTERFACE_VERSION,
    LabelResponse, PathChmodRequest, PathCopyRequest, PathSELinuxGetLabelRequest,
    PathSELinuxSetLabelRequest, RebootRequest, RebootResponse, Request, RequestEnvelope,
    RequestType, Response, ResponseEnvelope, ResponseType, RomEntry, SOCKET_NAME,
    SetKernelRequest, SetKernelResponse, StatusResponse, SwitchRomCode, SwitchRomRequest,
    SwitchRomResponse, TOKEN_ALLOW, TOKEN_DENY, TOKEN_OK, TOKEN_UNSUPPORTED, WipeRomRequest,
    WipeRomResponse, WipeTarget, decode_request, decode_response,
};
