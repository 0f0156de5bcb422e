//! Scripted daemon used by the unit tests.

#![allow(clippy::unwrap_used, clippy::missing_docs_in_private_items)]

use std::io::{self, BufReader, BufWriter, Read};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::thread::JoinHandle;
use std::time::Duration;

use mbctl_proto::{
    FileOpenResponse, FileReadResponse, FileSeekResponse, FileStatResponse, FileWriteResponse,
    GetBootedRomIdResponse, GetInstalledRomsResponse, GetVersionResponse, LabelResponse,
    RebootResponse, Request, RequestEnvelope, RequestType, Response, ResponseEnvelope,
    ResponseType, SetKernelResponse, StatusResponse, SwitchRomResponse, TOKEN_ALLOW, TOKEN_OK,
    WipeRomResponse,
};

/// A default-valued envelope for any response tag.
pub(crate) fn sample(ty: ResponseType) -> ResponseEnvelope {
    let resp = match ty {
        ResponseType::Unsupported | ResponseType::Invalid => {
            return ResponseEnvelope::sentinel(ty);
        }
        ResponseType::FileChmod => Response::FileChmod(StatusResponse::default()),
        ResponseType::FileClose => Response::FileClose(StatusResponse::default()),
        ResponseType::FileOpen => Response::FileOpen(FileOpenResponse::default()),
        ResponseType::FileRead => Response::FileRead(FileReadResponse::default()),
        ResponseType::FileSeek => Response::FileSeek(FileSeekResponse::default()),
        ResponseType::FileStat => Response::FileStat(FileStatResponse::default()),
        ResponseType::FileWrite => Response::FileWrite(FileWriteResponse::default()),
        ResponseType::FileSELinuxGetLabel => Response::FileSELinuxGetLabel(LabelResponse::default()),
        ResponseType::FileSELinuxSetLabel => {
            Response::FileSELinuxSetLabel(StatusResponse::default())
        }
        ResponseType::PathChmod => Response::PathChmod(StatusResponse::default()),
        ResponseType::PathCopy => Response::PathCopy(StatusResponse::default()),
        ResponseType::PathSELinuxGetLabel => Response::PathSELinuxGetLabel(LabelResponse::default()),
        ResponseType::PathSELinuxSetLabel => {
            Response::PathSELinuxSetLabel(StatusResponse::default())
        }
        ResponseType::GetVersion => Response::GetVersion(GetVersionResponse::default()),
        ResponseType::GetInstalledRoms => {
            Response::GetInstalledRoms(GetInstalledRomsResponse::default())
        }
        ResponseType::GetBootedRomId => Response::GetBootedRomId(GetBootedRomIdResponse::default()),
        ResponseType::SwitchRom => Response::SwitchRom(SwitchRomResponse::default()),
        ResponseType::SetKernel => Response::SetKernel(SetKernelResponse::default()),
        ResponseType::WipeRom => Response::WipeRom(WipeRomResponse::default()),
        ResponseType::Reboot => Response::Reboot(RebootResponse::default()),
    };
    resp.to_envelope().unwrap()
}

/// What the daemon says on one connection.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub greeting: String,
    pub interface_reply: String,
    pub version: Option<String>,
    /// Answers to the requests following the handshake, in order.
    pub replies: Vec<ResponseEnvelope>,
    /// Pause before each reply.
    pub delay: Duration,
}

impl Script {
    /// A daemon that completes the handshake reporting `version`.
    pub fn ready(version: &str) -> Self {
        Self {
            greeting: TOKEN_ALLOW.into(),
            interface_reply: TOKEN_OK.into(),
            version: Some(version.into()),
            replies: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// A daemon that sends `token` and hangs up.
    pub fn greeting(token: &str) -> Self {
        Self {
            greeting: token.into(),
            ..Self::ready("")
        }
    }

    pub fn reply(mut self, resp: Response) -> Self {
        self.replies.push(resp.to_envelope().unwrap());
        self
    }

    pub fn reply_raw(mut self, env: ResponseEnvelope) -> Self {
        self.replies.push(env);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn proceeds(&self) -> bool {
        self.greeting == TOKEN_ALLOW && self.interface_reply == TOKEN_OK
    }

    fn version_reply(&self) -> Response {
        Response::GetVersion(GetVersionResponse {
            version: self.version.clone(),
        })
    }
}

/// Everything the daemon would send for `script`, back to back.
pub(crate) fn daemon_bytes(script: &Script) -> Vec<u8> {
    let mut out = Vec::new();
    mbctl_proto::write_token(&mut out, &script.greeting).unwrap();
    if script.greeting != TOKEN_ALLOW {
        return out;
    }
    mbctl_proto::write_token(&mut out, &script.interface_reply).unwrap();
    if !script.proceeds() {
        return out;
    }
    mbctl_proto::send(&mut out, &script.version_reply().to_envelope().unwrap()).unwrap();
    for reply in &script.replies {
        mbctl_proto::send(&mut out, reply).unwrap();
    }
    out
}

/// What the daemon saw on one connection.
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    pub interface_version: Option<i32>,
    /// Requests received after the handshake.
    pub requests: Vec<Request>,
    /// Bytes received after the last scripted reply, until hang-up.
    pub trailing: Vec<u8>,
}

/// A daemon on a filesystem socket serving one [`Script`] per connection.
#[derive(Debug)]
pub(crate) struct FakeDaemon {
    handle: JoinHandle<Vec<Transcript>>,
}

impl FakeDaemon {
    /// Binds `path` now and serves `scripts` on a background thread.
    pub fn bind(path: &Path, scripts: Vec<Script>) -> Self {
        let listener = UnixListener::bind(path).unwrap();
        let handle = std::thread::spawn(move || {
            scripts
                .iter()
                .map(|script| {
                    let mut transcript = Transcript::default();
                    if let Ok((stream, _)) = listener.accept() {
                        let _ = serve(stream, script, &mut transcript);
                    }
                    transcript
                })
                .collect()
        });
        Self { handle }
    }

    /// Waits for every scripted connection to finish.
    pub fn join(self) -> Vec<Transcript> {
        self.handle.join().unwrap()
    }
}

fn serve(stream: UnixStream, script: &Script, t: &mut Transcript) -> io::Result<()> {
    let mut r = BufReader::new(stream.try_clone()?);
    let mut w = BufWriter::new(stream);

    mbctl_proto::write_token(&mut w, &script.greeting)?;
    if script.greeting != TOKEN_ALLOW {
        return Ok(());
    }
    t.interface_version = Some(mbctl_proto::read_i32(&mut r)?);
    mbctl_proto::write_token(&mut w, &script.interface_reply)?;
    if !script.proceeds() {
        return Ok(());
    }

    let version: RequestEnvelope = mbctl_proto::recv(&mut r)?;
    assert_eq!(version.tag, RequestType::GetVersion as u8);
    mbctl_proto::send(&mut w, &script.version_reply().to_envelope().unwrap())?;

    for reply in &script.replies {
        let env: RequestEnvelope = mbctl_proto::recv(&mut r)?;
        let ty = RequestType::try_from(env.tag).unwrap();
        t.requests.push(mbctl_proto::decode_request(ty, &env.payload).unwrap());
        std::thread::sleep(script.delay);
        mbctl_proto::send(&mut w, reply)?;
    }

    r.read_to_end(&mut t.trailing)?;
    Ok(())
}
