//! Generic request/response engine.
//!
//! An [`Operation`] pairs one request payload with the single response
//! variant allowed to answer it. [`execute`] runs any operation over a
//! reader/writer pair: it writes one envelope, reads one envelope, checks
//! the tag and decodes the payload through the protocol's decoder table.

use std::io::{self, Read, Write};

use mbctl_proto::{
    GetBootedRomIdRequest, GetBootedRomIdResponse, GetInstalledRomsRequest,
    GetInstalledRomsResponse, GetVersionRequest, GetVersionResponse, LabelResponse,
    PathChmodRequest, PathCopyRequest, PathSELinuxGetLabelRequest, PathSELinuxSetLabelRequest,
    RebootRequest, RebootResponse, Request, Response, ResponseEnvelope, ResponseType,
    SetKernelRequest, SetKernelResponse, StatusResponse, SwitchRomRequest, SwitchRomResponse,
    WipeRomRequest, WipeRomResponse,
};
use tracing::debug;

use crate::context;
use crate::error::{Error, Result};

/// One daemon capability: a request and its expected response.
pub trait Operation {
    /// Decoded payload of the expected response.
    type Output;

    /// Name used in logs and error messages.
    const NAME: &'static str;

    /// The only response tag accepted for this request.
    const EXPECTED: ResponseType;

    /// Wraps the payload in the request enum.
    fn into_request(self) -> Request;

    /// Extracts the payload from the decoded response.
    ///
    /// Returns `None` if `resp` is not the expected variant.
    fn output(resp: Response) -> Option<Self::Output>;
}

/// Implements [`Operation`] for each `request => Variant(response)` pair.
macro_rules! operations {
    ($($req:ty => $variant:ident($resp:ty)),* $(,)?) => {$(
        impl Operation for $req {
            type Output = $resp;
            const NAME: &'static str = stringify!($variant);
            const EXPECTED: ResponseType = ResponseType::$variant;

            fn into_request(self) -> Request {
                Request::$variant(self)
            }

            fn output(resp: Response) -> Option<$resp> {
                match resp {
                    Response::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }
    )*};
}

operations! {
    GetVersionRequest => GetVersion(GetVersionResponse),
    GetInstalledRomsRequest => GetInstalledRoms(GetInstalledRomsResponse),
    GetBootedRomIdRequest => GetBootedRomId(GetBootedRomIdResponse),
    SwitchRomRequest => SwitchRom(SwitchRomResponse),
    SetKernelRequest => SetKernel(SetKernelResponse),
    RebootRequest => Reboot(RebootResponse),
    PathCopyRequest => PathCopy(StatusResponse),
    PathChmodRequest => PathChmod(StatusResponse),
    WipeRomRequest => WipeRom(WipeRomResponse),
    PathSELinuxGetLabelRequest => PathSELinuxGetLabel(LabelResponse),
    PathSELinuxSetLabelRequest => PathSELinuxSetLabel(StatusResponse),
}

/// Runs `op` over the given stream halves.
///
/// Fails with [`Error::ThreadingViolation`] before writing anything when
/// called from the dispatch context. The caller owns teardown on error.
pub fn execute<O: Operation>(r: &mut impl Read, w: &mut impl Write, op: O) -> Result<O::Output> {
    context::ensure_blocking_allowed(O::NAME)?;

    let envelope = op
        .into_request()
        .to_envelope()
        .map_err(|e| Error::transport(O::NAME)(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    debug!(op = O::NAME, tag = envelope.tag, len = envelope.payload.len(), "sending request");
    mbctl_proto::send(w, &envelope).map_err(Error::transport(O::NAME))?;

    let reply: ResponseEnvelope = mbctl_proto::recv(r).map_err(Error::transport(O::NAME))?;
    debug!(op = O::NAME, tag = reply.tag, "received response");

    match ResponseType::try_from(reply.tag) {
        Ok(ResponseType::Unsupported) => return Err(Error::CommandUnsupported { op: O::NAME }),
        Ok(ResponseType::Invalid) => return Err(Error::CommandInvalid { op: O::NAME }),
        Ok(ty) if ty == O::EXPECTED => {}
        _ => {
            return Err(Error::UnexpectedResponseType {
                op: O::NAME,
                expected: O::EXPECTED,
                got: reply.tag,
            });
        }
    }

    let malformed = |reason: String| Error::MalformedUnion {
        op: O::NAME,
        expected: O::EXPECTED,
        reason,
    };
    let payload = reply
        .payload
        .ok_or_else(|| malformed("response carries no payload".into()))?;
    mbctl_proto::decode_response(O::EXPECTED, &payload)
        .map_err(|e| malformed(e.to_string()))?
        .and_then(O::output)
        .ok_or_else(|| malformed("payload does not match the response tag".into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::io::Cursor;

    use mbctl_proto::{RequestEnvelope, RequestType};

    use super::*;
    use crate::context::DispatchContext;
    use crate::testutil::sample;

    /// Runs `op` against a canned daemon reply; returns the result and the
    /// bytes the client wrote.
    fn run<O: Operation>(op: O, reply: &ResponseEnvelope) -> (Result<O::Output>, Vec<u8>) {
        let mut daemon = Vec::new();
        mbctl_proto::send(&mut daemon, reply).unwrap();
        let mut r = Cursor::new(daemon);
        let mut w = Vec::new();
        let result = execute(&mut r, &mut w, op);
        (result, w)
    }

    /// Runs the default request of type `ty` against `reply`.
    fn exchange(ty: RequestType, reply: &ResponseEnvelope) -> Result<()> {
        match ty {
            RequestType::PathChmod => run(PathChmodRequest::default(), reply).0.map(drop),
            RequestType::PathCopy => run(PathCopyRequest::default(), reply).0.map(drop),
            RequestType::PathSELinuxGetLabel => {
                run(PathSELinuxGetLabelRequest::default(), reply).0.map(drop)
            }
            RequestType::PathSELinuxSetLabel => {
                run(PathSELinuxSetLabelRequest::default(), reply).0.map(drop)
            }
            RequestType::GetVersion => run(GetVersionRequest, reply).0.map(drop),
            RequestType::GetInstalledRoms => run(GetInstalledRomsRequest, reply).0.map(drop),
            RequestType::GetBootedRomId => run(GetBootedRomIdRequest, reply).0.map(drop),
            RequestType::SwitchRom => run(SwitchRomRequest::default(), reply).0.map(drop),
            RequestType::SetKernel => run(SetKernelRequest::default(), reply).0.map(drop),
            RequestType::WipeRom => run(WipeRomRequest::default(), reply).0.map(drop),
            RequestType::Reboot => run(RebootRequest::default(), reply).0.map(drop),
        }
    }

    #[test]
    fn every_request_accepts_only_its_paired_response() {
        for req in RequestType::ALL {
            for ty in ResponseType::ALL.into_iter().filter(|t| !t.is_sentinel()) {
                let result = exchange(req, &sample(ty));
                if ty == req.response_type() {
                    assert!(result.is_ok(), "{req:?} rejected {ty:?}: {result:?}");
                } else {
                    match result {
                        Err(Error::UnexpectedResponseType { expected, got, .. }) => {
                            assert_eq!(expected, req.response_type());
                            assert_eq!(got, ty as u8);
                        }
                        other => panic!("{req:?} answered by {ty:?} gave {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn sentinels_map_to_command_errors() {
        let (r, _) = run(GetVersionRequest, &ResponseEnvelope::sentinel(ResponseType::Unsupported));
        assert!(matches!(r, Err(Error::CommandUnsupported { op: "GetVersion" })));

        let (r, _) = run(RebootRequest::default(), &ResponseEnvelope::sentinel(ResponseType::Invalid));
        assert!(matches!(r, Err(Error::CommandInvalid { op: "Reboot" })));
    }

    #[test]
    fn unknown_tag_is_unexpected_response() {
        let reply = ResponseEnvelope {
            tag: 0xee,
            payload: Some(vec![1]),
        };
        let (r, _) = run(GetVersionRequest, &reply);
        assert!(matches!(r, Err(Error::UnexpectedResponseType { got: 0xee, .. })));
    }

    #[test]
    fn matching_tag_without_payload_is_malformed() {
        let reply = ResponseEnvelope::sentinel(ResponseType::SwitchRom);
        let (r, _) = run(SwitchRomRequest::default(), &reply);
        assert!(matches!(
            r,
            Err(Error::MalformedUnion {
                expected: ResponseType::SwitchRom,
                ..
            })
        ));
    }

    #[test]
    fn matching_tag_with_garbage_payload_is_malformed() {
        let reply = ResponseEnvelope {
            tag: ResponseType::PathCopy as u8,
            // bool out of range
            payload: Some(vec![7]),
        };
        let (r, _) = run(PathCopyRequest::default(), &reply);
        assert!(matches!(r, Err(Error::MalformedUnion { .. })));
    }

    #[test]
    fn writes_one_tagged_envelope() {
        let req = PathChmodRequest {
            path: "/data/local/tmp/x".into(),
            mode: 0o644,
        };
        let (r, written) = run(req.clone(), &sample(ResponseType::PathChmod));
        assert!(r.is_ok());

        let env: RequestEnvelope = mbctl_proto::recv(&mut Cursor::new(&written)).unwrap();
        assert_eq!(env.tag, RequestType::PathChmod as u8);
        let decoded = mbctl_proto::decode_request(RequestType::PathChmod, &env.payload).unwrap();
        assert_eq!(decoded, Request::PathChmod(req));
    }

    #[test]
    fn truncated_response_is_transport_error() {
        let mut daemon = Vec::new();
        mbctl_proto::send(&mut daemon, &sample(ResponseType::GetVersion)).unwrap();
        daemon.truncate(3);
        let mut w = Vec::new();
        let r = execute(&mut Cursor::new(daemon), &mut w, GetVersionRequest);
        match r {
            Err(Error::Transport { op, source }) => {
                assert_eq!(op, "GetVersion");
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn refuses_dispatch_context_before_writing() {
        let _guard = DispatchContext::enter();
        let (r, written) = run(GetVersionRequest, &sample(ResponseType::GetVersion));
        assert!(matches!(r, Err(Error::ThreadingViolation { op: "GetVersion" })));
        assert!(written.is_empty());
    }
}
