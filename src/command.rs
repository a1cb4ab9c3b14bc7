//! Structured requests from the serial adapter and their dispatch.
//!
//! The adapter turns a line of input into a [`Request`] (with the `serde`
//! feature, straight from `{"type": "ADD_PASSWORD", "slot": 0, ...}`), hands
//! it to [`dispatch`] and reports the [`Response`] back over its transport.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::DEFAULT_AUTO_LOCK_TIMEOUT_S;
use crate::crypto::BoardIdentity;
use crate::device::{DeviceController, DeviceError, DeviceStatus};
use crate::entropy::EntropySource;
use crate::platform::Clock;
use crate::storage::{BusLock, StorageRegion};

/// One command from the host. Credentials are wiped when it drops.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum Request {
    Ping,
    GetId,
    Unlock {
        #[cfg_attr(feature = "serde", serde(default))]
        password: Option<String>,
    },
    Lock,
    Status,
    AddPassword { slot: usize, password: String },
    DeletePassword { slot: usize },
    TypePassword { slot: usize },
    SetTimeout {
        #[cfg_attr(feature = "serde", serde(default = "default_timeout"))]
        timeout: u32,
    },
}

#[cfg(feature = "serde")]
fn default_timeout() -> u32 {
    DEFAULT_AUTO_LOCK_TIMEOUT_S
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "PING",
            Request::GetId => "GET_ID",
            Request::Unlock { .. } => "UNLOCK",
            Request::Lock => "LOCK",
            Request::Status => "STATUS",
            Request::AddPassword { .. } => "ADD_PASSWORD",
            Request::DeletePassword { .. } => "DELETE_PASSWORD",
            Request::TypePassword { .. } => "TYPE_PASSWORD",
            Request::SetTimeout { .. } => "SET_TIMEOUT",
        }
    }

    /// `SET_TIMEOUT` with the stock timeout, as sent by hosts that omit it.
    pub fn default_set_timeout() -> Self {
        Request::SetTimeout {
            timeout: DEFAULT_AUTO_LOCK_TIMEOUT_S,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::AddPassword { slot, .. } => write!(f, "AddPassword {{ slot: {slot}, .. }}"),
            Request::DeletePassword { slot } => write!(f, "DeletePassword {{ slot: {slot} }}"),
            Request::TypePassword { slot } => write!(f, "TypePassword {{ slot: {slot} }}"),
            Request::SetTimeout { timeout } => write!(f, "SetTimeout {{ timeout: {timeout} }}"),
            other => f.write_str(other.name()),
        }
    }
}

/// What the adapter reports back.
#[derive(Clone, PartialEq, Eq)]
pub enum Response {
    Pong { version: &'static str },
    Identity { board_id: BoardIdentity, version: &'static str },
    Ok,
    Status(DeviceStatus),
    TimeoutSet(u32),
    /// Plaintext for the keyboard adapter to type. Zeroed on drop.
    Typed(Zeroizing<Vec<u8>>),
    Error(DeviceError),
}

impl Response {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Response::Error(_))
    }
}

impl From<Result<(), DeviceError>> for Response {
    fn from(result: Result<(), DeviceError>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(err) => Response::Error(err),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Pong { version } => write!(f, "Pong({version})"),
            Response::Identity { board_id, version } => write!(f, "Identity({board_id}, {version})"),
            Response::Ok => f.write_str("Ok"),
            Response::Status(status) => write!(f, "Status({status:?})"),
            Response::TimeoutSet(timeout) => write!(f, "TimeoutSet({timeout})"),
            Response::Typed(_) => f.write_str("Typed([REDACTED])"),
            Response::Error(err) => write!(f, "Error({err})"),
        }
    }
}

/// Runs `request` against the controller.
pub fn dispatch<R, L, E, C>(device: &mut DeviceController<R, L, E, C>, request: &Request) -> Response
where
    R: StorageRegion,
    L: BusLock,
    E: EntropySource,
    C: Clock,
{
    log::debug!("dispatching {:?}", request);

    let response = match request {
        Request::Ping => Response::Pong {
            version: device.version(),
        },
        Request::GetId => Response::Identity {
            board_id: *device.board_identity(),
            version: device.version(),
        },
        Request::Unlock { password } => device.unlock(password.as_deref()).into(),
        Request::Lock => {
            device.lock();
            Response::Ok
        }
        Request::Status => Response::Status(device.status()),
        Request::AddPassword { slot, password } => device.add_password(*slot, password).into(),
        Request::DeletePassword { slot } => device.delete_password(*slot).into(),
        Request::TypePassword { slot } => match device.type_password(*slot) {
            Ok(plaintext) => Response::Typed(plaintext),
            Err(err) => Response::Error(err),
        },
        Request::SetTimeout { timeout } => match device.set_auto_lock_timeout(*timeout) {
            Ok(()) => Response::TimeoutSet(*timeout),
            Err(err) => Response::Error(err),
        },
    };

    if let Response::Error(err) = &response {
        log::warn!("{} failed: {err}", request.name());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RamRegion;
    use crate::test_support::{board, build};
    use crate::VERSION;
    use alloc::string::ToString;
    use alloc::format;

    fn add(slot: usize, password: &str) -> Request {
        Request::AddPassword {
            slot,
            password: password.to_string(),
        }
    }

    fn unlock(password: &str) -> Request {
        Request::Unlock {
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_ping_and_identity() {
        let (mut dev, _) = build(RamRegion::new(4096, 256));
        assert_eq!(dispatch(&mut dev, &Request::Ping), Response::Pong { version: VERSION });
        assert_eq!(
            dispatch(&mut dev, &Request::GetId),
            Response::Identity {
                board_id: board(),
                version: VERSION
            }
        );
    }

    #[test]
    fn test_session() {
        let (mut dev, _) = build(RamRegion::new(4096, 256));

        assert_eq!(
            dispatch(&mut dev, &Request::Unlock { password: None }),
            Response::Error(DeviceError::CredentialRequired)
        );
        assert_eq!(dispatch(&mut dev, &unlock("alpha")), Response::Ok);
        assert_eq!(dispatch(&mut dev, &add(2, "hunter2")), Response::Ok);

        match dispatch(&mut dev, &Request::Status) {
            Response::Status(status) => {
                assert!(status.unlocked);
                assert_eq!(status.slots, [false, false, true, false]);
                assert_eq!(status.auto_lock_timeout_s, 120);
            }
            other => panic!("unexpected {other:?}"),
        }

        match dispatch(&mut dev, &Request::TypePassword { slot: 2 }) {
            Response::Typed(plaintext) => assert_eq!(&plaintext[..], b"hunter2"),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(dispatch(&mut dev, &Request::DeletePassword { slot: 2 }), Response::Ok);
        assert_eq!(
            dispatch(&mut dev, &Request::TypePassword { slot: 2 }),
            Response::Error(DeviceError::SlotEmpty)
        );

        assert_eq!(dispatch(&mut dev, &Request::Lock), Response::Ok);
        assert_eq!(
            dispatch(&mut dev, &add(0, "x")),
            Response::Error(DeviceError::DeviceLocked)
        );
    }

    #[test]
    fn test_set_timeout_echoes_value() {
        let (mut dev, _) = build(RamRegion::new(4096, 256));
        assert_eq!(
            dispatch(&mut dev, &Request::SetTimeout { timeout: 30 }),
            Response::TimeoutSet(30)
        );
        assert_eq!(dev.status().auto_lock_timeout_s, 30);
        assert_eq!(
            dispatch(&mut dev, &Request::default_set_timeout()),
            Response::TimeoutSet(DEFAULT_AUTO_LOCK_TIMEOUT_S)
        );
    }

    #[test]
    fn test_invalid_slot() {
        let (mut dev, _) = build(RamRegion::new(4096, 256));
        dispatch(&mut dev, &unlock("alpha"));
        let response = dispatch(&mut dev, &Request::DeletePassword { slot: 4 });
        assert!(!response.is_ok());
        assert_eq!(response, Response::Error(DeviceError::InvalidSlot));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let request = add(0, "hunter2");
        assert!(!format!("{request:?}").contains("hunter2"));
        assert!(!format!("{:?}", unlock("alpha")).contains("alpha"));

        let response = Response::Typed(Zeroizing::new(b"hunter2".to_vec()));
        assert!(!format!("{response:?}").contains("hunter2"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_request_json_shape() {
        let parse = |line: &str| serde_json::from_str::<Request>(line).unwrap();

        assert_eq!(parse(r#"{"type":"PING"}"#), Request::Ping);
        assert_eq!(parse(r#"{"type":"GET_ID"}"#), Request::GetId);
        assert_eq!(parse(r#"{"type":"UNLOCK"}"#), Request::Unlock { password: None });
        assert_eq!(parse(r#"{"type":"UNLOCK","password":"alpha"}"#), unlock("alpha"));
        assert_eq!(parse(r#"{"type":"ADD_PASSWORD","slot":1,"password":"pw"}"#), add(1, "pw"));
        assert_eq!(
            parse(r#"{"type":"TYPE_PASSWORD","slot":3}"#),
            Request::TypePassword { slot: 3 }
        );
        assert_eq!(parse(r#"{"type":"SET_TIMEOUT"}"#), Request::default_set_timeout());

        assert!(serde_json::from_str::<Request>(r#"{"type":"REBOOT"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"type":"DELETE_PASSWORD","slot":-1}"#).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_status_json_shape() {
        let (dev, _) = build(RamRegion::new(4096, 256));
        let json = serde_json::to_string(&dev.status()).unwrap();
        assert_eq!(json, r#"{"unlocked":false,"slots":[false,false,false,false],"timeout":120}"#);
    }
}
