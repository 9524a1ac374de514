#![doc = r#"
Server-Sent Events client: frames an HTTP response body, decodes each frame
into an [`Event`], and streams events to a consumer over channels.

| Piece | Role |
| --- | --- |
| `FrameSegmenter` / `FrameReader` | split the body at blank lines (`CRLF CRLF`, `LF LF`, `CR CR`) |
| `decode` | turn one frame into an `Event` |
| `EventStreamClient` | run one task per stream; `start` opens, `stop` cancels |
| `HttpTransport` | perform the request; `ReqwestTransport` is the default |

Implementation notes:
- A graceful end of the body is reported as `StreamError::StreamClosed`; nothing reconnects.
- `retry` fields are recognized but not applied.
- Within one frame only the last `data` line is kept.
"#]

pub mod errors;
pub mod event;
mod registry;
pub mod segmenter;
pub mod session;
pub mod testing;
pub mod transport;

pub use errors::{DecodeError, StreamError, TransportError};
pub use event::{Event, decode};
pub use registry::SessionId;
pub use segmenter::{DEFAULT_MAX_FRAME_LEN, FrameReader, FrameSegmenter};
pub use session::{ClientConfig, EventStream, EventStreamClient};
pub use testing::{MockChunk, MockTransport};
pub use transport::{
    ByteStream, DEFAULT_CONNECT_TIMEOUT, EVENT_STREAM_MIME, HttpTransport, ReqwestTransport,
    StreamRequest, TransportConfig, TransportResponse,
};
