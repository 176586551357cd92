//! Wire frames for [`SocketTransport`](crate::SocketTransport).
//!
//! Every frame is a postcard-encoded enum behind a 4-byte big-endian length
//! prefix. Calls are multiplexed over one connection by a client-chosen id;
//! a search answers with any number of `Chunk` frames and then exactly one
//! of `SearchDone` or `Failed`.
//!
//! Searches are flow controlled per call. `Search` opens a window of
//! `window` chunks; the server sends no more chunks than the window allows
//! and the client re-opens it with `Credit` as the consumer takes chunks.
//! `SearchDone` and `Failed` are not counted against the window.
//!
//! | client → server | server → client                     |
//! |-----------------|-------------------------------------|
//! | `Scan`          | `ScanDone` or `Failed`              |
//! | `Exists`        | `Exists` or `Failed`                |
//! | `Search`        | `Chunk`* then `SearchDone`/`Failed` |
//! | `Credit`        | nothing; allows more `Chunk` frames  |
//! | `Cancel`        | nothing; later frames for the id are dropped |

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::codec::LengthDelimitedCodec;

use crate::transport::SearchRequest;

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientFrame {
    Scan { id: u64, path: String },
    Exists { id: u64, path: String },
    Search { id: u64, request: SearchRequest, window: u32 },
    /// The consumer took `chunks` chunks of search `id`.
    Credit { id: u64, chunks: u32 },
    Cancel { id: u64 },
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerFrame {
    ScanDone { id: u64 },
    Exists { id: u64, value: bool },
    /// Zero or more whole records.
    Chunk { id: u64, data: Bytes },
    SearchDone { id: u64 },
    Failed { id: u64, message: String },
}

impl ClientFrame {
    pub fn id(&self) -> u64 {
        match self {
            ClientFrame::Scan { id, .. }
            | ClientFrame::Exists { id, .. }
            | ClientFrame::Search { id, .. }
            | ClientFrame::Credit { id, .. }
            | ClientFrame::Cancel { id } => *id,
        }
    }
}

impl ServerFrame {
    pub fn id(&self) -> u64 {
        match self {
            ServerFrame::ScanDone { id }
            | ServerFrame::Exists { id, .. }
            | ServerFrame::Chunk { id, .. }
            | ServerFrame::SearchDone { id }
            | ServerFrame::Failed { id, .. } => *id,
        }
    }
}

/// Serialize a frame body.
pub fn encode_frame<T: Serialize>(frame: &T) -> Result<Bytes, postcard::Error> {
    postcard::to_allocvec(frame).map(Bytes::from)
}

/// Deserialize a frame body.
pub fn decode_frame<T: DeserializeOwned>(body: &[u8]) -> Result<T, postcard::Error> {
    postcard::from_bytes(body)
}

/// Length-prefix codec shared by both ends of a connection.
pub fn frame_codec(max_frame_len: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_frame_len)
        .new_codec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use fdev_types::{FileEntry, encode_all};
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn test_search_frame() {
        let frame = ClientFrame::Search {
            id: 7,
            request: SearchRequest {
                path: "x64".into(),
                pattern: "*.rpf".into(),
                recurse: true,
                include_flags: 0xF,
            },
            window: 2,
        };
        let body = encode_frame(&frame).unwrap();
        let back: ClientFrame = decode_frame(&body).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.id(), 7);
    }

    #[test]
    fn test_chunk_frame_carries_records_untouched() {
        let records = encode_all(&[FileEntry::file("a", 1), FileEntry::directory("b")]).unwrap();
        let frame = ServerFrame::Chunk { id: 3, data: Bytes::from(records.clone()) };
        let back: ServerFrame = decode_frame(&encode_frame(&frame).unwrap()).unwrap();
        match back {
            ServerFrame::Chunk { id, data } => {
                assert_eq!(id, 3);
                assert_eq!(&data[..], &records[..]);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_garbage_body() {
        assert!(decode_frame::<ServerFrame>(&[0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_codec_rejects_oversized_frame() {
        let mut codec = frame_codec(8);
        let mut buf = BytesMut::new();
        assert!(codec.encode(Bytes::from_static(&[0u8; 9]), &mut buf).is_err());

        buf.clear();
        buf.extend_from_slice(&16u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
