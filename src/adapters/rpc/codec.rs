use crate::ports::transformer::RpcError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

const TAG_END: u8 = 0x00;
const TAG_CHUNK: u8 = 0x01;
const TAG_ERROR: u8 = 0x02;

pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

pub fn transport(stream: TcpStream, max_frame_length: usize) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_length)
        .new_framed(stream)
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Chunk(Bytes),
    End,
    Error(String),
}

impl Frame {
    pub fn decode(mut raw: BytesMut) -> Result<Frame, RpcError> {
        if !raw.has_remaining() {
            return Err(RpcError::Protocol("empty frame".to_string()));
        }
        match raw.get_u8() {
            TAG_CHUNK => Ok(Frame::Chunk(raw.freeze())),
            TAG_END => Ok(Frame::End),
            TAG_ERROR => Ok(Frame::Error(String::from_utf8_lossy(&raw).into_owned())),
            tag => Err(RpcError::Protocol(format!("unknown frame tag {tag:#04x}"))),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        match self {
            Frame::Chunk(payload) => {
                out.reserve(payload.len() + 1);
                out.put_u8(TAG_CHUNK);
                out.put_slice(payload);
            }
            Frame::End => out.put_u8(TAG_END),
            Frame::Error(message) => {
                out.put_u8(TAG_ERROR);
                out.put_slice(message.as_bytes());
            }
        }
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tags() {
        let chunk = Frame::decode(BytesMut::from(&b"\x01abc"[..])).unwrap();
        assert_eq!(chunk, Frame::Chunk(Bytes::from_static(b"abc")));
        assert_eq!(Frame::decode(BytesMut::from(&b"\x00"[..])).unwrap(), Frame::End);
        assert_eq!(
            Frame::decode(BytesMut::from(&b"\x02no such filter"[..])).unwrap(),
            Frame::Error("no such filter".to_string())
        );
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(matches!(
            Frame::decode(BytesMut::new()),
            Err(RpcError::Protocol(_))
        ));
        assert!(matches!(
            Frame::decode(BytesMut::from(&b"\x7fxx"[..])),
            Err(RpcError::Protocol(msg)) if msg.contains("0x7f")
        ));
    }

    #[test]
    fn test_encode_prefixes_tag() {
        assert_eq!(&Frame::Chunk(Bytes::from_static(b"hi")).encode()[..], b"\x01hi");
        assert_eq!(&Frame::End.encode()[..], b"\x00");
    }
}
