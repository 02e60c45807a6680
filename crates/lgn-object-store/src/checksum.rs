use std::{
    fmt,
    pin::Pin,
    str::FromStr,
    task::{Context, Poll},
};

use base64::Engine;
use pin_project::pin_project;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, ReadBuf};

/// Represents the SHA-256 checksum of an object's content.
#[derive(Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Computes the checksum of the specified data.
    pub fn new_from_data(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Return a byte array.
    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// The base64 representation, as expected by the `x-amz-checksum-sha256`
    /// header.
    pub fn to_base64(self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }
}

impl From<[u8; 32]> for Checksum {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", hex::encode(self.0))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Checksum {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out: [u8; 32] = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

/// An `AsyncRead` adapter that feeds everything read through it into a
/// SHA-256 hasher.
///
/// The checksum is only meaningful once the inner reader reached EOF.
#[pin_project]
pub(crate) struct HashingReader<R> {
    #[pin]
    inner: R,
    hasher: Sha256,
}

impl<R: AsyncRead> HashingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub(crate) fn finalize(self) -> Checksum {
        Checksum(self.hasher.finalize().into())
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();

        match this.inner.poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.hasher.update(&buf.filled()[before..]);

                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
