use std::{
    io::Cursor,
    sync::{
        Arc, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageReader, imageops::FilterType};

use crate::error::Error;

/// Revocable handle over the raw bytes of a single fetched frame
///
/// Clones share the same bytes. Once the owning poller releases the resource every clone stops
/// handing out its bytes, so a surface can never render a superseded frame.
#[derive(Clone)]
pub struct DisplayResource {
    inner: Arc<Inner>,
}

struct Inner {
    bytes: RwLock<Option<Bytes>>,
    sequence: u64,
    format: ImageFormat,
    width: u32,
    height: u32,
    live: Arc<AtomicUsize>,
}

impl DisplayResource {
    /// wrap a fetched payload into a resource without counting it against any poller
    pub fn new(bytes: Bytes, sequence: u64) -> Result<Self, Error> {
        Self::tracked(bytes, sequence, Arc::new(AtomicUsize::new(0)))
    }

    /// wrap a payload and account for it in `live` until it is released
    pub(crate) fn tracked(bytes: Bytes, sequence: u64, live: Arc<AtomicUsize>) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::Decode(String::from("payload is empty")));
        }

        let reader = ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .map_err(|err| Error::Decode(format!("unable to read payload: {err}")))?;
        let Some(format) = reader.format() else {
            return Err(Error::Decode(String::from("payload has no recognizable image format")));
        };
        let (width, height) =
            reader.into_dimensions().map_err(|err| Error::Decode(format!("unable to read {format:?} header: {err}")))?;

        live.fetch_add(1, Ordering::SeqCst);
        let inner = Inner { bytes: RwLock::new(Some(bytes)), sequence, format, width, height, live };
        Ok(Self { inner: Arc::new(inner) })
    }

    /// raw image bytes, `None` once the resource was released
    pub fn bytes(&self) -> Option<Bytes> {
        self.inner.bytes.read().expect("lock should not be poisoned").clone()
    }

    pub fn is_released(&self) -> bool {
        self.inner.bytes.read().expect("lock should not be poisoned").is_none()
    }

    /// revoke the bytes for every clone of this resource
    ///
    /// releasing an already released resource does nothing
    pub fn release(&self) {
        let mut bytes = self.inner.bytes.write().expect("lock should not be poisoned");
        if bytes.take().is_some() {
            self.inner.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// sequence number of the request which fetched this frame
    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    pub fn format(&self) -> ImageFormat {
        self.inner.format
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.inner.width as f64 / self.inner.height.max(1) as f64
    }

    /// decode the frame into pixels
    pub fn decode(&self) -> Result<DynamicImage, Error> {
        let Some(bytes) = self.bytes() else {
            return Err(Error::Decode(format!("frame {} was already released", self.inner.sequence)));
        };
        image::load_from_memory_with_format(&bytes, self.inner.format)
            .map_err(|err| Error::Decode(format!("unable to decode frame {}: {err}", self.inner.sequence)))
    }

    /// decode the frame and downscale it such that the bigger of the two dimensions is at most `size` long
    pub fn decode_to_fit(&self, size: u32) -> Result<DynamicImage, Error> {
        let image = self.decode()?;
        if image.width().max(image.height()) > size {
            Ok(image.resize(size, size, FilterType::Triangle))
        } else {
            Ok(image)
        }
    }

    /// whether both handles point at the same fetched frame
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let bytes = self.bytes.get_mut().map(|bytes| bytes.take()).unwrap_or_else(|err| err.into_inner().take());
        if bytes.is_some() {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for DisplayResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayResource")
            .field("sequence", &self.inner.sequence)
            .field("format", &self.inner.format)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("released", &self.is_released())
            .finish()
    }
}
