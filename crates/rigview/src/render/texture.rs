use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    fs,
    io::{self, Cursor},
    path::PathBuf,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use image::{ImageError, ImageReader};
use log::{info, warn};

/// Decoded RGBA8 texture, rows bottom to top as GL expects them. Backends
/// sample it with nearest filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum TextureError {
    Io(io::Error),
    Image(ImageError),
    /// The decode thread went away without a result.
    Disconnected,
}

impl Display for TextureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::Io(err) => Display::fmt(&err, f),
            TextureError::Image(err) => Display::fmt(&err, f),
            TextureError::Disconnected => write!(f, "Texture decoder stopped"),
        }
    }
}

impl Error for TextureError {}

impl From<io::Error> for TextureError {
    fn from(value: io::Error) -> Self {
        TextureError::Io(value)
    }
}

impl From<ImageError> for TextureError {
    fn from(value: ImageError) -> Self {
        TextureError::Image(value)
    }
}

impl TextureImage {
    pub fn decode(buffer: &[u8]) -> Result<Self, TextureError> {
        let reader = ImageReader::new(Cursor::new(buffer));
        let image = reader.with_guessed_format()?.decode()?.flipv().into_rgba8();
        Ok(Self {
            width: image.width(),
            height: image.height(),
            data: image.into_vec(),
        })
    }
}

#[derive(Debug)]
enum LoadState {
    Pending(Receiver<Result<TextureImage, TextureError>>),
    Done,
}

/// Decodes one texture on a background thread.
///
/// [`TextureLoader::poll`] hands the image out exactly once. A failed load
/// is logged and the loader stays done without an image.
#[derive(Debug)]
pub struct TextureLoader {
    state: LoadState,
}

impl TextureLoader {
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = fs::read(&path)
                .map_err(TextureError::from)
                .and_then(|buffer| TextureImage::decode(&buffer));
            if let Ok(image) = &result {
                info!(
                    "Texture {} decoded, {}x{}",
                    path.display(),
                    image.width,
                    image.height
                );
            }
            let _ = tx.send(result);
        });
        Self {
            state: LoadState::Pending(rx),
        }
    }

    /// A loader that already finished with `image`.
    pub fn ready(image: TextureImage) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(Ok(image));
        Self {
            state: LoadState::Pending(rx),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, LoadState::Done)
    }

    pub fn poll(&mut self) -> Option<TextureImage> {
        let LoadState::Pending(rx) = &self.state else {
            return None;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(TextureError::Disconnected),
        };
        self.state = LoadState::Done;
        match result {
            Ok(image) => Some(image),
            Err(err) => {
                warn!("Failed to load texture: {}", err);
                None
            }
        }
    }
}
