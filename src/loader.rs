//! Image loading
//!
//! Files come from a [`FileSource`]. `load_image` decodes on the calling
//! thread. [`AsyncImageLoader`] decodes on worker threads, at most four at a
//! time, and hands each result back through an [`ImageRequest`] that the
//! draw thread can poll without blocking.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use flate2::read::GzDecoder;
use log::{debug, error};

use crate::error::{ImageError, ImageResult};
use crate::image::{decode, PixelBuffer};

/// Loads allowed to decode at the same time
pub const MAX_CONCURRENT_LOADS: usize = 4;

// ============================================================================
// Sources
// ============================================================================

/// Where named resources come from
pub trait FileSource: Send + Sync {
    /// Open `name` for reading, `None` if there is no such resource
    fn open_read(&self, name: &str) -> Option<Box<dyn Read + Send>>;
}

/// Resolves relative names under a root directory; absolute paths pass
/// through untouched
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FileSource for DirectorySource {
    fn open_read(&self, name: &str) -> Option<Box<dyn Read + Send>> {
        let path = self.resolve(name);
        match File::open(&path) {
            Ok(file) => Some(Box::new(BufReader::new(file))),
            Err(e) => {
                debug!("cannot open {}: {e}", path.display());
                None
            }
        }
    }
}

/// True for names whose contents are gzip-wrapped
fn is_gzipped(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Read a whole resource. Names ending in `.gz` are inflated on the way in.
pub fn load_bytes(source: &dyn FileSource, name: &str) -> ImageResult<Vec<u8>> {
    let mut input = source
        .open_read(name)
        .ok_or_else(|| ImageError::NotFound(name.to_string()))?;
    if is_gzipped(name) {
        input = Box::new(GzDecoder::new(input));
    }
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Load and decode an image. Failures are logged before they are returned.
pub fn load_image(source: &dyn FileSource, name: &str) -> ImageResult<PixelBuffer> {
    let result = load_bytes(source, name).and_then(|bytes| decode(&bytes));
    match &result {
        Ok(img) => debug!("loaded {name} ({}x{})", img.width(), img.height()),
        Err(e) => error!("could not load {name}: {e}"),
    }
    result
}

// ============================================================================
// Concurrency gate
// ============================================================================

/// Counting semaphore bounding the decoders in flight
#[derive(Debug)]
struct Gate {
    in_flight: Mutex<usize>,
    freed: Condvar,
    max: usize,
}

impl Gate {
    fn new(max: usize) -> Self {
        Self {
            in_flight: Mutex::new(0),
            freed: Condvar::new(),
            max: max.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(self: &Arc<Self>) -> Permit {
        let guard = self.lock();
        let mut guard = self
            .freed
            .wait_while(guard, |n| *n >= self.max)
            .unwrap_or_else(PoisonError::into_inner);
        *guard += 1;
        Permit {
            gate: Arc::clone(self),
        }
    }
}

/// One slot in the gate, given back on drop
struct Permit {
    gate: Arc<Gate>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        *self.gate.lock() -= 1;
        self.gate.freed.notify_one();
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug)]
pub enum LoadState {
    Pending,
    Loaded(PixelBuffer),
    Failed(String),
}

/// Coarse view of a request, cheap to poll every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Loaded,
    Failed,
}

type Slot = Arc<(Mutex<LoadState>, Condvar)>;

fn lock_slot(slot: &Slot) -> MutexGuard<'_, LoadState> {
    slot.0.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fill_slot(slot: &Slot, state: LoadState) {
    *lock_slot(slot) = state;
    slot.1.notify_all();
}

/// Handle to an image decoding in the background
#[derive(Debug)]
pub struct ImageRequest {
    name: String,
    slot: Slot,
}

impl ImageRequest {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> LoadStatus {
        match *lock_slot(&self.slot) {
            LoadState::Pending => LoadStatus::Pending,
            LoadState::Loaded(_) => LoadStatus::Loaded,
            LoadState::Failed(_) => LoadStatus::Failed,
        }
    }

    /// Take the result if the load has finished, or get the request back
    pub fn try_take(self) -> Result<ImageResult<PixelBuffer>, Self> {
        let state = std::mem::replace(&mut *lock_slot(&self.slot), LoadState::Pending);
        match state {
            LoadState::Pending => Err(self),
            done => Ok(into_result(done)),
        }
    }

    /// Block until the load finishes
    pub fn wait(self) -> ImageResult<PixelBuffer> {
        let guard = lock_slot(&self.slot);
        let mut guard = self
            .slot
            .1
            .wait_while(guard, |s| matches!(s, LoadState::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        into_result(std::mem::replace(&mut *guard, LoadState::Pending))
    }
}

fn into_result(state: LoadState) -> ImageResult<PixelBuffer> {
    match state {
        LoadState::Loaded(img) => Ok(img),
        LoadState::Failed(reason) => Err(ImageError::LoadFailed(reason)),
        LoadState::Pending => Err(ImageError::LoadFailed("still pending".into())),
    }
}

/// Decodes images on background threads
#[derive(Clone)]
pub struct AsyncImageLoader {
    source: Arc<dyn FileSource>,
    gate: Arc<Gate>,
}

impl AsyncImageLoader {
    pub fn new(source: Arc<dyn FileSource>) -> Self {
        Self::with_limit(source, MAX_CONCURRENT_LOADS)
    }

    pub fn with_limit(source: Arc<dyn FileSource>, max_in_flight: usize) -> Self {
        Self {
            source,
            gate: Arc::new(Gate::new(max_in_flight)),
        }
    }

    /// Decoders currently holding a slot
    pub fn in_flight(&self) -> usize {
        *self.gate.lock()
    }

    /// Start loading `name`; poll the returned request from the draw thread
    pub fn request_image(&self, name: &str) -> ImageRequest {
        let slot: Slot = Arc::new((Mutex::new(LoadState::Pending), Condvar::new()));
        let request = ImageRequest {
            name: name.to_string(),
            slot: Arc::clone(&slot),
        };

        let worker_slot = Arc::clone(&slot);
        let source = Arc::clone(&self.source);
        let gate = Arc::clone(&self.gate);
        let owned_name = name.to_string();
        let spawned = thread("image loader", move || {
            let _permit = gate.acquire();
            let state = match load_image(source.as_ref(), &owned_name) {
                Ok(img) => LoadState::Loaded(img),
                Err(e) => LoadState::Failed(e.to_string()),
            };
            fill_slot(&worker_slot, state);
        });

        if let Err(e) = spawned {
            error!("could not start loader for {name}: {e}");
            fill_slot(&slot, LoadState::Failed(e.to_string()));
        }
        request
    }
}

/// Run `f` on a new named thread and forget about it
pub fn thread<F>(name: &str, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(f)
}
