use std::{error, fmt, io};

/// Reasons an allocator cannot be set up over an arena.
#[derive(Debug)]
pub enum SetupError {
  /// The arena has no bytes at all.
  ZeroArena,
  /// The arena cannot hold a single minimum chunk.
  ArenaTooSmall { arena_size: usize, min_chunk_size: usize },
  /// The minimum chunk size is not a power of two.
  ChunkNotPowerOfTwo(usize),
  /// The header cannot hold the tag/value pair.
  HeaderTooSmall { header_size: usize, required: usize },
  /// The header leaves no room for user bytes in a minimum chunk.
  HeaderExceedsChunk { header_size: usize, min_chunk_size: usize },
  /// Slabs must carry at least one object.
  ZeroObjectsPerSlab,
  /// An environment override could not be parsed.
  InvalidEnv { key: &'static str, value: String },
  /// Mapping the arena's backing memory failed.
  Map(io::Error),
}

impl fmt::Display for SetupError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      SetupError::ZeroArena => write!(f, "arena size is zero"),
      SetupError::ArenaTooSmall {
        arena_size,
        min_chunk_size,
      } => write!(
        f,
        "arena of {arena_size} bytes is smaller than one {min_chunk_size}-byte chunk"
      ),
      SetupError::ChunkNotPowerOfTwo(size) => {
        write!(f, "minimum chunk size {size} is not a power of two")
      }
      SetupError::HeaderTooSmall {
        header_size,
        required,
      } => write!(
        f,
        "header size {header_size} is below the {required} bytes a block header needs"
      ),
      SetupError::HeaderExceedsChunk {
        header_size,
        min_chunk_size,
      } => write!(
        f,
        "header size {header_size} leaves no payload in a {min_chunk_size}-byte chunk"
      ),
      SetupError::ZeroObjectsPerSlab => write!(f, "objects per slab must be at least 1"),
      SetupError::InvalidEnv { key, value } => {
        write!(f, "invalid value {value:?} for {key}")
      }
      SetupError::Map(err) => write!(f, "failed to map arena: {err}"),
    }
  }
}

impl error::Error for SetupError {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      SetupError::Map(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for SetupError {
  fn from(err: io::Error) -> Self {
    SetupError::Map(err)
  }
}
