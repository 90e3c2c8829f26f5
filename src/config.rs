use std::{env, str::FromStr};

use crate::{block::BlockHeader, error::SetupError};

/// Which allocator serves `allocate` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
  /// Every request gets its own power-of-two buddy block.
  #[default]
  Buddy,
  /// Requests are carved from per-size slabs, each backed by a buddy block.
  Slab,
}

impl FromStr for Strategy {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "buddy" => Ok(Strategy::Buddy),
      "slab" => Ok(Strategy::Slab),
      _ => Err(()),
    }
  }
}

pub const ENV_STRATEGY: &str = "ARENALLOC_STRATEGY";
pub const ENV_ARENA_SIZE: &str = "ARENALLOC_ARENA_SIZE";
pub const ENV_HEADER_SIZE: &str = "ARENALLOC_HEADER_SIZE";
pub const ENV_MIN_CHUNK: &str = "ARENALLOC_MIN_CHUNK";
pub const ENV_OBJECTS_PER_SLAB: &str = "ARENALLOC_OBJECTS_PER_SLAB";

/// Geometry of an arena and the strategy used to carve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  pub strategy: Strategy,
  pub arena_size: usize,
  pub header_size: usize,
  pub min_chunk_size: usize,
  pub objects_per_slab: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      strategy: Strategy::Buddy,
      arena_size: 8 << 20,
      header_size: 8,
      min_chunk_size: 512,
      objects_per_slab: 64,
    }
  }
}

impl Config {
  pub fn with_strategy(
    mut self,
    strategy: Strategy,
  ) -> Self {
    self.strategy = strategy;
    self
  }

  pub fn with_arena_size(
    mut self,
    arena_size: usize,
  ) -> Self {
    self.arena_size = arena_size;
    self
  }

  pub fn with_header_size(
    mut self,
    header_size: usize,
  ) -> Self {
    self.header_size = header_size;
    self
  }

  pub fn with_min_chunk_size(
    mut self,
    min_chunk_size: usize,
  ) -> Self {
    self.min_chunk_size = min_chunk_size;
    self
  }

  pub fn with_objects_per_slab(
    mut self,
    objects_per_slab: usize,
  ) -> Self {
    self.objects_per_slab = objects_per_slab;
    self
  }

  /// Reads overrides from the `ARENALLOC_*` environment variables.
  ///
  /// Unset variables keep their defaults; set but unparsable ones are an error.
  pub fn from_env() -> Result<Self, SetupError> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Like [`Config::from_env`], resolving variables through `lookup`.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, SetupError>
  where
    F: Fn(&'static str) -> Option<String>,
  {
    let mut config = Config::default();

    if let Some(strategy) = parse(&lookup, ENV_STRATEGY)? {
      config.strategy = strategy;
    }
    if let Some(size) = parse(&lookup, ENV_ARENA_SIZE)? {
      config.arena_size = size;
    }
    if let Some(size) = parse(&lookup, ENV_HEADER_SIZE)? {
      config.header_size = size;
    }
    if let Some(size) = parse(&lookup, ENV_MIN_CHUNK)? {
      config.min_chunk_size = size;
    }
    if let Some(count) = parse(&lookup, ENV_OBJECTS_PER_SLAB)? {
      config.objects_per_slab = count;
    }

    Ok(config)
  }

  /// Rejects geometries the allocators cannot work with.
  pub fn validate(&self) -> Result<(), SetupError> {
    if self.arena_size == 0 {
      return Err(SetupError::ZeroArena);
    }
    if !self.min_chunk_size.is_power_of_two() {
      return Err(SetupError::ChunkNotPowerOfTwo(self.min_chunk_size));
    }
    if self.arena_size < self.min_chunk_size {
      return Err(SetupError::ArenaTooSmall {
        arena_size: self.arena_size,
        min_chunk_size: self.min_chunk_size,
      });
    }
    if self.header_size < BlockHeader::SIZE {
      return Err(SetupError::HeaderTooSmall {
        header_size: self.header_size,
        required: BlockHeader::SIZE,
      });
    }
    if self.header_size >= self.min_chunk_size {
      return Err(SetupError::HeaderExceedsChunk {
        header_size: self.header_size,
        min_chunk_size: self.min_chunk_size,
      });
    }
    if self.objects_per_slab == 0 {
      return Err(SetupError::ZeroObjectsPerSlab);
    }
    Ok(())
  }
}

fn parse<T, F>(
  lookup: &F,
  key: &'static str,
) -> Result<Option<T>, SetupError>
where
  T: FromStr,
  F: Fn(&'static str) -> Option<String>,
{
  let Some(value) = lookup(key) else {
    return Ok(None);
  };
  match value.trim().parse() {
    Ok(parsed) => Ok(Some(parsed)),
    Err(_) => Err(SetupError::InvalidEnv { key, value }),
  }
}
