/// Filesystem shard discovery and line streaming.
pub mod fs;
