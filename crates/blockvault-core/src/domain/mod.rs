//! Domain model (ids, descriptor, deletion mark, layout, errors, context).

pub mod context;
pub mod deletion_mark;
pub mod errors;
pub mod ids;
pub mod layout;
pub mod meta;

pub use self::context::{Context, ContextError};
pub use self::deletion_mark::{DeletionMark, MarkDecodeError};
pub use self::errors::{BlockError, ErrorKind};
pub use self::ids::{BlockId, IdError, decode_trailing_block_id, parse_trailing_block_id};
pub use self::meta::{
    BlockMeta, BlockStats, Compaction, Downsample, File, MetaDecodeError, SourceType, ThanosMeta,
};
