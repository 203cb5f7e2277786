//! Lineage engine: head resolution, change detection, key decoding, and the
//! assembler that turns them into catalog entities.

pub mod assembler;
pub mod changes;
pub mod entity;
pub mod head;
pub mod key;
pub mod register;

pub use assembler::{AggregateInterval, Granularity, LineageAssembler, LineageHead, MonthlyLineage};
pub use changes::{ChangeInterval, Snapshot, detect_changes};
pub use head::{resolve_head, resolve_head_strict};
pub use key::{LineageKey, parse_key};
pub use register::ColumnDescriptor;
