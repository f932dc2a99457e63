//! Record model shared by decoders and history buffers
//!
//! Field access is a capability set ([`RecordCursor`]) any concrete record
//! layout can satisfy. Integer fields are plain `i32`s; object fields are
//! opaque shared values compared by reference.

use std::any::Any;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::Arc;

/// Opaque object field value (marshalled payloads, strings, ...)
pub type ObjValue = Arc<dyn Any + Send + Sync>;

/// Event flags carried by each record occurrence
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct EventFlags(u32);

impl EventFlags {
    pub const NONE: Self = Self(0);
    pub const TX_PENDING: Self = Self(0x01);
    pub const REMOVE_EVENT: Self = Self(0x02);
    pub const SNAPSHOT_BEGIN: Self = Self(0x04);
    pub const SNAPSHOT_END: Self = Self(0x08);
    pub const SNAPSHOT_SNIP: Self = Self(0x10);
    pub const SNAPSHOT_MODE: Self = Self(0x40);
    pub const REMOVE_SYMBOL: Self = Self(0x80);

    #[inline(always)]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline(always)]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline(always)]
    pub const fn is_remove(&self) -> bool {
        self.contains(Self::REMOVE_EVENT)
    }

    #[inline(always)]
    pub const fn without(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for EventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EventFlags, &str); 7] = [
            (EventFlags::TX_PENDING, "TX_PENDING"),
            (EventFlags::REMOVE_EVENT, "REMOVE_EVENT"),
            (EventFlags::SNAPSHOT_BEGIN, "SNAPSHOT_BEGIN"),
            (EventFlags::SNAPSHOT_END, "SNAPSHOT_END"),
            (EventFlags::SNAPSHOT_SNIP, "SNAPSHOT_SNIP"),
            (EventFlags::SNAPSHOT_MODE, "SNAPSHOT_MODE"),
            (EventFlags::REMOVE_SYMBOL, "REMOVE_SYMBOL"),
        ];
        let mut first = true;
        f.write_str("EventFlags(")?;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        f.write_str(")")
    }
}

/// Compose an index from a coarse time (seconds) and a fine sequence
#[inline(always)]
pub const fn compose_index(time_seconds: i32, sequence: u32) -> i64 {
    ((time_seconds as i64) << 32) | sequence as i64
}

#[inline(always)]
pub const fn index_time(index: i64) -> i32 {
    (index >> 32) as i32
}

#[inline(always)]
pub const fn index_sequence(index: i64) -> u32 {
    index as u32
}

/// Field schema of a record (Quote, Trade, Order...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Record id used for stats accounting
    pub id: u32,
    pub name: String,
    pub int_fields: usize,
    pub obj_fields: usize,
}

impl RecordLayout {
    pub fn new(id: u32, name: impl Into<String>, int_fields: usize, obj_fields: usize) -> Self {
        Self {
            id,
            name: name.into(),
            int_fields,
            obj_fields,
        }
    }

    /// Approximate in-memory size of one record occurrence
    #[inline]
    pub const fn record_bytes(&self) -> usize {
        8 + self.int_fields * 4 + self.obj_fields * std::mem::size_of::<usize>()
    }
}

/// Read access to the current record of a decoder
pub trait RecordCursor {
    fn get_int(&self, field: usize) -> i32;
    fn get_obj(&self, field: usize) -> Option<ObjValue>;
    fn get_event_flags(&self) -> EventFlags;
}

/// Owned record values, usable as a cursor
#[derive(Clone, Default)]
pub struct RecordValues {
    pub ints: Vec<i32>,
    pub objs: Vec<Option<ObjValue>>,
    pub flags: EventFlags,
}

impl RecordValues {
    pub fn new(ints: Vec<i32>, objs: Vec<Option<ObjValue>>) -> Self {
        Self {
            ints,
            objs,
            flags: EventFlags::NONE,
        }
    }

    /// Values shaped for `layout`, integer fields all set to `value`
    pub fn filled(layout: &RecordLayout, value: i32) -> Self {
        Self::new(vec![value; layout.int_fields], vec![None; layout.obj_fields])
    }

    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl RecordCursor for RecordValues {
    #[inline]
    fn get_int(&self, field: usize) -> i32 {
        self.ints.get(field).copied().unwrap_or_default()
    }

    #[inline]
    fn get_obj(&self, field: usize) -> Option<ObjValue> {
        self.objs.get(field).cloned().flatten()
    }

    #[inline]
    fn get_event_flags(&self) -> EventFlags {
        self.flags
    }
}

impl fmt::Debug for RecordValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordValues")
            .field("ints", &self.ints)
            .field("objs", &self.objs.len())
            .field("flags", &self.flags)
            .finish()
    }
}
