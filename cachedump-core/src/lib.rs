/*!
This crate contains the foundation of cachedump's cache and tlb ram decoding.

A dump of a cache or tlb array is a flat byte region made of fixed-size records,
one per `(way, set)` coordinate. A [layout](layout/index.html) describes how such a
region is shaped and which [fields](field/index.html) live inside every record.
Fields are extracted with a [bit specification](bitspec/index.html), optionally run
through a [post processing pipeline](postprocess/index.html) and finally rendered
into a fixed-width [table](render/index.html).

Layouts are looked up in a [registry](registry/index.html), either by the
`(hardware id, client id, format version)` triple found in a dump table or by
`(cpu name, cache type)`. External layout [schemas](schema/index.html) can be
discovered on disk through the [inventory](inventory/index.html).

The [session](session/index.html) ties everything together.
*/

pub mod error;
#[doc(hidden)]
pub use error::*;

pub mod bitspec;
#[doc(hidden)]
pub use bitspec::BitSpec;

pub mod postprocess;
#[doc(hidden)]
pub use postprocess::{CellIndex, PostProcessOp};

pub mod field;
#[doc(hidden)]
pub use field::{DisplayBase, FieldDescriptor};

pub mod layout;
#[doc(hidden)]
pub use layout::{LayoutDescriptor, LayoutKey};

pub mod registry;
#[doc(hidden)]
pub use registry::LayoutRegistry;

pub mod schema;

pub mod inventory;

pub mod args;

pub mod decode;

pub mod render;

pub mod sink;

pub mod session;

pub mod prelude {
    pub mod v1 {
        pub use crate::args::*;
        pub use crate::bitspec::*;
        pub use crate::decode::*;
        pub use crate::error::*;
        pub use crate::field::*;
        pub use crate::inventory::*;
        pub use crate::layout::*;
        pub use crate::postprocess::*;
        pub use crate::registry::*;
        pub use crate::render::*;
        pub use crate::schema::*;
        pub use crate::session::*;
        pub use crate::sink::*;
    }
    pub use v1::*;
}
