//! # Producer Output Parser
//!
//! Best-effort extraction of a [`RecordCollection`](crate::types::RecordCollection)
//! from free-form model output, plus the lightweight tag matching used to
//! read search feeds.
//!
//! | Function | Use Case |
//! |--------|----------|
//! | [`decode_records`] | Records or `None`, never an error |
//! | [`try_decode_records`] | Same, with the reason for a miss |
//! | [`find_record_array`] | Locate the first `[ { ... } ]` substring |
//! | [`markup::tag_blocks`] | Every `<tag>...</tag>` body in a document |

pub mod error;
pub mod extract;
pub mod markup;
pub mod records;

pub use error::ParseError;
pub use extract::find_record_array;
pub use records::{decode_records, try_decode_records};
