//! Feature Codec Module
//!
//! Raw stream examples and their encoding into fixed-length vectors.

mod codec;
mod example;

pub use codec::{
    CodecDelta, CodecState, Encoded, FeatureCodec, FeatureSchema, FieldKind, FieldSpec, Imputation,
};
pub use example::{Example, FieldValue};
