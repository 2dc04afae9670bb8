pub mod assembler;
pub mod error;
pub mod request;
pub mod template;

pub use assembler::{assemble, assemble_reference};
pub use error::ValidationError;
pub use request::{
    AssembledRequest, Attachment, GenerationMode, ReferenceDescriptor, ReferenceSet,
    ReferenceSlot, REFERENCE_SLOT_COUNT,
};
