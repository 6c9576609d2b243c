//! The higher-level API's state model, as consumed by the state manager.
//!
//! These types mirror GL ES semantics (default values, enable flags, per-face stencil state). They
//! are plain data: the owning context mutates them and then reports what changed through
//! [`GlDirtyBits`].

mod dirty;
mod program;
mod state;
mod types;

pub use dirty::GlDirtyBits;
pub use program::{ProgramInfo, SamplerBinding, UniformStorage};
pub use state::{
    AttachmentSource, ColorAttachment, CurrentValue, DepthStencilAttachment, DrawCall,
    ElementArrayBuffer, FramebufferState, GlState, ImageIndex, ImageUnitBinding,
    IncompleteTextures, IndexSource, IndexedDraw, SampleCoverage, TextureBinding, TextureState,
    TransformFeedbackState, UniformBufferBinding, VertexArrayState,
};
pub use types::{
    BlendEquation, BlendFactor, BlendState, ColorF, CompareFunc, CullFaceMode, DepthStencilState,
    DrawElementsType, Extents, Filter, FrontFace, Offset, PrimitiveMode, RasterizerState,
    Rectangle, SamplerState, SizedFormat, StencilFaceState, StencilOp, SwizzleChannel,
    SwizzleState, TextureType, VertexComponentType, VertexFormat, WrapMode,
};
