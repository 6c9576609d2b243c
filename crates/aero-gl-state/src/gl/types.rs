use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

impl BlendFactor {
    pub const fn is_constant_color(self) -> bool {
        matches!(self, BlendFactor::ConstantColor | BlendFactor::OneMinusConstantColor)
    }

    pub const fn is_constant_alpha(self) -> bool {
        matches!(self, BlendFactor::ConstantAlpha | BlendFactor::OneMinusConstantAlpha)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Incr,
    IncrWrap,
    Decr,
    DecrWrap,
    Invert,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullFaceMode {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrontFace {
    Ccw,
    Cw,
}

impl FrontFace {
    pub const fn flipped(self) -> Self {
        match self {
            FrontFace::Ccw => FrontFace::Cw,
            FrontFace::Cw => FrontFace::Ccw,
        }
    }
}

/// Draw primitive kind of the higher-level API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    pub const fn is_triangles(self) -> bool {
        matches!(
            self,
            PrimitiveMode::Triangles | PrimitiveMode::TriangleStrip | PrimitiveMode::TriangleFan
        )
    }
}

impl fmt::Display for PrimitiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrimitiveMode::Points => "points",
            PrimitiveMode::Lines => "lines",
            PrimitiveMode::LineLoop => "line_loop",
            PrimitiveMode::LineStrip => "line_strip",
            PrimitiveMode::Triangles => "triangles",
            PrimitiveMode::TriangleStrip => "triangle_strip",
            PrimitiveMode::TriangleFan => "triangle_fan",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

impl WrapMode {
    /// Two-bit code read by the shader's integer-texture wrap emulation.
    pub const fn shader_bits(self) -> i32 {
        match self {
            WrapMode::ClampToEdge => 1,
            WrapMode::Repeat => 2,
            WrapMode::MirroredRepeat => 3,
        }
    }
}

/// Source of one sampled channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwizzleChannel {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

/// Per-texture channel remapping applied when sampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SwizzleState {
    pub red: SwizzleChannel,
    pub green: SwizzleChannel,
    pub blue: SwizzleChannel,
    pub alpha: SwizzleChannel,
}

impl SwizzleState {
    pub const IDENTITY: Self = Self {
        red: SwizzleChannel::Red,
        green: SwizzleChannel::Green,
        blue: SwizzleChannel::Blue,
        alpha: SwizzleChannel::Alpha,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for SwizzleState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureType {
    Texture2D,
    Texture2DArray,
    Texture2DMultisample,
    Texture3D,
    CubeMap,
}

impl TextureType {
    pub const COUNT: usize = 5;
    pub const ALL: [TextureType; Self::COUNT] = [
        Self::Texture2D,
        Self::Texture2DArray,
        Self::Texture2DMultisample,
        Self::Texture3D,
        Self::CubeMap,
    ];

    pub const fn index(self) -> usize {
        match self {
            TextureType::Texture2D => 0,
            TextureType::Texture2DArray => 1,
            TextureType::Texture2DMultisample => 2,
            TextureType::Texture3D => 3,
            TextureType::CubeMap => 4,
        }
    }
}

/// Sized internal format of a texture's base level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizedFormat {
    Rgba8,
    Rgb8,
    Rgba16F,
    Rgba32F,
    R32F,
    Rgb10A2,
    Depth24Stencil8,
    Depth32F,
    Rgba32I,
    Rgba32Ui,
    Rgba16I,
    Rgba16Ui,
    Rgba8I,
    Rgba8Ui,
    Rgb32I,
    Rgb32Ui,
    Rg32I,
    Rg32Ui,
    R32I,
    R32Ui,
    Rg16I,
    Rg16Ui,
    R16I,
    R16Ui,
    Rg8I,
    Rg8Ui,
    R8I,
    R8Ui,
    Rgb10A2Ui,
}

impl SizedFormat {
    /// Per-channel bit width of integer formats; `None` for normalized, float and depth formats.
    pub const fn integer_bits(self) -> Option<i32> {
        use SizedFormat::*;
        match self {
            Rgba32I | Rgba32Ui | Rgb32I | Rgb32Ui | Rg32I | Rg32Ui | R32I | R32Ui => Some(32),
            Rgba16I | Rgba16Ui | Rg16I | Rg16Ui | R16I | R16Ui => Some(16),
            Rgba8I | Rgba8Ui | Rg8I | Rg8Ui | R8I | R8Ui => Some(8),
            Rgb10A2Ui => Some(10),
            Rgba8 | Rgb8 | Rgba16F | Rgba32F | R32F | Rgb10A2 | Depth24Stencil8 | Depth32F => None,
        }
    }

    pub const fn has_alpha(self) -> bool {
        !matches!(self, SizedFormat::Rgb8 | SizedFormat::Rgb32I | SizedFormat::Rgb32Ui)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawElementsType {
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
}

impl DrawElementsType {
    pub const fn byte_size(self) -> usize {
        match self {
            DrawElementsType::UnsignedByte => 1,
            DrawElementsType::UnsignedShort => 2,
            DrawElementsType::UnsignedInt => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
}

/// Shape of one vertex attribute as the input assembler sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    pub component_type: VertexComponentType,
    pub components: u8,
    pub normalized: bool,
    pub pure_integer: bool,
}

impl VertexFormat {
    pub const FLOAT4: Self = Self {
        component_type: VertexComponentType::Float,
        components: 4,
        normalized: false,
        pure_integer: false,
    };
    pub const INT4: Self = Self {
        component_type: VertexComponentType::Int,
        components: 4,
        normalized: false,
        pure_integer: true,
    };
    pub const UINT4: Self = Self {
        component_type: VertexComponentType::UnsignedInt,
        components: 4,
        normalized: false,
        pure_integer: true,
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extents {
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorF {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl ColorF {
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub blend: bool,
    pub source_blend_rgb: BlendFactor,
    pub dest_blend_rgb: BlendFactor,
    pub source_blend_alpha: BlendFactor,
    pub dest_blend_alpha: BlendFactor,
    pub blend_equation_rgb: BlendEquation,
    pub blend_equation_alpha: BlendEquation,
    pub color_mask_red: bool,
    pub color_mask_green: bool,
    pub color_mask_blue: bool,
    pub color_mask_alpha: bool,
    pub sample_alpha_to_coverage: bool,
    pub dither: bool,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            blend: false,
            source_blend_rgb: BlendFactor::One,
            dest_blend_rgb: BlendFactor::Zero,
            source_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::Zero,
            blend_equation_rgb: BlendEquation::Add,
            blend_equation_alpha: BlendEquation::Add,
            color_mask_red: true,
            color_mask_green: true,
            color_mask_blue: true,
            color_mask_alpha: true,
            sample_alpha_to_coverage: false,
            dither: true,
        }
    }
}

impl BlendState {
    /// Write mask in RGBA bit order (red = bit 0).
    pub const fn color_write_mask(&self) -> u8 {
        (self.color_mask_red as u8)
            | (self.color_mask_green as u8) << 1
            | (self.color_mask_blue as u8) << 2
            | (self.color_mask_alpha as u8) << 3
    }

    fn factors(&self) -> [BlendFactor; 4] {
        [
            self.source_blend_rgb,
            self.dest_blend_rgb,
            self.source_blend_alpha,
            self.dest_blend_alpha,
        ]
    }

    pub fn uses_constant_color(&self) -> bool {
        self.factors().into_iter().any(BlendFactor::is_constant_color)
    }

    pub fn uses_constant_alpha(&self) -> bool {
        self.factors().into_iter().any(BlendFactor::is_constant_alpha)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub func: CompareFunc,
    pub mask: u32,
    pub fail: StencilOp,
    pub pass_depth_fail: StencilOp,
    pub pass_depth_pass: StencilOp,
    pub writemask: u32,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            mask: u32::MAX,
            fail: StencilOp::Keep,
            pass_depth_fail: StencilOp::Keep,
            pass_depth_pass: StencilOp::Keep,
            writemask: u32::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_func: CompareFunc,
    pub depth_mask: bool,
    pub stencil_test: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_func: CompareFunc::Less,
            depth_mask: true,
            stencil_test: false,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizerState {
    pub cull_face: bool,
    pub cull_mode: CullFaceMode,
    pub front_face: FrontFace,
    pub polygon_offset_fill: bool,
    pub polygon_offset_factor: f32,
    pub polygon_offset_units: f32,
    pub rasterizer_discard: bool,
    /// Filled in by the state manager from the draw mode.
    pub point_draw_mode: bool,
    /// Filled in by the state manager from the draw framebuffer.
    pub multi_sample: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            cull_face: false,
            cull_mode: CullFaceMode::Back,
            front_face: FrontFace::Ccw,
            polygon_offset_fill: false,
            polygon_offset_factor: 0.0,
            polygon_offset_units: 0.0,
            rasterizer_discard: false,
            point_draw_mode: false,
            multi_sample: false,
        }
    }
}

impl RasterizerState {
    /// Every triangle is culled regardless of winding.
    pub fn culls_everything(&self) -> bool {
        self.cull_face && self.cull_mode == CullFaceMode::FrontAndBack
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SamplerState {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Option<Filter>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub min_lod: f32,
    pub max_lod: f32,
    pub max_anisotropy: f32,
    pub compare_func: Option<CompareFunc>,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Linear,
            mip_filter: Some(Filter::Linear),
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            wrap_r: WrapMode::Repeat,
            min_lod: -1000.0,
            max_lod: 1000.0,
            max_anisotropy: 1.0,
            compare_func: None,
        }
    }
}

impl SamplerState {
    #[allow(clippy::type_complexity)]
    fn identity(
        &self,
    ) -> (
        Filter,
        Filter,
        Option<Filter>,
        [WrapMode; 3],
        [u32; 3],
        Option<CompareFunc>,
    ) {
        (
            self.min_filter,
            self.mag_filter,
            self.mip_filter,
            [self.wrap_s, self.wrap_t, self.wrap_r],
            [
                self.min_lod.to_bits(),
                self.max_lod.to_bits(),
                self.max_anisotropy.to_bits(),
            ],
            self.compare_func,
        )
    }
}

// Bitwise float comparison keeps `Eq` and `Hash` consistent for cache keys.
impl PartialEq for SamplerState {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for SamplerState {}

impl Hash for SamplerState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_format_bits() {
        assert_eq!(SizedFormat::Rgba32Ui.integer_bits(), Some(32));
        assert_eq!(SizedFormat::R16I.integer_bits(), Some(16));
        assert_eq!(SizedFormat::Rgb10A2Ui.integer_bits(), Some(10));
        assert_eq!(SizedFormat::Rgba8.integer_bits(), None);
        assert_eq!(SizedFormat::Depth24Stencil8.integer_bits(), None);
    }

    #[test]
    fn blend_constant_factor_detection() {
        let mut blend = BlendState::default();
        assert!(!blend.uses_constant_alpha());
        blend.dest_blend_alpha = BlendFactor::OneMinusConstantAlpha;
        assert!(blend.uses_constant_alpha());
        assert!(!blend.uses_constant_color());
        blend.color_mask_green = false;
        assert_eq!(blend.color_write_mask(), 0b1101);
    }

    #[test]
    fn sampler_state_eq_is_bitwise() {
        let a = SamplerState::default();
        let mut b = a;
        assert_eq!(a, b);
        b.min_lod = -0.0;
        let mut c = b;
        c.min_lod = 0.0;
        assert_ne!(b, c);
    }
}
