/// Fullscreen blend of a new sample into the running average.
///
/// Both inputs are read with `textureLoad`; `Rgba32Float` is not filterable
/// without an optional feature.
pub const ACCUMULATE_SHADER: &str = r#"
struct Params {
    blend: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0)
var previous: texture_2d<f32>;
@group(0) @binding(1)
var incoming: texture_2d<f32>;
@group(0) @binding(2)
var<uniform> params: Params;

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    return vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_accumulate(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(frag.xy);
    let old = textureLoad(previous, texel, 0);
    let fresh = textureLoad(incoming, texel, 0);
    return mix(old, fresh, params.blend);
}
"#;
