//! WGSL kernel generation for device plans.
//!
//! Kernels are specialized per artifact: tile size, channel count, channel
//! unrolling, shared staging and LUT indexing are baked in as constants.
//!
//! Bindings shared by the curved kernels:
//!
//! ```text
//! @binding(0) src:  array<u32>   input samples, one per word
//! @binding(1) dst:  array<u32>   output samples, one per word
//! @binding(2) dims: vec4<u32>    width, height, channels, 0
//! @binding(3) lut:  array<u32>   only when the table is materialized
//! ```

#![cfg_attr(not(feature = "wgpu"), allow(dead_code))]

use std::fmt::Write;

use crate::pipeline::{LutIndexing, LUT_GAMMA, LUT_SIZE};

/// Parameters of a generated `curved` kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CurvedKernel {
    pub tile_width: u32,
    pub tile_height: u32,
    pub channels: u32,
    pub unrolled: bool,
    /// Stage `padded16` for the block in workgroup memory.
    pub shared: bool,
    /// Read `lut` from binding 3 instead of evaluating the curve.
    pub lut_buffer: bool,
    pub indexing: LutIndexing,
}

/// Curve evaluated in `f32`; zero is special-cased since `pow(0, y)` is
/// undefined in WGSL.
fn lut_fn() -> String {
    format!(
        r#"
fn lut_at(i: u32) -> u32 {{
    if i == 0u {{ return 0u; }}
    let v = pow(f32(i) / 255.0, {LUT_GAMMA:?}) * 255.0;
    return u32(round(clamp(v, 0.0, 255.0)));
}}
"#
    )
}

/// Kernel filling the 256-entry table, `block` threads per workgroup.
pub(crate) fn lut_kernel(block: u32) -> String {
    format!(
        r#"@group(0) @binding(0) var<storage, read_write> lut: array<u32>;
{lut}
@compute @workgroup_size({block})
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    let i = id.x;
    if i >= {size}u {{ return; }}
    lut[i] = lut_at(i);
}}
"#,
        lut = lut_fn(),
        size = LUT_SIZE,
    )
}

fn curve_fn(k: &CurvedKernel) -> String {
    let index = match k.indexing {
        LutIndexing::Clamp => "u32(clamp(s, 0, 255))",
        LutIndexing::Wrap16 => "min(u32(s) & 0xffffu, 255u)",
    };
    let lookup = if k.lut_buffer { "lut[idx]" } else { "lut_at(idx)" };
    let mut src = String::new();
    if !k.lut_buffer {
        src.push_str(&lut_fn());
    }
    let _ = write!(
        src,
        r#"
fn curve(s: i32) -> u32 {{
    let idx = {index};
    return {lookup};
}}
"#
    );
    src
}

/// Emits `body` once per channel (with `c` bound), or as a loop.
fn per_channel(k: &CurvedKernel, indent: &str, body: &str) -> String {
    let mut out = String::new();
    if k.unrolled {
        for c in 0..k.channels {
            let _ = writeln!(out, "{indent}{{");
            let _ = writeln!(out, "{indent}    let c = {c}u;");
            for line in body.lines() {
                let _ = writeln!(out, "{indent}    {line}");
            }
            let _ = writeln!(out, "{indent}}}");
        }
    } else {
        let _ = writeln!(out, "{indent}for (var c = 0u; c < CH; c = c + 1u) {{");
        for line in body.lines() {
            let _ = writeln!(out, "{indent}    {line}");
        }
        let _ = writeln!(out, "{indent}}}");
    }
    out
}

/// Kernel computing `curved` for one `tile_width x tile_height` block per
/// workgroup.
pub(crate) fn curved_kernel(k: &CurvedKernel) -> String {
    let mut src = String::new();
    let _ = write!(
        src,
        r#"@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;
"#
    );
    if k.lut_buffer {
        src.push_str("@group(0) @binding(3) var<storage, read> lut: array<u32>;\n");
    }
    let _ = write!(
        src,
        r#"
const TW: u32 = {tw}u;
const TH: u32 = {th}u;
const CH: u32 = {ch}u;
"#,
        tw = k.tile_width,
        th = k.tile_height,
        ch = k.channels,
    );
    src.push_str(&curve_fn(k));

    if k.shared {
        shared_main(k, &mut src);
    } else {
        inline_main(k, &mut src);
    }
    src
}

fn shared_main(k: &CurvedKernel, src: &mut String) {
    let (sw, sh) = (k.tile_width + 2, k.tile_height + 2);
    let threads = k.tile_width * k.tile_height;
    let rounds = (sw * sh).div_ceil(threads);
    let load = per_channel(k, "            ", "tile[k * CH + c] = i32(src[base + c]);");
    let store = per_channel(
        k,
        "    ",
        "let v = 2 * tile[s * CH + c] - (tile[(s - 1u) * CH + c] + tile[(s - SW) * CH + c] + tile[(s + 1u) * CH + c] + tile[(s + SW) * CH + c]) / 4;\ndst[o + c] = curve(v);",
    );
    let _ = write!(
        src,
        r#"
const SW: u32 = {sw}u;
const SH: u32 = {sh}u;
const ROUNDS: u32 = {rounds}u;

var<workgroup> tile: array<i32, {size}>;

@compute @workgroup_size({tw}, {th}, 1)
fn main(
    @builtin(workgroup_id) wg: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>,
) {{
    let w = dims.x;
    let h = dims.y;
    let x0 = i32(wg.x * TW) - 1;
    let y0 = i32(wg.y * TH) - 1;
    let t = lid.y * TW + lid.x;

    for (var r = 0u; r < ROUNDS; r = r + 1u) {{
        let k = r * (TW * TH) + t;
        if k < SW * SH {{
            let px = u32(clamp(x0 + i32(k % SW), 0, i32(w) - 1));
            let py = u32(clamp(y0 + i32(k / SW), 0, i32(h) - 1));
            let base = (py * w + px) * CH;
{load}        }}
    }}
    workgroupBarrier();

    let x = wg.x * TW + lid.x;
    let y = wg.y * TH + lid.y;
    if x >= w || y >= h {{ return; }}
    let s = (lid.y + 1u) * SW + lid.x + 1u;
    let o = (y * w + x) * CH;
{store}}}
"#,
        size = sw * sh * k.channels,
        tw = k.tile_width,
        th = k.tile_height,
    );
}

fn inline_main(k: &CurvedKernel, src: &mut String) {
    let store = per_channel(
        k,
        "    ",
        "let v = 2 * p16(xi, yi, c) - (p16(xi - 1, yi, c) + p16(xi, yi - 1, c) + p16(xi + 1, yi, c) + p16(xi, yi + 1, c)) / 4;\ndst[o + c] = curve(v);",
    );
    let _ = write!(
        src,
        r#"
fn p16(x: i32, y: i32, c: u32) -> i32 {{
    let px = u32(clamp(x, 0, i32(dims.x) - 1));
    let py = u32(clamp(y, 0, i32(dims.y) - 1));
    return i32(src[(py * dims.x + px) * CH + c]);
}}

@compute @workgroup_size({tw}, {th}, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {{
    let x = id.x;
    let y = id.y;
    if x >= dims.x || y >= dims.y {{ return; }}
    let xi = i32(x);
    let yi = i32(y);
    let o = (y * dims.x + x) * CH;
{store}}}
"#,
        tw = k.tile_width,
        th = k.tile_height,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> CurvedKernel {
        CurvedKernel {
            tile_width: 8,
            tile_height: 8,
            channels: 3,
            unrolled: true,
            shared: true,
            lut_buffer: true,
            indexing: LutIndexing::Clamp,
        }
    }

    #[test]
    fn test_shared_kernel_layout() {
        let src = curved_kernel(&kernel());
        assert!(src.contains("var<workgroup> tile: array<i32, 300>;"));
        assert!(src.contains("const ROUNDS: u32 = 2u;"));
        assert!(src.contains("@compute @workgroup_size(8, 8, 1)"));
        assert!(src.contains("@binding(3) var<storage, read> lut"));
        assert!(src.contains("let c = 2u;"));
        assert!(!src.contains("for (var c"));
        // barrier precedes the bounds check
        assert!(src.find("workgroupBarrier").unwrap() < src.find("if x >= w").unwrap());
    }

    #[test]
    fn test_inline_kernel_without_table() {
        let k = CurvedKernel {
            shared: false,
            lut_buffer: false,
            unrolled: false,
            indexing: LutIndexing::Wrap16,
            ..kernel()
        };
        let src = curved_kernel(&k);
        assert!(!src.contains("var<workgroup>"));
        assert!(!src.contains("@binding(3)"));
        assert!(src.contains("fn lut_at"));
        assert!(src.contains("& 0xffffu"));
        assert!(src.contains("for (var c = 0u; c < CH;"));
    }

    #[test]
    fn test_lut_kernel() {
        let src = lut_kernel(16);
        assert!(src.contains("@workgroup_size(16)"));
        assert!(src.contains("pow(f32(i) / 255.0, 1.2)"));
        assert!(src.contains("if i >= 256u"));
    }
}
